//! Manager wired to the HTTP clients, against mock servers

use bench::testing::{MockChecker, MockInvestorFactory};
use bench::{launch, BenchError, Collaborators, Manager, StopReason};
use bench_config::BenchConfig;
use mockito::Matcher;
use std::sync::Arc;
use taskworker::CancellationToken;

fn config(app: &str, bank: &str, log: &str) -> BenchConfig {
    let mut config = BenchConfig::default();
    config.endpoints.app = app.to_string();
    config.endpoints.internal_bank = bank.to_string();
    config.endpoints.internal_log = log.to_string();
    config.endpoints.bank = "http://bank.internal".to_string();
    config.endpoints.log = "http://log.internal".to_string();
    config.population.default_workers = 2;
    config.population.brute_force_workers = 0;
    config
}

#[tokio::test]
async fn initialize_and_start_over_http() {
    let mut app = mockito::Server::new_async().await;
    let mut bank = mockito::Server::new_async().await;
    let mut log = mockito::Server::new_async().await;

    let reset = log
        .mock("POST", "/initialize")
        .match_header("authorization", Matcher::Regex("^Bearer [a-z0-9]{12}$".to_string()))
        .with_status(200)
        .create_async()
        .await;
    let bootstrap = app
        .mock("POST", "/initialize")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("bank_endpoint".to_string(), "http://bank.internal".to_string()),
            Matcher::UrlEncoded("log_endpoint".to_string(), "http://log.internal".to_string()),
        ]))
        .with_status(200)
        .create_async()
        .await;
    let register = bank
        .mock("POST", "/register")
        .with_status(200)
        .expect_at_least(2)
        .create_async()
        .await;
    let credit = bank
        .mock("POST", "/add_credit")
        .match_body(Matcher::PartialJsonString(r#"{"price":100000}"#.to_string()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let collaborators = Collaborators::connect(
        &config(&app.url(), &bank.url(), &log.url()),
        Arc::new(MockInvestorFactory::new()),
        Arc::new(MockChecker::new()),
    )
    .unwrap();
    let manager = Arc::new(Manager::new(
        config(&app.url(), &bank.url(), &log.url()),
        collaborators,
    ));

    let token = CancellationToken::new();
    manager.initialize(&token).await.unwrap();
    reset.assert_async().await;
    bootstrap.assert_async().await;

    let fetcher = {
        let manager = manager.clone();
        let token = token.clone();
        tokio::spawn(async move { manager.run_identity_fetcher(token).await })
    };

    let tasks = manager.start().await.unwrap();
    assert_eq!(tasks.len(), 2);
    for task in tasks {
        task.run(token.clone()).await.unwrap();
    }

    token.cancel();
    fetcher.await.unwrap();
    register.assert_async().await;
    credit.assert_async().await;
}

#[tokio::test]
async fn audit_log_rejection_is_fatal() {
    let app = mockito::Server::new_async().await;
    let bank = mockito::Server::new_async().await;
    let mut log = mockito::Server::new_async().await;
    let _reset = log
        .mock("POST", "/initialize")
        .with_status(503)
        .with_body(r#"{"error":"maintenance"}"#)
        .create_async()
        .await;

    let config = config(&app.url(), &bank.url(), &log.url());
    let collaborators = Collaborators::connect(
        &config,
        Arc::new(MockInvestorFactory::new()),
        Arc::new(MockChecker::new()),
    )
    .unwrap();
    let manager = Manager::new(config, collaborators);

    let err = manager
        .initialize(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::AuditLogInitialization(_)));
    assert!(err.to_string().contains("maintenance"));
}

#[test]
fn invalid_endpoint_is_rejected() {
    let config = config("not a url", "http://bank.test", "http://log.test");
    let err = Collaborators::connect(
        &config,
        Arc::new(MockInvestorFactory::new()),
        Arc::new(MockChecker::new()),
    )
    .err()
    .expect("invalid endpoint must fail");
    assert!(matches!(err, BenchError::Adapter(_)));
}

#[tokio::test]
async fn launch_runs_from_config_file() {
    let mut app = mockito::Server::new_async().await;
    let mut bank = mockito::Server::new_async().await;
    let mut log = mockito::Server::new_async().await;
    let _reset = log
        .mock("POST", "/initialize")
        .with_status(200)
        .create_async()
        .await;
    let _bootstrap = app
        .mock("POST", "/initialize")
        .with_status(200)
        .create_async()
        .await;
    let _register = bank
        .mock("POST", "/register")
        .with_status(200)
        .create_async()
        .await;
    let _credit = bank
        .mock("POST", "/add_credit")
        .with_status(200)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[endpoints]
app = "{}"
internal_bank = "{}"
internal_log = "{}"

[population]
default_workers = 2
brute_force_workers = 0

[runner]
duration_secs = 1
tick_interval_ms = 100
log_level = "warn"
"#,
            app.url(),
            bank.url(),
            log.url()
        ),
    )
    .unwrap();

    let factory = Arc::new(MockInvestorFactory::new());
    let report = launch(
        Some(&path),
        factory.clone(),
        Arc::new(MockChecker::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(report.pass);
    assert_eq!(report.stop_reason, StopReason::Elapsed);
    assert_eq!(report.total_investors, 2);
    assert_eq!(factory.built().len(), 2);
}

#[tokio::test]
async fn launch_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.toml");
    std::fs::write(&path, "[limits]\nerror_min = 20\nerror_max = 10\n").unwrap();

    let err = launch(
        Some(&path),
        Arc::new(MockInvestorFactory::new()),
        Arc::new(MockChecker::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BenchError::Config(_)));
    assert!(err.to_string().contains("error_min"));
}

