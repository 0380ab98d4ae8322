//! Benchmark orchestrator
//!
//! [`Manager`] owns the run state (investor registry, error budget, score,
//! growth level, identity queue) and makes the per-tick scheduling decision.
//! `initialize`, `start` and `next` are serialized by one tick lock; work they
//! return runs on a [`taskworker::TaskWorker`] and reports back through
//! [`Manager::add_score`] and [`Manager::append_error`].

use crate::budget::ErrorBudget;
use crate::error::{BenchError, Result};
use crate::identity::{IdentityMinter, IdentityQueue, IdentityStats, RandomIdentity};
use crate::investor::{
    ClientProfile, ConsistencyChecker, InvestorFactory, InvestorKind, RandomParams,
    SharedInvestor,
};
use crate::logging::{LogEmoji, RunLog};
use crate::registry::InvestorRegistry;
use crate::scaling::{initial_seed, GrowthCause, ScalingController, TickObservation};
use crate::score::ScoreLedger;
use bench_adapters::{
    ApplicationBootstrap, AuditLogClient, AuditLogService, BankClient, BankService,
    BootstrapSettings, GuestClient,
};
use bench_config::BenchConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskworker::{BoxedTask, CancellationToken, ExecTask, SerialTask};
use tracing::{debug, info, warn};

/// Known accounts targeted by brute-force investors, cycled if needed
pub const BRUTE_FORCE_ACCOUNTS: [&str; 4] =
    ["5gf4syuu", "qgar5ge8dv4g", "gv3bsxzejbb4", "jybp5gysw279"];
const BRUTE_FORCE_NAME: &str = "unknown";
const BRUTE_FORCE_PASSWORD: &str = "12345";

/// External services and strategy plug-ins the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub bank: Arc<dyn BankService>,
    pub audit_log: Arc<dyn AuditLogService>,
    pub bootstrap: Arc<dyn ApplicationBootstrap>,
    pub factory: Arc<dyn InvestorFactory>,
    pub checker: Arc<dyn ConsistencyChecker>,
    pub minter: Arc<dyn IdentityMinter>,
}

impl Collaborators {
    /// HTTP clients for the bank, audit log and application, each with a
    /// freshly minted application id
    pub fn connect(
        config: &BenchConfig,
        factory: Arc<dyn InvestorFactory>,
        checker: Arc<dyn ConsistencyChecker>,
    ) -> Result<Self> {
        let minter = RandomIdentity::new();
        let endpoints = &config.endpoints;

        let bank = BankClient::new(
            &endpoints.internal_bank,
            minter.mint_identity(),
            config.timeouts.client(),
        )?;
        let audit_log = AuditLogClient::new(
            &endpoints.internal_log,
            minter.mint_identity(),
            config.timeouts.client(),
        )?;
        let bootstrap = GuestClient::new(&endpoints.app, config.timeouts.init())?;

        Ok(Self {
            bank: Arc::new(bank),
            audit_log: Arc::new(audit_log),
            bootstrap: Arc::new(bootstrap),
            factory,
            checker,
            minter: Arc::new(minter),
        })
    }
}

/// Run state and scheduling decisions of one benchmark run
pub struct Manager {
    config: BenchConfig,
    collaborators: Collaborators,
    /// Serializes `initialize`, `start` and `next`
    tick: tokio::sync::Mutex<()>,
    investors: Arc<InvestorRegistry>,
    errors: ErrorBudget,
    score: ScoreLedger,
    identities: IdentityQueue,
    scaling: ScalingController,
    level: AtomicU32,
    run_log: RunLog,
    credentials: RandomIdentity,
}

impl Manager {
    pub fn new(config: BenchConfig, collaborators: Collaborators) -> Self {
        let initial = config.population.default_workers + config.population.brute_force_workers;
        Self {
            tick: tokio::sync::Mutex::new(()),
            investors: Arc::new(InvestorRegistry::with_capacity(initial)),
            errors: ErrorBudget::new(config.limits.error_min, config.limits.error_max),
            score: ScoreLedger::new(config.limits.error_max),
            identities: IdentityQueue::new(
                config.identity.queue_capacity,
                config.identity.retry_delay(),
            ),
            scaling: ScalingController::from_config(&config),
            level: AtomicU32::new(0),
            run_log: RunLog::new(config.runner.log_capacity),
            credentials: RandomIdentity::new(),
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Identity prefetch loop; run it on its own task until `token` is cancelled
    pub async fn run_identity_fetcher(&self, token: CancellationToken) {
        self.identities
            .run(
                self.collaborators.minter.as_ref(),
                self.collaborators.bank.as_ref(),
                token,
            )
            .await;
    }

    /// Next registered, never-issued bank id
    pub async fn fetch_new_id(&self) -> Result<String> {
        self.identities.fetch_next().await
    }

    pub fn identity_stats(&self) -> IdentityStats {
        self.identities.stats()
    }

    pub fn add_investor(&self, investor: SharedInvestor) {
        self.investors.admit(investor);
    }

    /// Drop retired investors; returns how many went away
    pub fn purge_investors(&self) -> usize {
        let purged = self.investors.purge_retired();
        if purged > 0 {
            self.run_log.push(
                LogEmoji::PURGE,
                format!("retired investors left the market [{}]", purged),
            );
        }
        purged
    }

    pub fn find_investor(&self, bank_id: &str) -> Option<SharedInvestor> {
        self.investors.find_by_identity(bank_id)
    }

    pub fn add_score(&self, delta: i64) {
        self.score.add(delta);
    }

    /// Raw score, before penalties
    pub fn score(&self) -> i64 {
        self.score.current()
    }

    /// Record the outcome of a unit of work; `None` is a no-op.
    ///
    /// Fails with [`BenchError::ErrorBudgetExceeded`] once failures reach the
    /// ceiling for the current score.
    pub fn append_error(&self, err: Option<anyhow::Error>) -> Result<()> {
        let was_voided = self.errors.is_voided();
        let recorded = self.errors.record(err, self.score.current());
        if let Err(e) = &recorded {
            if !was_voided {
                self.run_log.push(LogEmoji::ERROR, e.to_string());
            }
        }
        recorded
    }

    pub fn error_count(&self) -> usize {
        self.errors.count()
    }

    pub fn error_strings(&self) -> Vec<String> {
        self.errors.error_strings()
    }

    pub fn is_voided(&self) -> bool {
        self.errors.is_voided()
    }

    pub fn recent_log_lines(&self) -> Vec<String> {
        self.run_log.lines()
    }

    /// Score after the per-error penalty; 0 once the budget is exceeded
    pub fn total_score(&self) -> i64 {
        self.score
            .effective_score(self.errors.count(), self.errors.is_voided())
    }

    pub fn level(&self) -> u32 {
        self.level.load(Ordering::Acquire)
    }

    /// Investors ever admitted
    pub fn all_investors_count(&self) -> usize {
        self.investors.total_admitted()
    }

    pub fn active_investors_count(&self) -> usize {
        self.investors.active_count()
    }

    /// Reset the audit log, then bootstrap the application
    pub async fn initialize(&self, token: &CancellationToken) -> Result<()> {
        let _tick = self.tick.lock().await;
        let audit_log = &self.collaborators.audit_log;

        let reset = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(BenchError::Cancelled),
            reset = audit_log.reset() => reset,
        };
        reset.map_err(BenchError::AuditLogInitialization)?;

        let settings = BootstrapSettings {
            bank_endpoint: self.config.endpoints.bank.clone(),
            bank_appid: self.collaborators.bank.application_identity().to_string(),
            log_endpoint: self.config.endpoints.log.clone(),
            log_appid: audit_log.application_identity().to_string(),
        };
        let initialized = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(BenchError::Cancelled),
            initialized = self.collaborators.bootstrap.initialize(&settings) => initialized,
        };
        initialized.map_err(BenchError::Initialization)?;

        crate::log_success!("application initialized");
        Ok(())
    }

    pub async fn pre_test(&self, token: &CancellationToken) -> Result<()> {
        self.collaborators
            .checker
            .pre_test(token)
            .await
            .map_err(BenchError::PreTest)
    }

    /// Verify the signed-in, non-retired investors
    pub async fn post_test(&self, token: &CancellationToken) -> Result<()> {
        let investors = self.investors.signed_in_active();
        debug!(count = investors.len(), "post-test population");
        self.collaborators
            .checker
            .post_test(token, &investors)
            .await
            .map_err(BenchError::PostTest)
    }

    /// Build and admit the initial population; returns one start unit per
    /// investor
    pub async fn start(&self) -> Result<Vec<BoxedTask>> {
        let _tick = self.tick.lock().await;
        let population = &self.config.population;
        let mut tasks =
            Vec::with_capacity(population.default_workers + population.brute_force_workers);

        for i in 0..population.default_workers {
            let seed = initial_seed(i, self.config.pricing.base_price);
            let investor = self.new_random_investor(seed).await?;
            self.add_investor(investor.clone());
            tasks.push(self.start_unit(&investor));
        }

        for i in 0..population.brute_force_workers {
            let account = BRUTE_FORCE_ACCOUNTS[i % BRUTE_FORCE_ACCOUNTS.len()];
            let profile = self.profile(
                account.to_string(),
                BRUTE_FORCE_NAME.to_string(),
                BRUTE_FORCE_PASSWORD.to_string(),
            );
            let investor = self
                .collaborators
                .factory
                .build(profile, InvestorKind::BruteForce)
                .map_err(BenchError::InvestorSetup)?;
            self.add_investor(investor.clone());
            tasks.push(investor.start());
        }

        self.run_log.push(
            LogEmoji::START,
            format!("initial investors entered the market [{}]", tasks.len()),
        );
        Ok(tasks)
    }

    /// One scheduling tick.
    ///
    /// Fails with [`BenchError::NoActiveInvestors`] once every investor has
    /// retired; the caller must stop ticking.
    pub async fn next(&self) -> Result<Vec<BoxedTask>> {
        let _tick = self.tick.lock().await;

        self.purge_investors();
        let investors = self.investors.snapshot();
        if investors.is_empty() {
            return Err(BenchError::NoActiveInvestors);
        }

        let mut tasks = Vec::new();
        for investor in self.scaling.pending_starts(&investors) {
            tasks.push(investor.start());
        }

        let mut observation = TickObservation::default();
        for investor in investors
            .iter()
            .filter(|i| i.is_start_completed() && !i.is_retired())
        {
            if let Some(task) = investor.next() {
                tasks.push(task);
            }
            observation.record_trades(investor.shared_trades());
            observation.record_price(investor.latest_trade_price());
        }

        let plan = self.scaling.plan(
            &observation,
            self.score.current(),
            self.errors.count(),
            self.level(),
        );
        self.level.store(plan.level, Ordering::Release);

        if plan.shares > 0 {
            self.run_log.push(
                LogEmoji::SHARE,
                format!("shared on social media, investors are joining [{}]", plan.shares),
            );
        }

        for request in &plan.requests {
            if request.cause == GrowthCause::Natural {
                self.run_log.push(
                    LogEmoji::LEVEL,
                    format!(
                        "investors are joining naturally [unit {} @ {}]",
                        request.unit_amount, request.price
                    ),
                );
            }
            for seed in request.seeds() {
                let investor = self.new_random_investor(seed).await?;
                tasks.push(self.admission_unit(investor));
            }
        }

        if plan.level_ups > 0 {
            info!(level = plan.level, admitted = plan.admitted(), "level up");
        }
        Ok(tasks)
    }

    /// Close every investor and the identity queue (run teardown)
    pub fn close(&self) {
        self.identities.close();
        self.investors.close_all();
    }

    fn profile(&self, bank_id: String, name: String, password: String) -> ClientProfile {
        ClientProfile {
            app_endpoint: self.config.endpoints.app.clone(),
            bank_id,
            name,
            password,
            timeout: self.config.timeouts.client(),
            retire_timeout: self.config.timeouts.retire(),
        }
    }

    async fn new_random_investor(&self, seed: RandomParams) -> Result<SharedInvestor> {
        let bank_id = self.fetch_new_id().await?;
        let profile = self.profile(
            bank_id,
            self.credentials.name(),
            self.credentials.password(),
        );
        self.collaborators
            .factory
            .build(profile, InvestorKind::Random(seed))
            .map_err(BenchError::InvestorSetup)
    }

    /// Start unit, preceded by the credit grant for credit-bearing investors
    fn start_unit(&self, investor: &SharedInvestor) -> BoxedTask {
        let start = investor.start();
        if investor.credit() <= 0 {
            return start;
        }
        let grant = credit_grant(self.collaborators.bank.clone(), investor.clone());
        SerialTask::new(vec![grant, start], Duration::ZERO).boxed()
    }

    /// Deferred admission: grant credit, then join the registry
    fn admission_unit(&self, investor: SharedInvestor) -> BoxedTask {
        let bank = self.collaborators.bank.clone();
        let registry = self.investors.clone();
        ExecTask::new(
            move |_| async move {
                grant_credit(bank.as_ref(), investor.bank_id(), investor.credit()).await;
                debug!(bank_id = investor.bank_id(), "{} investor admitted", LogEmoji::ADMIT);
                registry.admit(investor);
                Ok(())
            },
            Duration::ZERO,
        )
        .boxed()
    }
}

fn credit_grant(bank: Arc<dyn BankService>, investor: SharedInvestor) -> BoxedTask {
    ExecTask::new(
        move |_| async move {
            grant_credit(bank.as_ref(), investor.bank_id(), investor.credit()).await;
            Ok(())
        },
        Duration::ZERO,
    )
    .boxed()
}

/// Failures are logged and swallowed
async fn grant_credit(bank: &dyn BankService, bank_id: &str, amount: i64) {
    if amount <= 0 {
        return;
    }
    match bank.grant_credit(bank_id, amount).await {
        Ok(()) => debug!(bank_id, amount, "{} credit granted", LogEmoji::MONEY),
        Err(e) => warn!(bank_id, amount, status = ?e.status(), error = %e, "credit grant failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MockAuditLog, MockBank, MockBootstrap, MockChecker, MockInvestorFactory, SequenceMinter,
    };

    struct Fixture {
        manager: Arc<Manager>,
        audit_log: Arc<MockAuditLog>,
        bootstrap: Arc<MockBootstrap>,
    }

    fn fixture() -> Fixture {
        let bank = Arc::new(MockBank::new());
        let audit_log = Arc::new(MockAuditLog::new());
        let bootstrap = Arc::new(MockBootstrap::new());
        let collaborators = Collaborators {
            bank,
            audit_log: audit_log.clone(),
            bootstrap: bootstrap.clone(),
            factory: Arc::new(MockInvestorFactory::new()),
            checker: Arc::new(MockChecker::new()),
            minter: Arc::new(SequenceMinter::new(["only"])),
        };
        let mut config = BenchConfig::default();
        config.endpoints.bank = "http://bank.public".to_string();
        config.endpoints.log = "http://log.public".to_string();
        Fixture {
            manager: Arc::new(Manager::new(config, collaborators)),
            audit_log,
            bootstrap,
        }
    }

    #[tokio::test]
    async fn test_initialize_resets_log_then_bootstraps() {
        let f = fixture();
        f.manager
            .initialize(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(f.audit_log.resets(), 1);
        assert_eq!(
            f.bootstrap.settings(),
            vec![BootstrapSettings {
                bank_endpoint: "http://bank.public".to_string(),
                bank_appid: "bank-appid".to_string(),
                log_endpoint: "http://log.public".to_string(),
                log_appid: "log-appid".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_initialize_audit_log_failure() {
        let f = fixture();
        f.audit_log.fail_resets();
        let err = f
            .manager
            .initialize(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::AuditLogInitialization(_)));
        assert!(f.bootstrap.settings().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_bootstrap_failure() {
        let f = fixture();
        f.bootstrap.fail_initialization();
        let err = f
            .manager
            .initialize(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Initialization(_)));
    }

    #[tokio::test]
    async fn test_initialize_honors_cancellation() {
        let f = fixture();
        f.bootstrap.hang();
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                token.cancel();
            })
        };
        let err = f.manager.initialize(&token).await.unwrap_err();
        assert!(matches!(err, BenchError::Cancelled));
        canceller.await.unwrap();
    }

    #[test]
    fn test_append_error_and_total_score() {
        let f = fixture();
        for _ in 0..4 {
            f.manager.append_error(None).unwrap();
        }
        f.manager
            .append_error(Some(anyhow::anyhow!("order failed")))
            .unwrap();
        f.manager.add_score(8000);

        assert_eq!(f.manager.error_count(), 1);
        assert_eq!(f.manager.total_score(), 7960);
        assert_eq!(f.manager.error_strings(), vec!["order failed"]);
    }

    #[test]
    fn test_budget_exceeded_is_logged_once() {
        let f = fixture();
        for n in 0..7 {
            let _ = f.manager.append_error(Some(anyhow::anyhow!("failure {n}")));
        }
        assert!(f.manager.is_voided());
        assert_eq!(f.manager.total_score(), 0);
        let exceeded = f
            .manager
            .recent_log_lines()
            .into_iter()
            .filter(|l| l.contains("exceeded"))
            .count();
        assert_eq!(exceeded, 1);
    }

    #[tokio::test]
    async fn test_next_without_investors_fails() {
        let f = fixture();
        let Err(err) = f.manager.next().await else {
            panic!("tick without investors must fail");
        };
        assert!(matches!(err, BenchError::NoActiveInvestors));
    }
}
