//! Run controller
//!
//! Drives one [`Manager`] through a full run: initialize, pre-test, load
//! phase, post-test. The load phase calls [`Manager::next`] every tick and
//! hands each batch to a [`TaskWorker`]; task failures are recorded through
//! the manager's error budget.

use crate::error::{BenchError, Result};
use crate::investor::{ConsistencyChecker, InvestorFactory};
use crate::logging::init_tracing;
use crate::manager::{Collaborators, Manager};
use bench_config::BenchConfig;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use taskworker::{CancellationToken, TaskWorker};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Why the load phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Elapsed,
    Cancelled,
    NoActiveInvestors,
    /// A tick failed with an error the run cannot recover from
    Aborted,
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub pass: bool,
    pub stop_reason: StopReason,
    pub raw_score: i64,
    pub score: i64,
    pub level: u32,
    pub total_investors: usize,
    pub active_investors: usize,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_test_failure: Option<String>,
}

impl BenchReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn collect(manager: &Manager, stop_reason: StopReason, post_test: Option<String>) -> Self {
        let voided = manager.is_voided();
        Self {
            pass: !voided && post_test.is_none() && stop_reason == StopReason::Elapsed,
            stop_reason,
            raw_score: manager.score(),
            score: manager.total_score(),
            level: manager.level(),
            total_investors: manager.all_investors_count(),
            active_investors: manager.active_investors_count(),
            errors: manager.error_strings(),
            logs: manager.recent_log_lines(),
            post_test_failure: post_test,
        }
    }
}

pub struct BenchRunner {
    manager: Arc<Manager>,
    duration: Duration,
    tick_interval: Duration,
    max_concurrency: usize,
}

impl BenchRunner {
    pub fn new(manager: Arc<Manager>) -> Self {
        let runner = &manager.config().runner;
        let (duration, tick_interval, max_concurrency) =
            (runner.duration(), runner.tick_interval(), runner.max_concurrency);
        Self {
            manager,
            duration,
            tick_interval,
            max_concurrency,
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Run to completion. Setup failures (initialize, pre-test, start) are
    /// returned as errors; everything after start ends in a report.
    pub async fn run(&self, token: CancellationToken) -> Result<BenchReport> {
        let manager = &self.manager;

        crate::log_phase!("initializing");
        manager.initialize(&token).await?;
        crate::log_phase!("pre-test");
        manager.pre_test(&token).await?;

        let load = token.child_token();
        let fetcher = {
            let manager = manager.clone();
            let load = load.clone();
            tokio::spawn(async move { manager.run_identity_fetcher(load).await })
        };

        let worker = {
            let manager = manager.clone();
            TaskWorker::new(
                self.max_concurrency,
                Arc::new(move |e: anyhow::Error| {
                    if let Err(exceeded) = manager.append_error(Some(e)) {
                        debug!(error = %exceeded, "task failure over budget");
                    }
                }),
            )
        };

        crate::log_phase!("load phase for {:?}", self.duration);
        let stop_reason = match manager.start().await {
            Ok(tasks) => {
                worker.dispatch(&load, tasks);
                self.tick_loop(&worker, &load, &token).await
            }
            Err(e) => {
                load.cancel();
                worker.shutdown().await;
                let _ = fetcher.await;
                return Err(e);
            }
        };

        load.cancel();
        worker.shutdown().await;
        if let Err(e) = fetcher.await {
            warn!(error = %e, "identity fetcher panicked");
        }
        let identities = manager.identity_stats();
        crate::log_metrics!(
            "load phase over ({:?}): score {} level {} investors {}/{} errors {} ids {}/{}",
            stop_reason,
            manager.score(),
            manager.level(),
            manager.active_investors_count(),
            manager.all_investors_count(),
            manager.error_count(),
            identities.registered,
            identities.registered + identities.failed
        );

        let post_test = match stop_reason {
            StopReason::Cancelled => None,
            _ => {
                crate::log_phase!("post-test");
                manager.post_test(&token).await.err().map(|e| e.to_string())
            }
        };
        if let Some(failure) = &post_test {
            crate::log_error!("{}", failure);
        }

        let report = BenchReport::collect(manager, stop_reason, post_test);
        manager.close();
        info!(pass = report.pass, score = report.score, "run finished");
        Ok(report)
    }

    async fn tick_loop(
        &self,
        worker: &TaskWorker,
        load: &CancellationToken,
        token: &CancellationToken,
    ) -> StopReason {
        let deadline = Instant::now() + self.duration;
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return StopReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => return StopReason::Elapsed,
                _ = ticker.tick() => {}
            }

            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return StopReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => return StopReason::Elapsed,
                next = self.manager.next() => next,
            };

            match next {
                Ok(tasks) => worker.dispatch(load, tasks),
                Err(BenchError::NoActiveInvestors) => {
                    crate::log_error!("no active investors remain");
                    return StopReason::NoActiveInvestors;
                }
                Err(e) if e.is_fatal() => {
                    crate::log_error!("load phase aborted: {}", e);
                    if let Err(exceeded) = self.manager.append_error(Some(e.into())) {
                        debug!(error = %exceeded, "tick failure over budget");
                    }
                    return StopReason::Aborted;
                }
                Err(e) => {
                    crate::log_warning!("tick failed, retrying next tick: {}", e);
                    if let Err(exceeded) = self.manager.append_error(Some(e.into())) {
                        debug!(error = %exceeded, "tick failure over budget");
                    }
                }
            }
        }
    }
}

/// Load configuration (file, then `BENCH__*` overrides), install tracing,
/// connect the HTTP collaborators and run once with the given investor
/// strategies and consistency checks.
pub async fn launch(
    config_path: Option<&Path>,
    factory: Arc<dyn InvestorFactory>,
    checker: Arc<dyn ConsistencyChecker>,
    token: CancellationToken,
) -> Result<BenchReport> {
    let config = BenchConfig::load(config_path).map_err(BenchError::Config)?;
    init_tracing(&config.runner.log_level);
    info!(app = %config.endpoints.app, "benchmark configured");

    let collaborators = Collaborators::connect(&config, factory, checker)?;
    let runner = BenchRunner::new(Arc::new(Manager::new(config, collaborators)));
    runner.run(token).await
}
