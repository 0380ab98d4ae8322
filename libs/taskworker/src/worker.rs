//! Bounded-concurrency task executor

use crate::task::BoxedTask;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// Receives the error of every failed task
pub type ErrorHandler = Arc<dyn Fn(anyhow::Error) + Send + Sync>;

/// Snapshot of executor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// Runs task batches with at most `max_concurrency` bodies in flight.
///
/// Delays are waited out before a permit is taken, so delayed tasks do not
/// hold concurrency slots.
pub struct TaskWorker {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    on_error: ErrorHandler,
    counters: Arc<Counters>,
}

impl TaskWorker {
    pub fn new(max_concurrency: usize, on_error: ErrorHandler) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            tracker: TaskTracker::new(),
            on_error,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Spawn every task of the batch, preserving batch order at spawn time
    pub fn dispatch(&self, token: &CancellationToken, tasks: Vec<BoxedTask>) {
        if tasks.is_empty() {
            return;
        }
        debug!(count = tasks.len(), "dispatching task batch");
        for task in tasks {
            self.spawn(token.clone(), task);
        }
    }

    fn spawn(&self, token: CancellationToken, task: BoxedTask) {
        let permits = self.permits.clone();
        let on_error = self.on_error.clone();
        let counters = self.counters.clone();
        counters.dispatched.fetch_add(1, Ordering::Relaxed);

        self.tracker.spawn(async move {
            let delay = task.delay();
            if !delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => {
                        counters.cancelled.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let _permit = tokio::select! {
                _ = token.cancelled() => {
                    counters.cancelled.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        counters.cancelled.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                },
            };

            let result = tokio::select! {
                _ = token.cancelled() => {
                    counters.cancelled.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                result = task.run(token.clone()) => result,
            };

            match result {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    trace!(error = %e, "task failed");
                    on_error(e);
                }
            }
        });
    }

    /// Number of spawned tasks that have not finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work and wait for every spawned task to finish
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        debug!(stats = ?self.stats(), "task worker drained");
    }
}
