//! Error budget
//!
//! Tolerated failures scale with the score achieved so far:
//! `clamp(score / 20, error_min, error_max)`. Reaching the ceiling voids the
//! run's score for good; the run itself keeps going.

use crate::error::{BenchError, Result};
use bench_config::defaults::limits::SCORE_PER_ALLOWED_ERROR;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

/// Recorded failures and the void flag
#[derive(Debug)]
pub struct ErrorBudget {
    /// Occurrence order
    errors: Mutex<Vec<anyhow::Error>>,
    voided: AtomicBool,
    error_min: usize,
    error_max: usize,
}

impl ErrorBudget {
    pub fn new(error_min: usize, error_max: usize) -> Self {
        Self {
            errors: Mutex::new(Vec::with_capacity(error_max + 10)),
            voided: AtomicBool::new(false),
            error_min,
            error_max,
        }
    }

    /// Failures tolerated at `score`
    pub fn ceiling(&self, score: i64) -> usize {
        let allowed = (score / SCORE_PER_ALLOWED_ERROR).max(0);
        usize::try_from(allowed)
            .unwrap_or(usize::MAX)
            .clamp(self.error_min, self.error_max)
    }

    /// Record a failure observed at `score`; `None` is a no-op.
    ///
    /// Returns [`BenchError::ErrorBudgetExceeded`] once the failure count
    /// reaches the ceiling.
    pub fn record(&self, err: Option<anyhow::Error>, score: i64) -> Result<()> {
        let Some(err) = err else {
            return Ok(());
        };

        let mut errors = self.errors.lock();
        errors.push(err);
        let count = errors.len();

        let limit = self.ceiling(score);
        if count >= limit {
            if !self.voided.swap(true, Ordering::AcqRel) {
                error!(count, limit, "error budget exceeded, score is void");
            }
            return Err(BenchError::ErrorBudgetExceeded { limit });
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.errors.lock().len()
    }

    /// Set once, never cleared
    pub fn is_voided(&self) -> bool {
        self.voided.load(Ordering::Acquire)
    }

    pub fn error_strings(&self) -> Vec<String> {
        self.errors.lock().iter().map(|e| format!("{:#}", e)).collect()
    }
}
