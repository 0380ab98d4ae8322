//! Running score with an error-proportional penalty

use std::sync::atomic::{AtomicI64, Ordering};
use tracing::warn;

/// Lock-free score counter
#[derive(Debug)]
pub struct ScoreLedger {
    score: AtomicI64,
    /// Penalty per error is `score / (2 * error_max)`
    error_max: i64,
}

impl ScoreLedger {
    pub fn new(error_max: usize) -> Self {
        Self {
            score: AtomicI64::new(0),
            error_max: i64::try_from(error_max).unwrap_or(i64::MAX).max(1),
        }
    }

    /// Add `delta` to the score; safe from any number of tasks
    pub fn add(&self, delta: i64) {
        if delta < 0 {
            warn!(delta, "negative score delta");
        }
        self.score.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn current(&self) -> i64 {
        self.score.load(Ordering::Relaxed)
    }

    /// Score after the error penalty; 0 once the run is void
    pub fn effective_score(&self, error_count: usize, voided: bool) -> i64 {
        if voided {
            return 0;
        }
        let score = self.current();
        let demerit = score / (self.error_max * 2);
        let errors = i64::try_from(error_count).unwrap_or(i64::MAX);
        score.saturating_sub(demerit.saturating_mul(errors))
    }
}
