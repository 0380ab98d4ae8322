//! Investor Registry
//!
//! Owns the live investor population. Admission can happen from deferred
//! tasks running outside the orchestrator's tick lock, so the collection has
//! its own lock; the admitted counter is atomic and readable without it.

use crate::investor::SharedInvestor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Ordered investor collection plus a monotonic admission counter
#[derive(Default)]
pub struct InvestorRegistry {
    /// Insertion order is iteration order
    investors: Mutex<Vec<SharedInvestor>>,
    total_admitted: AtomicUsize,
}

impl InvestorRegistry {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            investors: Mutex::new(Vec::with_capacity(capacity)),
            total_admitted: AtomicUsize::new(0),
        }
    }

    /// Append an investor and bump the admission counter
    pub fn admit(&self, investor: SharedInvestor) {
        let mut investors = self.investors.lock();
        investors.push(investor);
        // bumped under the lock: total_admitted >= active_count for every reader
        self.total_admitted.fetch_add(1, Ordering::Release);
    }

    /// Close and drop every retired investor, keeping survivors in order.
    ///
    /// Returns how many investors were purged.
    pub fn purge_retired(&self) -> usize {
        let mut investors = self.investors.lock();
        if !investors.iter().any(|i| i.is_retired()) {
            return 0;
        }

        let before = investors.len();
        let mut survivors = Vec::with_capacity(investors.capacity());
        for investor in investors.drain(..) {
            if investor.is_retired() {
                investor.close();
            } else {
                survivors.push(investor);
            }
        }
        *investors = survivors;

        let purged = before - investors.len();
        debug!(purged, remaining = investors.len(), "purged retired investors");
        purged
    }

    /// First investor holding `bank_id`
    pub fn find_by_identity(&self, bank_id: &str) -> Option<SharedInvestor> {
        self.investors
            .lock()
            .iter()
            .find(|i| i.bank_id() == bank_id)
            .cloned()
    }

    /// Copy of the current population, in admission order
    pub fn snapshot(&self) -> Vec<SharedInvestor> {
        self.investors.lock().clone()
    }

    /// Investors eligible for the post-run consistency check
    pub fn signed_in_active(&self) -> Vec<SharedInvestor> {
        self.investors
            .lock()
            .iter()
            .filter(|i| i.is_signed_in() && !i.is_retired())
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.investors.lock().len()
    }

    /// Never decreases; may lag a concurrent admission
    pub fn total_admitted(&self) -> usize {
        self.total_admitted.load(Ordering::Acquire)
    }

    /// Close every investor and empty the registry (run teardown)
    pub fn close_all(&self) {
        let investors = std::mem::take(&mut *self.investors.lock());
        for investor in &investors {
            investor.close();
        }
        debug!(closed = investors.len(), "closed all investors");
    }
}
