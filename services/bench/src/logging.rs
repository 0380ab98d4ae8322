//! Run logging
//!
//! Operator-facing run events go through [`RunLog`], which emits them via
//! `tracing` and keeps the most recent lines for the final report.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing_subscriber::EnvFilter;

/// Emoji prefixes for run events
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅";
    pub const ERROR: &'static str = "❌";
    pub const WARNING: &'static str = "⚠️";

    // Run events
    pub const START: &'static str = "🚀"; // Run phase started
    pub const SHARE: &'static str = "🤝"; // Share-triggered growth
    pub const LEVEL: &'static str = "📈"; // Natural growth / level up
    pub const ADMIT: &'static str = "➕"; // Investor admitted
    pub const PURGE: &'static str = "➖"; // Retired investors purged
    pub const CHART: &'static str = "📊"; // Score / statistics
    pub const MONEY: &'static str = "💰"; // Credit grants
}

#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SUCCESS, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!("{} {}", $crate::logging::LogEmoji::ERROR, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        tracing::warn!("{} {}", $crate::logging::LogEmoji::WARNING, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_metrics {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::CHART, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_phase {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::START, format!($($arg)*))
    };
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `level`;
/// a second call is a no-op.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Bounded buffer of the latest run events; oldest lines are dropped
#[derive(Debug)]
pub struct RunLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl RunLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, emoji: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "bench::run", "{} {}", emoji, message);

        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(message);
    }

    /// Buffered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
