//! Default values shared by the harness crates.

/// Error budget defaults
pub mod limits {
    /// Failures tolerated regardless of score
    pub const ERROR_MIN: usize = 5;

    /// Hard cap on tolerated failures
    pub const ERROR_MAX: usize = 100;

    /// Score needed per tolerated failure
    pub const SCORE_PER_ALLOWED_ERROR: i64 = 20;
}

/// Investor population defaults
pub mod population {
    pub const DEFAULT_WORKERS: usize = 10;
    pub const BRUTE_FORCE_WORKERS: usize = 2;
    pub const ADD_USERS_ON_SHARE: usize = 5;
    pub const ADD_USERS_ON_NATURAL: usize = 10;

    /// Unstarted investors handed a start unit per tick
    pub const START_PER_TICK: usize = 2;
}

/// Price defaults
pub mod pricing {
    /// Base price for the initial population
    pub const BASE_PRICE: i64 = 5105;

    /// Used by natural growth when no investor has traded yet
    pub const FALLBACK_TRADE_PRICE: i64 = 5000;
}

/// Identity prefetch defaults
pub mod identity {
    pub const QUEUE_CAPACITY: usize = 10;
    pub const RETRY_DELAY_MS: u64 = 50;
}

/// Timeouts (milliseconds)
pub mod timeouts {
    pub const CLIENT_MS: u64 = 5_000;
    pub const RETIRE_MS: u64 = 10_000;
    pub const INIT_MS: u64 = 30_000;
}

/// Run controller defaults
pub mod runner {
    pub const DURATION_SECS: u64 = 60;
    pub const TICK_INTERVAL_MS: u64 = 100;
    pub const MAX_CONCURRENCY: usize = 1_000;
    pub const LOG_CAPACITY: usize = 1_000;
    pub const LOG_LEVEL: &str = "info";
}
