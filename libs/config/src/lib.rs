//! # Benchmark Configuration
//!
//! Centralized configuration and defaults for the load-generation harness:
//! error budget limits, population sizes, admission batch sizes, prices,
//! timeouts and service endpoints.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bench_config::BenchConfig;
//!
//! let config = BenchConfig::load(None).expect("configuration");
//! assert!(config.limits.error_min <= config.limits.error_max);
//! ```

pub mod bench_config;
pub mod defaults;

// Re-export commonly used types
pub use bench_config::{
    BenchConfig, EndpointConfig, IdentityConfig, LimitConfig, PopulationConfig, PricingConfig,
    RunnerConfig, TimeoutConfig,
};
