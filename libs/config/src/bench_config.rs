//! Benchmark Configuration Module
//!
//! Loads harness configuration from built-in defaults, an optional TOML file
//! and `BENCH__*` environment variable overrides, in that order.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for overrides (`BENCH__LIMITS__ERROR_MIN=10`)
pub const ENV_PREFIX: &str = "BENCH";

/// Main harness configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Target application and auxiliary service endpoints
    pub endpoints: EndpointConfig,

    /// Error budget floor/ceiling
    pub limits: LimitConfig,

    /// Population sizes and admission batch sizes
    pub population: PopulationConfig,

    pub pricing: PricingConfig,

    /// Identity prefetch queue
    pub identity: IdentityConfig,

    pub timeouts: TimeoutConfig,

    /// Run controller settings
    pub runner: RunnerConfig,
}

/// Service endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    /// Target application under test
    pub app: String,
    /// Bank endpoint handed to the application on initialize
    pub bank: String,
    /// Audit log endpoint handed to the application on initialize
    pub log: String,
    /// Bank endpoint the harness itself talks to
    pub internal_bank: String,
    /// Audit log endpoint the harness itself talks to
    pub internal_log: String,
}

/// Error budget limits
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LimitConfig {
    pub error_min: usize,
    pub error_max: usize,
}

/// Population sizes
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PopulationConfig {
    pub default_workers: usize,
    pub brute_force_workers: usize,
    pub add_users_on_share: usize,
    pub add_users_on_natural: usize,
    pub start_per_tick: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PricingConfig {
    pub base_price: i64,
    pub fallback_trade_price: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub queue_capacity: usize,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub client_ms: u64,
    pub retire_ms: u64,
    pub init_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    pub duration_secs: u64,
    pub tick_interval_ms: u64,
    pub max_concurrency: usize,
    /// Lines kept by the in-memory run log
    pub log_capacity: usize,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            app: "http://localhost:12510".to_string(),
            bank: "http://localhost:5515".to_string(),
            log: "http://localhost:5516".to_string(),
            internal_bank: "http://localhost:5515".to_string(),
            internal_log: "http://localhost:5516".to_string(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            error_min: defaults::limits::ERROR_MIN,
            error_max: defaults::limits::ERROR_MAX,
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            default_workers: defaults::population::DEFAULT_WORKERS,
            brute_force_workers: defaults::population::BRUTE_FORCE_WORKERS,
            add_users_on_share: defaults::population::ADD_USERS_ON_SHARE,
            add_users_on_natural: defaults::population::ADD_USERS_ON_NATURAL,
            start_per_tick: defaults::population::START_PER_TICK,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: defaults::pricing::BASE_PRICE,
            fallback_trade_price: defaults::pricing::FALLBACK_TRADE_PRICE,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::identity::QUEUE_CAPACITY,
            retry_delay_ms: defaults::identity::RETRY_DELAY_MS,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            client_ms: defaults::timeouts::CLIENT_MS,
            retire_ms: defaults::timeouts::RETIRE_MS,
            init_ms: defaults::timeouts::INIT_MS,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            duration_secs: defaults::runner::DURATION_SECS,
            tick_interval_ms: defaults::runner::TICK_INTERVAL_MS,
            max_concurrency: defaults::runner::MAX_CONCURRENCY,
            log_capacity: defaults::runner::LOG_CAPACITY,
            log_level: defaults::runner::LOG_LEVEL.to_string(),
        }
    }
}

impl IdentityConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl TimeoutConfig {
    pub fn client(&self) -> Duration {
        Duration::from_millis(self.client_ms)
    }

    pub fn retire(&self) -> Duration {
        Duration::from_millis(self.retire_ms)
    }

    pub fn init(&self) -> Duration {
        Duration::from_millis(self.init_ms)
    }
}

impl RunnerConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl BenchConfig {
    /// Load configuration from defaults, an optional file and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults =
            Config::try_from(&Self::default()).context("Failed to seed configuration defaults")?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            info!("Loading benchmark config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (BENCH__ prefix)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.expand_env_vars()?;
        config.validate()?;
        debug!(?config, "benchmark configuration loaded");
        Ok(config)
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in endpoint values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let endpoints = &mut self.endpoints;
        for (name, value) in [
            ("app", &mut endpoints.app),
            ("bank", &mut endpoints.bank),
            ("log", &mut endpoints.log),
            ("internal_bank", &mut endpoints.internal_bank),
            ("internal_log", &mut endpoints.internal_log),
        ] {
            let expanded = shellexpand::env(value.as_str())
                .with_context(|| format!("Failed to expand {} endpoint", name))?
                .into_owned();
            *value = expanded;
        }
        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.limits.error_max == 0 {
            bail!("limits.error_max must be positive");
        }

        if self.limits.error_min > self.limits.error_max {
            bail!(
                "limits.error_min ({}) must not exceed limits.error_max ({})",
                self.limits.error_min,
                self.limits.error_max
            );
        }

        if self.identity.queue_capacity == 0 {
            bail!("identity.queue_capacity must be positive");
        }

        if self.population.start_per_tick == 0 {
            bail!("population.start_per_tick must be positive");
        }

        if self.runner.max_concurrency == 0 {
            bail!("runner.max_concurrency must be positive");
        }

        for (name, value) in [
            ("app", &self.endpoints.app),
            ("bank", &self.endpoints.bank),
            ("log", &self.endpoints.log),
            ("internal_bank", &self.endpoints.internal_bank),
            ("internal_log", &self.endpoints.internal_log),
        ] {
            if value.trim().is_empty() {
                bail!("endpoints.{} must not be empty", name);
            }
        }

        Ok(())
    }
}
