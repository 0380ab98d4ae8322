//! Error types for the orchestrator

use bench_adapters::AdapterError;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Recorded failures reached the ceiling; the run score is void
    #[error("The number of errors exceeded the allowed limit ({limit}); the score is void")]
    ErrorBudgetExceeded {
        /// Ceiling in force when the budget ran out
        limit: usize,
    },

    /// Every investor retired; scheduling must stop
    #[error("No active investors remain")]
    NoActiveInvestors,

    #[error("Failed to reset the audit log; contact the organizers: {0}")]
    AuditLogInitialization(#[source] AdapterError),

    #[error("Failed to initialize the application: {0}")]
    Initialization(#[source] AdapterError),

    #[error("Pre-test failed: {0:#}")]
    PreTest(anyhow::Error),

    #[error("Post-test failed: {0:#}")]
    PostTest(anyhow::Error),

    /// Investor factory could not build an investor
    #[error("Failed to set up investor: {0:#}")]
    InvestorSetup(anyhow::Error),

    #[error("Identity queue closed")]
    IdentityQueueClosed,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0:#}")]
    Config(anyhow::Error),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl BenchError {
    /// Errors after which the run cannot continue
    pub fn is_fatal(&self) -> bool {
        match self {
            BenchError::ErrorBudgetExceeded { .. } => false,
            BenchError::Adapter(e) => !e.is_recoverable(),
            _ => true,
        }
    }
}
