//! Error types for the service adapters

use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Endpoint could not be parsed as a URL
    #[error("Invalid endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        /// The endpoint as configured
        endpoint: String,
        /// Parse failure
        #[source]
        source: url::ParseError,
    },

    /// Transport-level failure (connect, timeout, body read)
    #[error("Request to {service} failed: {source}")]
    Request {
        /// Service name used in logs
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Service answered with a non-success status
    #[error("{service} responded {status}: {message}")]
    Status {
        /// Service name used in logs
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Server-provided error message, or the raw body
        message: String,
    },

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl AdapterError {
    /// Check if this error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            AdapterError::Request { .. } => true,
            AdapterError::Status { status, .. } => *status >= 500 || *status == 429,
            AdapterError::InvalidEndpoint { .. } | AdapterError::ClientBuild(_) => false,
        }
    }

    /// HTTP status if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            AdapterError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
