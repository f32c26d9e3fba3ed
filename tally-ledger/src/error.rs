//! Stock ledger error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a stock ledger service.
///
/// Every variant is a remote failure from the controller's point of view:
/// it is reported to the operator and never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Service rejected the request
    #[error("{message}")]
    Remote {
        /// Message returned by the service
        message: String,
    },

    /// Request did not reach the service or the connection broke
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Response could not be decoded into the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Create a service-side error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Operator-facing message
    pub fn message(&self) -> String {
        match self {
            LedgerError::Remote { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
