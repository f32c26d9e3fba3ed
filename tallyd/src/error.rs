//! Controller error types.
//!
//! Every failure is one of four kinds:
//!
//! - **Validation**: empty or invalid input, handled locally, no network call
//! - **Remote**: transport or service-side failure, reported and not retried
//! - **NotFound**: target missing from the working set (stale view)
//! - **Config**: invalid configuration at startup

use serde::Serialize;
use thiserror::Error;

use tally_domain::DomainError;
use tally_engine::InputError;
use tally_ledger::LedgerError;
use tally_store::StoreError;

/// Input rejected before anything is sent to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Keypad buffer rejected
    #[error("{0}")]
    Input(#[from] InputError),

    /// Quantity rejected by the count policy
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Operation needs an open count
    #[error("No count is open")]
    NoActiveCount,

    /// Add-position flow without a location
    #[error("Please select a location")]
    MissingLocation,

    /// Add-position flow without a product
    #[error("Please select a product")]
    MissingProduct,

    /// Bulk apply already running
    #[error("Validation already in progress")]
    ApplyInProgress,

    /// Request value malformed
    #[error("{0}")]
    Invalid(String),
}

/// Controller-level errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Local validation failure
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Ledger failure
    #[error("Remote error: {0}")]
    Remote(#[from] LedgerError),

    /// Position missing from the working set
    #[error("Not found: {0}")]
    NotFound(StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server I/O error
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Error taxonomy class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid input
    Validation,
    /// Ledger failure
    Remote,
    /// Stale view
    NotFound,
    /// Bad configuration
    Config,
    /// Process-level failure
    Internal,
}

impl ControllerError {
    /// Taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::Validation(_) => ErrorKind::Validation,
            ControllerError::Remote(_) => ErrorKind::Remote,
            ControllerError::NotFound(_) => ErrorKind::NotFound,
            ControllerError::Config(_) => ErrorKind::Config,
            ControllerError::Server(_) => ErrorKind::Internal,
        }
    }
}

impl From<InputError> for ControllerError {
    fn from(err: InputError) -> Self {
        ControllerError::Validation(err.into())
    }
}

impl From<DomainError> for ControllerError {
    fn from(err: DomainError) -> Self {
        ControllerError::Validation(err.into())
    }
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ControllerError::NotFound(err),
            StoreError::UnknownFilter(_) => {
                ControllerError::Validation(ValidationError::Invalid(err.to_string()))
            },
        }
    }
}

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;
