//! Quantity input errors

use thiserror::Error;

/// Errors produced when confirming or editing a quantity buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Confirm was requested with nothing typed
    #[error("Enter a quantity first")]
    EmptyInput,

    /// Buffer content does not parse as a decimal
    #[error("Invalid quantity: {0:?}")]
    InvalidNumber(String),

    /// Operation requires an open input
    #[error("Quantity input is not open")]
    NotOpen,
}

/// Result type for quantity input operations
pub type InputResult<T> = Result<T, InputError>;
