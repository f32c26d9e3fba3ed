//! Working set errors

use thiserror::Error;

/// Errors that can occur in the working set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Entity not found in the loaded set
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (position)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Status filter string not recognised
    #[error("Unknown status filter: {0}")]
    UnknownFilter(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }
}

/// Result type for working set operations
pub type StoreResult<T> = Result<T, StoreError>;
