//! Tally Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the stock position model, the diff classifier and
//! session progress rules.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod diff;
pub mod entities;
pub mod progress;
pub mod query;
pub mod value_objects;

// Re-export commonly used types
pub use diff::{classify, DiffOutcome, DiffState, MATCH_TOLERANCE};
pub use entities::{
    CountSnapshot, Location, LocationId, Product, ProductId, PositionId, StockPosition,
};
pub use progress::Progress;
pub use query::{ApplyScope, PageRequest, PositionFilter};
pub use value_objects::{format_quantity, CountPolicy, DomainError};
