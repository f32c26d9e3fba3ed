//! Tally Working Set Store
//!
//! In-memory collection of the stock positions loaded for one counting
//! session, with search, status filtering and pagination over a possibly
//! partial load.
//!
//! # Usage
//!
//! ```rust
//! use tally_domain::{PageRequest, PositionFilter, StockPosition};
//! use tally_store::{StatusFilter, WorkingSet};
//! use rust_decimal_macros::dec;
//!
//! let mut set = WorkingSet::new();
//! let positions = vec![
//!     StockPosition::new(1, 10, "Office Chair", 1, "WH/Stock", "Units", dec!(4)),
//!     StockPosition::new(2, 11, "Desk Lamp", 1, "WH/Stock", "Units", dec!(2)),
//! ];
//! set.load(&PositionFilter::default(), PageRequest::first(50), positions, 2);
//!
//! set.apply_local(1, dec!(4)).unwrap();
//! set.set_status_filter(StatusFilter::Todo);
//!
//! assert_eq!(set.filtered_view().len(), 1);
//! assert_eq!(set.progress().pct, 50);
//! ```

#![warn(clippy::all)]

mod error;
mod view;
mod working_set;

pub use error::{StoreError, StoreResult};
pub use view::{PageCursor, StatusFilter};
pub use working_set::{LoadSummary, WorkingSet};
