//! Tally Stock Ledger Port
//!
//! Interface to the remote inventory system of record, and an in-process
//! implementation selected at construction time when no remote is needed.
//!
//! # Architecture
//!
//! ```text
//!   Controller ──► dyn StockLedgerService ──┬──► InMemoryLedger (this crate)
//!                                           └──► HttpLedgerClient (tally-connectors)
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod memory;
pub mod ports;

pub use error::{LedgerError, LedgerResult};
pub use memory::{CountGate, InMemoryLedger, LedgerOp, NOTHING_TO_APPLY};
pub use ports::{CountReceipt, PositionPage, StockLedgerService};
