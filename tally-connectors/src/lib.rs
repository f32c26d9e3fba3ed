//! Tally Connectors
//!
//! Remote adapters for the stock ledger port.
//!
//! # Modules
//!
//! - `http_ledger`: JSON-RPC client for the inventory server
//! - `wire`: Wire shapes and their normalisation into domain types

#![warn(clippy::all)]

pub mod http_ledger;
pub mod wire;

pub use http_ledger::{HttpLedgerClient, DEFAULT_TIMEOUT_SECS};
pub use wire::Related;
