//! Tally Daemon Library
//!
//! Reconciliation controller and host adapters for stock counting.
//!
//! # Architecture
//!
//! ```text
//! Host (HTTP) → API → Controller → StockLedgerService → Inventory server
//!                        │
//!                        ├── Session (working set, active count)
//!                        └── Notifier (outcome messages)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Controller**: Load, count, optimistic apply, rollback, apply-all
//! - **Session**: Working set, view state and the active count
//! - **Notifier**: Single visible message with auto-dismiss
//! - **API**: HTTP endpoints for the counting UI
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use tallyd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::from_config(config).expect("Invalid ledger config");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod debounce;
pub mod error;
pub mod notify;
pub mod session;

// Re-exports for convenience
pub use config::{ApiConfig, Config, Environment, LedgerConfig, LedgerKind, SessionConfig};
pub use controller::{Controller, CountReport, LoadOutcome};
pub use daemon::Daemon;
pub use debounce::Debouncer;
pub use error::{ControllerError, ControllerResult, ErrorKind, ValidationError};
pub use notify::{Notification, Notifier, Severity};
pub use session::{ActiveCount, PositionView, SessionPhase, SessionSnapshot};
