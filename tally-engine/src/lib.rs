//! Tally Engine Layer
//!
//! Pure input logic, deterministic, no I/O.
//! Keystrokes in, validated quantities out.

#![warn(clippy::all)]

pub mod error;
pub mod numpad;
pub mod quick_set;

pub use error::{InputError, InputResult};
pub use numpad::{
    parse_buffer, InputPhase, KeyOutcome, KeyRejection, QuantityInput, MAX_BUFFER_LEN,
};
pub use quick_set::{quick_sets, QuickSet, QuickSetKind};
