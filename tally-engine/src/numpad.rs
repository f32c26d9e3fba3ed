//! Quantity Input State Machine
//!
//! Turns discrete keystrokes into a validated decimal string.
//!
//! # Lifecycle
//!
//! ```text
//! Closed ──open()──► Open ──confirm()──► Closed (value produced)
//!                     │
//!                     ├──skip()/close()──► Closed (buffer discarded)
//!                     │
//!                     └── key() / backspace() / quick_set() edit the buffer
//! ```
//!
//! The transient opening animation of a visual host has no semantic effect
//! and is collapsed into `Open`.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_domain::{classify, format_quantity, DiffOutcome};
use tracing::trace;

use crate::error::{InputError, InputResult};

/// Maximum number of characters a keystroke can grow the buffer to.
pub const MAX_BUFFER_LEN: usize = 8;

const SEPARATOR: char = '.';

/// Lifecycle phase of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputPhase {
    /// No count in progress
    #[default]
    Closed,
    /// Accepting keystrokes
    Open,
}

/// Why a keystroke was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRejection {
    /// Input is not open
    Closed,
    /// Buffer already holds a decimal separator
    SecondSeparator,
    /// Buffer reached `MAX_BUFFER_LEN`
    BufferFull,
    /// Not a digit or separator
    NotNumeric,
}

/// Effect of a single keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "lowercase")]
pub enum KeyOutcome {
    /// Buffer changed
    Accepted,
    /// Buffer unchanged
    Rejected(KeyRejection),
}

impl KeyOutcome {
    /// Whether the keystroke changed the buffer.
    pub fn is_accepted(&self) -> bool {
        matches!(self, KeyOutcome::Accepted)
    }
}

/// Numeric keypad buffer with an open/closed lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityInput {
    buffer: String,
    phase: InputPhase,
}

impl QuantityInput {
    /// Closed input with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the input, pre-filled with an existing count at two decimals.
    pub fn open(&mut self, initial: Option<Decimal>) {
        self.buffer = initial.map(format_quantity).unwrap_or_default();
        self.phase = InputPhase::Open;
    }

    /// Current buffer content.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current phase.
    pub fn phase(&self) -> InputPhase {
        self.phase
    }

    /// Whether the input accepts keystrokes.
    pub fn is_open(&self) -> bool {
        self.phase == InputPhase::Open
    }

    /// Append a digit or the decimal separator.
    pub fn key(&mut self, ch: char) -> KeyOutcome {
        let outcome = self.apply_key(ch);
        if let KeyOutcome::Rejected(reason) = outcome {
            trace!(key = %ch, buffer = %self.buffer, ?reason, "Key rejected");
        }
        outcome
    }

    fn apply_key(&mut self, ch: char) -> KeyOutcome {
        if !self.is_open() {
            return KeyOutcome::Rejected(KeyRejection::Closed);
        }
        if ch != SEPARATOR && !ch.is_ascii_digit() {
            return KeyOutcome::Rejected(KeyRejection::NotNumeric);
        }
        if ch == SEPARATOR && self.buffer.contains(SEPARATOR) {
            return KeyOutcome::Rejected(KeyRejection::SecondSeparator);
        }
        if self.buffer.len() >= MAX_BUFFER_LEN {
            return KeyOutcome::Rejected(KeyRejection::BufferFull);
        }

        if ch == SEPARATOR && self.buffer.is_empty() {
            self.buffer.push('0');
        } else if ch != SEPARATOR && self.buffer == "0" {
            self.buffer.clear();
        }
        self.buffer.push(ch);
        KeyOutcome::Accepted
    }

    /// Remove the last character. No-op on an empty buffer.
    pub fn backspace(&mut self) -> InputResult<()> {
        self.ensure_open()?;
        self.buffer.pop();
        Ok(())
    }

    /// Replace the buffer wholesale.
    pub fn quick_set(&mut self, value: &str) -> InputResult<()> {
        self.ensure_open()?;
        self.buffer = value.to_string();
        Ok(())
    }

    /// Parse the buffer and close.
    ///
    /// On error the input stays open with its buffer untouched.
    pub fn confirm(&mut self) -> InputResult<Decimal> {
        self.ensure_open()?;
        let quantity = parse_buffer(&self.buffer)?;
        self.reset();
        Ok(quantity)
    }

    /// Close without producing a value.
    pub fn skip(&mut self) {
        self.reset();
    }

    /// Close without producing a value.
    pub fn close(&mut self) {
        self.reset();
    }

    /// Live difference of the current buffer against `expected`.
    ///
    /// Pending while the buffer is empty or not yet a number.
    pub fn preview(&self, expected: Decimal) -> DiffOutcome {
        classify(expected, parse_buffer(&self.buffer).ok())
    }

    fn ensure_open(&self) -> InputResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(InputError::NotOpen)
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.phase = InputPhase::Closed;
    }
}

/// Parse a keypad buffer. A trailing separator (`"5."`) is accepted.
pub fn parse_buffer(buffer: &str) -> InputResult<Decimal> {
    if buffer.is_empty() {
        return Err(InputError::EmptyInput);
    }
    let digits = buffer.strip_suffix(SEPARATOR).unwrap_or(buffer);
    if digits.is_empty() || digits == "-" {
        return Err(InputError::InvalidNumber(buffer.to_string()));
    }
    Decimal::from_str(digits).map_err(|_| InputError::InvalidNumber(buffer.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_domain::DiffState;

    fn open_input() -> QuantityInput {
        let mut input = QuantityInput::new();
        input.open(None);
        input
    }

    fn type_keys(input: &mut QuantityInput, keys: &str) {
        for ch in keys.chars() {
            input.key(ch);
        }
    }

    #[test]
    fn test_leading_zero_is_replaced() {
        let mut input = open_input();
        assert!(input.key('0').is_accepted());
        assert!(input.key('5').is_accepted());
        assert_eq!(input.buffer(), "5");

        assert!(input.key('.').is_accepted());
        assert_eq!(input.buffer(), "5.");

        assert_eq!(
            input.key('.'),
            KeyOutcome::Rejected(KeyRejection::SecondSeparator)
        );
        assert_eq!(input.buffer(), "5.");
    }

    #[test]
    fn test_separator_on_empty_buffer_inserts_zero() {
        let mut input = open_input();
        input.key('.');
        assert_eq!(input.buffer(), "0.");
        input.key('0');
        assert_eq!(input.buffer(), "0.0");
    }

    #[test]
    fn test_zero_then_separator_keeps_zero() {
        let mut input = open_input();
        type_keys(&mut input, "0.5");
        assert_eq!(input.buffer(), "0.5");
    }

    #[test]
    fn test_buffer_never_exceeds_max_len() {
        let mut input = open_input();
        type_keys(&mut input, "1234567.89123");
        assert_eq!(input.buffer().len(), MAX_BUFFER_LEN);
        assert_eq!(input.buffer(), "1234567.");
        assert_eq!(input.key('1'), KeyOutcome::Rejected(KeyRejection::BufferFull));
    }

    #[test]
    fn test_arbitrary_key_sequences_hold_buffer_invariants() {
        let alphabet = ['0', '1', '5', '9', '.'];
        // Deterministic pseudo-random walk over the keypad
        let mut seed: u32 = 17;
        for _ in 0..200 {
            let mut input = open_input();
            for _ in 0..20 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let ch = alphabet[(seed >> 16) as usize % alphabet.len()];
                input.key(ch);
                if seed % 7 == 0 {
                    input.backspace().unwrap();
                }
                assert!(input.buffer().len() <= MAX_BUFFER_LEN);
                assert!(input.buffer().matches('.').count() <= 1);
            }
        }
    }

    #[test]
    fn test_non_numeric_key_rejected() {
        let mut input = open_input();
        assert_eq!(input.key('x'), KeyOutcome::Rejected(KeyRejection::NotNumeric));
        assert_eq!(input.key('-'), KeyOutcome::Rejected(KeyRejection::NotNumeric));
        assert_eq!(input.buffer(), "");
    }

    #[test]
    fn test_keys_rejected_while_closed() {
        let mut input = QuantityInput::new();
        assert_eq!(input.key('1'), KeyOutcome::Rejected(KeyRejection::Closed));
        assert_eq!(input.backspace(), Err(InputError::NotOpen));
        assert_eq!(input.confirm(), Err(InputError::NotOpen));
    }

    #[test]
    fn test_open_prefills_two_decimals() {
        let mut input = QuantityInput::new();
        input.open(Some(dec!(4.5)));
        assert!(input.is_open());
        assert_eq!(input.buffer(), "4.50");
    }

    #[test]
    fn test_backspace() {
        let mut input = open_input();
        type_keys(&mut input, "12");
        input.backspace().unwrap();
        assert_eq!(input.buffer(), "1");
        input.backspace().unwrap();
        input.backspace().unwrap();
        assert_eq!(input.buffer(), "");
    }

    #[test]
    fn test_confirm_empty_fails_and_stays_open() {
        let mut input = open_input();
        assert_eq!(input.confirm(), Err(InputError::EmptyInput));
        assert!(input.is_open());
    }

    #[test]
    fn test_confirm_parses_and_closes() {
        let mut input = open_input();
        type_keys(&mut input, "12.5");
        assert_eq!(input.confirm(), Ok(dec!(12.5)));
        assert!(!input.is_open());
        assert_eq!(input.buffer(), "");
    }

    #[test]
    fn test_confirm_trailing_separator() {
        let mut input = open_input();
        type_keys(&mut input, "7.");
        assert_eq!(input.confirm(), Ok(dec!(7)));
    }

    #[test]
    fn test_confirm_invalid_quick_set() {
        let mut input = open_input();
        input.quick_set(".").unwrap();
        assert_eq!(input.confirm(), Err(InputError::InvalidNumber(".".into())));

        input.quick_set("abc").unwrap();
        assert!(matches!(input.confirm(), Err(InputError::InvalidNumber(_))));
        assert!(input.is_open());
    }

    #[test]
    fn test_quick_set_replaces_buffer() {
        let mut input = open_input();
        type_keys(&mut input, "99");
        input.quick_set("10.00").unwrap();
        assert_eq!(input.buffer(), "10.00");
        input.quick_set("").unwrap();
        assert_eq!(input.buffer(), "");
    }

    #[test]
    fn test_skip_and_close_discard_buffer() {
        let mut input = open_input();
        type_keys(&mut input, "3");
        input.skip();
        assert!(!input.is_open());
        assert_eq!(input.buffer(), "");

        input.open(None);
        type_keys(&mut input, "4");
        input.close();
        assert_eq!(input.phase(), InputPhase::Closed);
    }

    #[test]
    fn test_preview() {
        let mut input = open_input();
        assert_eq!(input.preview(dec!(5)).state, DiffState::Pending);
        type_keys(&mut input, "7");
        let outcome = input.preview(dec!(5));
        assert_eq!(outcome.state, DiffState::Over);
        assert_eq!(outcome.delta_label(), "+2.00");
        input.quick_set("5.00").unwrap();
        assert_eq!(input.preview(dec!(5)).delta_label(), "±0");
    }
}
