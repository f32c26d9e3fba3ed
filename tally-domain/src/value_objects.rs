//! Value Objects for the Tally Domain
//!
//! Validation rules applied to operator-entered quantities before they
//! leave the client.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Counted quantity below zero while the policy forbids it
    #[error("Invalid count: {0} is negative")]
    NegativeCount(Decimal),

    /// Quantity could not be interpreted
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}

// =============================================================================
// CountPolicy
// =============================================================================

/// Rules a counted quantity must satisfy before it is applied.
///
/// # Example
///
/// ```
/// # use tally_domain::CountPolicy;
/// # use rust_decimal_macros::dec;
/// let policy = CountPolicy::default();
/// assert!(policy.validate(dec!(4.5)).is_ok());
/// assert!(policy.validate(dec!(-1)).is_err());
///
/// let lenient = CountPolicy { allow_negative: true };
/// assert!(lenient.validate(dec!(-1)).is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountPolicy {
    /// Accept counts below zero
    pub allow_negative: bool,
}

impl CountPolicy {
    /// Validate a counted quantity, returning it unchanged when accepted.
    ///
    /// # Errors
    /// Returns `DomainError::NegativeCount` if the value is below zero and
    /// negative counts are not allowed.
    pub fn validate(&self, quantity: Decimal) -> Result<Decimal, DomainError> {
        if !self.allow_negative && quantity.is_sign_negative() && !quantity.is_zero() {
            return Err(DomainError::NegativeCount(quantity));
        }
        Ok(quantity)
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Format a quantity with exactly two decimal places.
///
/// Midpoints round away from zero.
///
/// ```
/// # use tally_domain::format_quantity;
/// # use rust_decimal_macros::dec;
/// assert_eq!(format_quantity(dec!(3)), "3.00");
/// assert_eq!(format_quantity(dec!(2.345)), "2.35");
/// assert_eq!(format_quantity(dec!(-0.125)), "-0.13");
/// ```
pub fn format_quantity(quantity: Decimal) -> String {
    let rounded = quantity.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_policy_rejects_negative() {
        let policy = CountPolicy::default();
        assert_eq!(policy.validate(dec!(-0.01)), Err(DomainError::NegativeCount(dec!(-0.01))));
        assert_eq!(policy.validate(dec!(0)), Ok(dec!(0)));
        assert_eq!(policy.validate(dec!(12.5)), Ok(dec!(12.5)));
    }

    #[test]
    fn test_negative_zero_is_accepted() {
        let policy = CountPolicy::default();
        let negative_zero = dec!(-0.00);
        assert!(policy.validate(negative_zero).is_ok());
    }

    #[test]
    fn test_lenient_policy_accepts_negative() {
        let policy = CountPolicy { allow_negative: true };
        assert_eq!(policy.validate(dec!(-3)), Ok(dec!(-3)));
    }

    #[test]
    fn test_format_quantity_pads_and_rounds() {
        assert_eq!(format_quantity(dec!(0)), "0.00");
        assert_eq!(format_quantity(dec!(10.5)), "10.50");
        assert_eq!(format_quantity(dec!(1.005)), "1.01");
        assert_eq!(format_quantity(dec!(7.994)), "7.99");
    }
}
