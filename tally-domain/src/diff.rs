//! Diff Classifier
//!
//! Maps an expected and an optional counted quantity to a diff outcome.
//! This is the single source of truth for every match/over/short decision
//! a host makes when rendering a position.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::value_objects::format_quantity;

/// Absolute difference below which a count is considered a match.
pub const MATCH_TOLERANCE: Decimal = dec!(0.005);

/// Classification of a count against its expected quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffState {
    /// Not counted yet
    Pending,
    /// Within tolerance of the expected quantity
    Match,
    /// Counted more than expected
    Over,
    /// Counted less than expected
    Short,
}

impl DiffState {
    /// Whether the count disagrees with the ledger.
    pub fn is_difference(&self) -> bool {
        matches!(self, DiffState::Over | DiffState::Short)
    }
}

impl std::fmt::Display for DiffState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffState::Pending => write!(f, "pending"),
            DiffState::Match => write!(f, "match"),
            DiffState::Over => write!(f, "over"),
            DiffState::Short => write!(f, "short"),
        }
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOutcome {
    /// Classification
    pub state: DiffState,
    /// `counted - expected`, absent while pending
    pub delta: Option<Decimal>,
}

impl DiffOutcome {
    /// List label: `Pending`, `✓ Match`, `+2.00 over`, `1.50 short`.
    pub fn label(&self) -> String {
        match (self.state, self.delta) {
            (DiffState::Match, _) => "✓ Match".to_string(),
            (DiffState::Over, Some(delta)) => format!("+{} over", format_quantity(delta)),
            (DiffState::Short, Some(delta)) => format!("{} short", format_quantity(delta.abs())),
            _ => "Pending".to_string(),
        }
    }

    /// Compact signed label: `—`, `±0`, `+2.00`, `-1.50`.
    pub fn delta_label(&self) -> String {
        match (self.state, self.delta) {
            (DiffState::Match, _) => "±0".to_string(),
            (DiffState::Over, Some(delta)) => format!("+{}", format_quantity(delta)),
            (DiffState::Short, Some(delta)) => format_quantity(delta),
            _ => "—".to_string(),
        }
    }
}

/// Classify a counted quantity against the expected one.
///
/// ```
/// # use tally_domain::{classify, DiffState};
/// # use rust_decimal_macros::dec;
/// assert_eq!(classify(dec!(10), None).state, DiffState::Pending);
/// assert_eq!(classify(dec!(10), Some(dec!(10.004))).state, DiffState::Match);
/// assert_eq!(classify(dec!(5), Some(dec!(7))).state, DiffState::Over);
/// assert_eq!(classify(dec!(5), Some(dec!(4.99))).state, DiffState::Short);
/// ```
pub fn classify(expected: Decimal, counted: Option<Decimal>) -> DiffOutcome {
    let Some(counted) = counted else {
        return DiffOutcome {
            state: DiffState::Pending,
            delta: None,
        };
    };

    let delta = counted - expected;
    let state = if delta.abs() < MATCH_TOLERANCE {
        DiffState::Match
    } else if delta > Decimal::ZERO {
        DiffState::Over
    } else {
        DiffState::Short
    };

    DiffOutcome {
        state,
        delta: Some(delta),
    }
}

// =============================================================================
// Tests
// =============================================================================
