//! Quick-set shortcuts offered next to the keypad

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_domain::format_quantity;

/// Kind of shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickSetKind {
    /// Use the expected quantity
    Match,
    /// Whole-unit floor of a fractional expected quantity
    Floor,
    /// Nothing found
    Zero,
    /// Empty the buffer
    Clear,
}

/// A shortcut value for `QuantityInput::quick_set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickSet {
    /// Shortcut kind
    pub kind: QuickSetKind,
    /// Button label
    pub label: String,
    /// Buffer content it sets
    pub value: String,
}

/// Shortcuts for a position with the given expected quantity.
///
/// The floor shortcut is only offered when the expected quantity is
/// fractional and its floor is non-negative.
pub fn quick_sets(expected: Decimal) -> Vec<QuickSet> {
    let exact = format_quantity(expected);
    let mut sets = vec![QuickSet {
        kind: QuickSetKind::Match,
        label: format!("✓ Match ({})", exact),
        value: exact,
    }];

    let floor = expected.floor();
    if floor != expected && floor >= Decimal::ZERO {
        let value = format_quantity(floor);
        sets.push(QuickSet {
            kind: QuickSetKind::Floor,
            label: value.clone(),
            value,
        });
    }

    let zero = format_quantity(Decimal::ZERO);
    sets.push(QuickSet {
        kind: QuickSetKind::Zero,
        label: zero.clone(),
        value: zero,
    });
    sets.push(QuickSet {
        kind: QuickSetKind::Clear,
        label: "Clear".to_string(),
        value: String::new(),
    });
    sets
}
