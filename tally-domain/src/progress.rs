//! Session progress
//!
//! Always computed over the entire loaded set, never the filtered view.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::entities::StockPosition;

/// Completion figures for a counting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Positions loaded
    pub total: usize,
    /// Positions counted
    pub counted: usize,
    /// Positions not yet counted
    pub pending: usize,
    /// Counted positions that disagree with the ledger
    pub with_difference: usize,
    /// `round(100 * counted / total)`, 0 when nothing is loaded
    pub pct: u32,
}

impl Progress {
    /// Compute progress over a set of positions.
    pub fn compute<'a, I>(positions: I) -> Self
    where
        I: IntoIterator<Item = &'a StockPosition>,
    {
        let mut progress = Progress::default();
        for position in positions {
            progress.total += 1;
            if position.is_counted {
                progress.counted += 1;
                if position.outcome().state.is_difference() {
                    progress.with_difference += 1;
                }
            }
        }
        progress.pending = progress.total - progress.counted;
        progress.pct = percentage(progress.counted, progress.total);
        progress
    }
}

fn percentage(counted: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let ratio = Decimal::from(counted) * Decimal::ONE_HUNDRED / Decimal::from(total);
    ratio
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}
