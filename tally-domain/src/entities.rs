//! Domain Entities for Tally
//!
//! Entities have identity and carry the descriptive fields loaded from the
//! system of record. A stock position is the unit being counted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::diff::{classify, DiffOutcome};

/// Ledger record id of a stock position (quant)
pub type PositionId = u64;

/// Ledger record id of a stock location
pub type LocationId = u64;

/// Ledger record id of a product variant
pub type ProductId = u64;

// =============================================================================
// StockPosition
// =============================================================================

/// A quantity of one product at one location, optionally lot-tracked.
///
/// `expected_quantity` is the system-of-record baseline and is never changed
/// by the client. Only `counted_quantity` and `is_counted` move during a
/// session, and `is_counted` implies `counted_quantity` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPosition {
    /// Unique identifier within a load
    pub id: PositionId,
    /// Product record id
    pub product_id: ProductId,
    /// Product display name, possibly with variant attributes after a comma
    pub product_name: String,
    /// Internal reference code of the product
    pub product_code: Option<String>,
    /// Location record id
    pub location_id: LocationId,
    /// Full location name (e.g. "WH/Stock/Shelf 1")
    pub location_name: String,
    /// Lot or serial number, when tracked
    pub lot_name: Option<String>,
    /// Unit of measure name
    pub unit_name: String,
    /// Quantity per the system of record at load time
    pub expected_quantity: Decimal,
    /// Quantity entered by the operator
    pub counted_quantity: Option<Decimal>,
    /// Whether a count has been submitted
    pub is_counted: bool,
    /// Difference last reported by the ledger, if any
    pub diff_quantity: Option<Decimal>,
}

impl StockPosition {
    /// Create an uncounted position.
    pub fn new(
        id: PositionId,
        product_id: ProductId,
        product_name: impl Into<String>,
        location_id: LocationId,
        location_name: impl Into<String>,
        unit_name: impl Into<String>,
        expected_quantity: Decimal,
    ) -> Self {
        Self {
            id,
            product_id,
            product_name: product_name.into(),
            product_code: None,
            location_id,
            location_name: location_name.into(),
            lot_name: None,
            unit_name: unit_name.into(),
            expected_quantity,
            counted_quantity: None,
            is_counted: false,
            diff_quantity: None,
        }
    }

    /// Attach a lot name.
    pub fn with_lot(mut self, lot_name: impl Into<String>) -> Self {
        self.lot_name = Some(lot_name.into());
        self
    }

    /// Attach a product reference code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.product_code = Some(code.into());
        self
    }

    /// Mark the position as already counted.
    pub fn with_count(mut self, counted: Decimal) -> Self {
        self.record_count(counted);
        self
    }

    /// Record a counted quantity.
    pub fn record_count(&mut self, counted: Decimal) {
        self.counted_quantity = Some(counted);
        self.is_counted = true;
    }

    /// Forget the counted quantity.
    pub fn clear_count(&mut self) {
        self.counted_quantity = None;
        self.is_counted = false;
    }

    /// Restore a previously captured count state.
    pub fn restore(&mut self, snapshot: CountSnapshot) {
        self.counted_quantity = snapshot.counted_quantity;
        self.is_counted = snapshot.is_counted && snapshot.counted_quantity.is_some();
    }

    /// Capture the current count state.
    pub fn count_snapshot(&self) -> CountSnapshot {
        CountSnapshot {
            counted_quantity: self.counted_quantity,
            is_counted: self.is_counted,
        }
    }

    /// Counted quantity, only when the position has been counted.
    pub fn effective_count(&self) -> Option<Decimal> {
        if self.is_counted {
            self.counted_quantity
        } else {
            None
        }
    }

    /// Classify the current count against the expected quantity.
    pub fn outcome(&self) -> DiffOutcome {
        classify(self.expected_quantity, self.effective_count())
    }

    /// Product name without variant attributes (text before the first comma).
    pub fn short_name(&self) -> &str {
        self.product_name
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or(&self.product_name)
    }

    /// Case-insensitive substring match against product and location names.
    ///
    /// `needle` must already be lowercase; an empty needle matches everything.
    pub fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.product_name.to_lowercase().contains(needle)
            || self.location_name.to_lowercase().contains(needle)
    }
}

/// Count state of one position at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSnapshot {
    /// Counted quantity at capture time
    pub counted_quantity: Option<Decimal>,
    /// Counted flag at capture time
    pub is_counted: bool,
}

// =============================================================================
// Location / Product
// =============================================================================

/// An internal stock location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Location record id
    pub id: LocationId,
    /// Full location name
    pub name: String,
}

impl Location {
    /// Create a location.
    pub fn new(id: LocationId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// A storable product, as offered by product search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product record id
    pub id: ProductId,
    /// Display name
    pub display_name: String,
    /// Internal reference code
    pub code: Option<String>,
}

impl Product {
    /// Create a product without reference code.
    pub fn new(id: ProductId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            code: None,
        }
    }

    /// Attach a reference code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
