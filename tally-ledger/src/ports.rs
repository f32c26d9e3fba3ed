//! Stock ledger port definition.
//!
//! The ledger is the system of record for stock positions. The controller
//! only talks to it through this trait; adapters decide the transport.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_domain::{
    ApplyScope, Location, LocationId, PageRequest, PositionFilter, PositionId, Product, ProductId,
    StockPosition,
};

use crate::error::LedgerResult;

// =============================================================================
// Stock Ledger Port
// =============================================================================

/// Port for the remote inventory system of record.
///
/// Implementations:
/// - `InMemoryLedger` - In-process ledger for tests and local development
/// - `HttpLedgerClient` - JSON-RPC over HTTP (tally-connectors)
///
/// Calls are plain request/response. No idempotency key is sent, so a
/// failed write may be retried by the operator re-entering the count.
#[async_trait]
pub trait StockLedgerService: Send + Sync {
    /// List one page of positions matching `filter`.
    ///
    /// `total` counts every matching position, not just the page.
    async fn list_positions(
        &self,
        filter: &PositionFilter,
        page: PageRequest,
    ) -> LedgerResult<PositionPage>;

    /// List internal locations for the location filter.
    async fn list_locations(&self) -> LedgerResult<Vec<Location>>;

    /// Search storable products by name.
    async fn search_products(&self, query: &str, limit: usize) -> LedgerResult<Vec<Product>>;

    /// Record a counted quantity on a position.
    async fn set_count(&self, id: PositionId, quantity: Decimal) -> LedgerResult<CountReceipt>;

    /// Commit every outstanding counted difference in scope as a stock
    /// adjustment. All-or-nothing.
    async fn apply_all(&self, scope: ApplyScope) -> LedgerResult<()>;

    /// Record a count for a product at a location, creating the position
    /// if the location does not hold the product yet.
    async fn create_position(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: Decimal,
    ) -> LedgerResult<PositionId>;

    /// Adapter name for logs.
    fn name(&self) -> &'static str;
}

/// One page of positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPage {
    /// Positions in ledger order
    pub positions: Vec<StockPosition>,
    /// Matching positions across all pages
    pub total: usize,
}

/// Ledger acknowledgement of a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountReceipt {
    /// Quantity the ledger stored
    pub quantity: Decimal,
    /// Stored quantity minus on-hand quantity
    pub diff_quantity: Decimal,
}
