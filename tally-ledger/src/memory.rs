//! In-process stock ledger.
//!
//! Behaves like the remote system of record closely enough to drive the
//! controller in tests and local development: counts are stored on the
//! position, `apply_all` moves them into the on-hand baseline, and any
//! operation can be made to fail once.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Semaphore;
use tracing::debug;

use tally_domain::{
    ApplyScope, Location, LocationId, PageRequest, PositionFilter, PositionId, Product, ProductId,
    StockPosition,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ports::{CountReceipt, PositionPage, StockLedgerService};

/// Message returned by `apply_all` when nothing in scope is counted.
pub const NOTHING_TO_APPLY: &str = "No inventory adjustments to apply.";

const LOCATION_LIMIT: usize = 50;

/// Ledger operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    /// `list_positions`
    ListPositions,
    /// `list_locations`
    ListLocations,
    /// `search_products`
    SearchProducts,
    /// `set_count`
    SetCount,
    /// `apply_all`
    ApplyAll,
    /// `create_position`
    CreatePosition,
}

#[derive(Debug, Default)]
struct LedgerState {
    positions: BTreeMap<PositionId, StockPosition>,
    locations: Vec<Location>,
    products: Vec<Product>,
    next_position_id: PositionId,
    failures: HashMap<LedgerOp, String>,
    calls: HashMap<LedgerOp, usize>,
    count_gate: Option<Arc<Semaphore>>,
}

impl LedgerState {
    /// Count the call and take any injected failure for it.
    fn enter(&mut self, op: LedgerOp) -> LedgerResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.remove(&op) {
            Some(message) => Err(LedgerError::remote(message)),
            None => Ok(()),
        }
    }
}

/// Holds `set_count` calls open until released.
///
/// Lets a test observe the optimistic state while a write is in flight.
#[derive(Debug, Clone)]
pub struct CountGate {
    permits: Arc<Semaphore>,
}

impl CountGate {
    /// Let one held `set_count` proceed.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }
}

/// In-memory stock ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded with a small warehouse for local development.
    pub fn demo() -> Self {
        let locations = vec![
            Location::new(8, "WH/Stock"),
            Location::new(21, "WH/Stock/Shelf 1"),
            Location::new(22, "WH/Stock/Shelf 2"),
        ];
        let products = vec![
            Product::new(101, "Office Chair, Black").with_code("FURN_7777"),
            Product::new(102, "Desk Lamp").with_code("LAMP_0001"),
            Product::new(103, "Cable Management Box"),
            Product::new(104, "Wood Screw, 4mm").with_code("SCR_0004"),
        ];
        let positions = vec![
            StockPosition::new(1, 101, "Office Chair, Black", 21, "WH/Stock/Shelf 1", "Units", dec!(10))
                .with_code("FURN_7777"),
            StockPosition::new(2, 102, "Desk Lamp", 21, "WH/Stock/Shelf 1", "Units", dec!(5))
                .with_code("LAMP_0001"),
            StockPosition::new(3, 103, "Cable Management Box", 22, "WH/Stock/Shelf 2", "Units", dec!(0)),
            StockPosition::new(4, 104, "Wood Screw, 4mm", 22, "WH/Stock/Shelf 2", "kg", dec!(2.5))
                .with_code("SCR_0004")
                .with_lot("LOT-2026-01"),
        ];

        Self::new()
            .with_locations(locations)
            .with_products(products)
            .with_positions(positions)
    }

    /// Replace the locations.
    pub fn with_locations(self, locations: Vec<Location>) -> Self {
        self.state().locations = locations;
        self
    }

    /// Replace the searchable products.
    pub fn with_products(self, products: Vec<Product>) -> Self {
        self.state().products = products;
        self
    }

    /// Replace the positions.
    pub fn with_positions(self, positions: Vec<StockPosition>) -> Self {
        {
            let mut state = self.state();
            state.next_position_id = positions.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            state.positions = positions.into_iter().map(|p| (p.id, p)).collect();
        }
        self
    }

    /// Make the next call of `op` fail with a remote error.
    pub fn fail_next(&self, op: LedgerOp, message: impl Into<String>) {
        self.state().failures.insert(op, message.into());
    }

    /// Number of calls of `op` received so far, failed ones included.
    pub fn calls(&self, op: LedgerOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Hold every subsequent `set_count` until released through the gate.
    pub fn hold_set_count(&self) -> CountGate {
        let permits = Arc::new(Semaphore::new(0));
        self.state().count_gate = Some(Arc::clone(&permits));
        CountGate { permits }
    }

    /// Stop holding `set_count` calls. Calls already waiting stay held.
    pub fn stop_holding(&self) {
        self.state().count_gate = None;
    }

    /// Current ledger copy of a position.
    pub fn position(&self, id: PositionId) -> Option<StockPosition> {
        self.state().positions.get(&id).cloned()
    }

    /// Current ledger copy of every position.
    pub fn positions(&self) -> Vec<StockPosition> {
        self.state().positions.values().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StockLedgerService for InMemoryLedger {
    async fn list_positions(
        &self,
        filter: &PositionFilter,
        page: PageRequest,
    ) -> LedgerResult<PositionPage> {
        let mut state = self.state();
        state.enter(LedgerOp::ListPositions)?;

        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<&StockPosition> = state
            .positions
            .values()
            .filter(|p| filter.location_id.map_or(true, |id| p.location_id == id))
            .filter(|p| {
                needle
                    .as_deref()
                    .map_or(true, |n| p.product_name.to_lowercase().contains(n))
            })
            .collect();
        matching.sort_by(|a, b| {
            a.location_name
                .cmp(&b.location_name)
                .then_with(|| a.product_name.cmp(&b.product_name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len();
        let positions = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        Ok(PositionPage { positions, total })
    }

    async fn list_locations(&self) -> LedgerResult<Vec<Location>> {
        let mut state = self.state();
        state.enter(LedgerOp::ListLocations)?;

        let mut locations = state.locations.clone();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        locations.truncate(LOCATION_LIMIT);
        Ok(locations)
    }

    async fn search_products(&self, query: &str, limit: usize) -> LedgerResult<Vec<Product>> {
        let mut state = self.state();
        state.enter(LedgerOp::SearchProducts)?;

        let needle = query.trim().to_lowercase();
        Ok(state
            .products
            .iter()
            .filter(|p| p.display_name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn set_count(&self, id: PositionId, quantity: Decimal) -> LedgerResult<CountReceipt> {
        let gate = {
            let mut state = self.state();
            *state.calls.entry(LedgerOp::SetCount).or_insert(0) += 1;
            state.count_gate.clone()
        };

        if let Some(permits) = gate {
            debug!(position_id = id, "Holding set_count");
            permits
                .acquire()
                .await
                .map_err(|e| LedgerError::Transport(e.to_string()))?
                .forget();
        }

        let mut state = self.state();
        if let Some(message) = state.failures.remove(&LedgerOp::SetCount) {
            return Err(LedgerError::remote(message));
        }

        let position = state
            .positions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::remote("Record not found"))?;
        position.record_count(quantity);
        let diff_quantity = quantity - position.expected_quantity;
        position.diff_quantity = Some(diff_quantity);

        Ok(CountReceipt {
            quantity,
            diff_quantity,
        })
    }

    async fn apply_all(&self, scope: ApplyScope) -> LedgerResult<()> {
        let mut state = self.state();
        state.enter(LedgerOp::ApplyAll)?;

        let in_scope: Vec<PositionId> = state
            .positions
            .values()
            .filter(|p| scope.location_id.map_or(true, |id| p.location_id == id))
            .filter(|p| p.is_counted)
            .map(|p| p.id)
            .collect();

        if in_scope.is_empty() {
            return Err(LedgerError::remote(NOTHING_TO_APPLY));
        }

        for id in &in_scope {
            if let Some(position) = state.positions.get_mut(id) {
                if let Some(counted) = position.counted_quantity {
                    position.expected_quantity = counted;
                }
                position.clear_count();
                position.diff_quantity = None;
            }
        }

        debug!(applied = in_scope.len(), "Inventory adjustments applied");
        Ok(())
    }

    async fn create_position(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: Decimal,
    ) -> LedgerResult<PositionId> {
        let mut state = self.state();
        state.enter(LedgerOp::CreatePosition)?;

        if let Some(existing) = state
            .positions
            .values_mut()
            .find(|p| p.product_id == product_id && p.location_id == location_id)
        {
            existing.record_count(quantity);
            existing.diff_quantity = Some(quantity - existing.expected_quantity);
            return Ok(existing.id);
        }

        let product = state
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| LedgerError::remote("Product not found"))?;
        let location = state
            .locations
            .iter()
            .find(|l| l.id == location_id)
            .cloned()
            .ok_or_else(|| LedgerError::remote("Location not found"))?;

        let id = state.next_position_id.max(1);
        state.next_position_id = id + 1;

        let mut position = StockPosition::new(
            id,
            product.id,
            product.display_name,
            location.id,
            location.name,
            "Units",
            Decimal::ZERO,
        )
        .with_count(quantity);
        position.product_code = product.code;
        position.diff_quantity = Some(quantity);
        state.positions.insert(id, position);

        Ok(id)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Tests
// =============================================================================
