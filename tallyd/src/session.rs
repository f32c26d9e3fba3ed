//! Counting session state.
//!
//! The controller exclusively owns one `Session`. Host adapters only ever
//! see owned [`SessionSnapshot`]s derived from it.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_domain::{
    CountSnapshot, DiffOutcome, Location, LocationId, PositionId, Product, Progress, StockPosition,
};
use tally_engine::{quick_sets, QuantityInput, QuickSet};
use tally_store::{PageCursor, StatusFilter, WorkingSet};

use crate::notify::Notification;

/// Lifecycle phase of a counting session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum SessionPhase {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// Full load in flight
    Loading,
    /// Working set available
    Ready,
    /// Last full load failed; retry by loading again
    Error {
        /// Failure message
        message: String,
    },
}

/// The single active count, attached to one position.
#[derive(Debug, Clone)]
pub struct CountEntry {
    /// Position being counted
    pub position_id: PositionId,
    /// Keypad state
    pub input: QuantityInput,
}

/// Mutable session state.
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) phase: SessionPhase,
    pub(crate) validating: bool,
    pub(crate) loading_more: bool,
    pub(crate) working_set: WorkingSet,
    pub(crate) entry: Option<CountEntry>,
    pub(crate) locations: Vec<Location>,
    pub(crate) product_query: String,
    pub(crate) product_suggestions: Vec<Product>,
    /// Latest write sequence issued per position
    pub(crate) write_generations: HashMap<PositionId, u64>,
    pub(crate) next_write: u64,
    /// Count state the ledger is known to hold, per position written since the last load
    pub(crate) acknowledged: HashMap<PositionId, CountSnapshot>,
    /// Request id of the most recently issued full load
    pub(crate) latest_load: u64,
}

impl Session {
    /// Issue a new write sequence for `id`.
    ///
    /// `previous` is the local count state the write replaces. It becomes
    /// the acknowledged state unless one is already tracked.
    pub(crate) fn begin_write(&mut self, id: PositionId, previous: CountSnapshot) -> u64 {
        self.acknowledged.entry(id).or_insert(previous);
        self.next_write += 1;
        self.write_generations.insert(id, self.next_write);
        self.next_write
    }

    /// Record that the ledger stored `counted` for `id`.
    pub(crate) fn acknowledge(&mut self, id: PositionId, counted: Decimal) {
        self.acknowledged.insert(
            id,
            CountSnapshot {
                counted_quantity: Some(counted),
                is_counted: true,
            },
        );
    }

    /// Count state to restore when the latest write for `id` fails.
    pub(crate) fn acknowledged(&self, id: PositionId) -> Option<CountSnapshot> {
        self.acknowledged.get(&id).copied()
    }

    /// Forget write tracking after the working set was replaced.
    pub(crate) fn reset_writes(&mut self) {
        self.write_generations.clear();
        self.acknowledged.clear();
    }

    /// Whether `generation` is still the latest write for `id`.
    pub(crate) fn is_latest_write(&self, id: PositionId, generation: u64) -> bool {
        self.write_generations.get(&id) == Some(&generation)
    }

    /// View of the active count, if any.
    pub(crate) fn active_count(&self) -> Option<ActiveCount> {
        let entry = self.entry.as_ref()?;
        let position = self.working_set.position(entry.position_id)?;
        Some(ActiveCount::new(position, &entry.input))
    }

    pub(crate) fn snapshot(&self, notification: Option<Notification>) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase.clone(),
            validating: self.validating,
            loading_more: self.loading_more,
            search_query: self.working_set.search_query().to_string(),
            status_filter: self.working_set.status_filter(),
            location_id: self.working_set.location_filter(),
            positions: self
                .working_set
                .filtered_view()
                .into_iter()
                .map(PositionView::from)
                .collect(),
            progress: self.working_set.progress(),
            cursor: self.working_set.cursor(),
            active_count: self.active_count(),
            locations: self.locations.clone(),
            product_suggestions: self.product_suggestions.clone(),
            notification,
        }
    }
}

// =============================================================================
// Snapshot views
// =============================================================================

/// A position with its derived outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionView {
    /// Position data
    #[serde(flatten)]
    pub position: StockPosition,
    /// Product name without variant attributes
    pub short_name: String,
    /// Diff outcome
    pub outcome: DiffOutcome,
    /// Outcome label
    pub label: String,
}

impl From<&StockPosition> for PositionView {
    fn from(position: &StockPosition) -> Self {
        let outcome = position.outcome();
        Self {
            short_name: position.short_name().to_string(),
            label: outcome.label(),
            outcome,
            position: position.clone(),
        }
    }
}

/// The active count as shown next to the keypad.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveCount {
    /// Position being counted
    pub position_id: PositionId,
    /// Product name without variant attributes
    pub short_name: String,
    /// Expected quantity
    pub expected_quantity: Decimal,
    /// Unit name
    pub unit_name: String,
    /// Keypad buffer
    pub buffer: String,
    /// Live difference of the buffer
    pub preview: DiffOutcome,
    /// Live difference label
    pub preview_label: String,
    /// Shortcut values
    pub quick_sets: Vec<QuickSet>,
}

impl ActiveCount {
    fn new(position: &StockPosition, input: &QuantityInput) -> Self {
        let preview = input.preview(position.expected_quantity);
        Self {
            position_id: position.id,
            short_name: position.short_name().to_string(),
            expected_quantity: position.expected_quantity,
            unit_name: position.unit_name.clone(),
            buffer: input.buffer().to_string(),
            preview_label: preview.delta_label(),
            preview,
            quick_sets: quick_sets(position.expected_quantity),
        }
    }
}

/// Owned, serialisable view of the session for host adapters.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Lifecycle phase
    #[serde(flatten)]
    pub phase: SessionPhase,
    /// Bulk apply in flight
    pub validating: bool,
    /// Next page in flight
    pub loading_more: bool,
    /// Free-text search
    pub search_query: String,
    /// Status partition
    pub status_filter: StatusFilter,
    /// Location scope
    pub location_id: Option<LocationId>,
    /// Filtered positions in load order
    pub positions: Vec<PositionView>,
    /// Completion over the whole loaded set
    pub progress: Progress,
    /// Pagination cursor
    pub cursor: PageCursor,
    /// Active count, if any
    pub active_count: Option<ActiveCount>,
    /// Locations for the filter
    pub locations: Vec<Location>,
    /// Product search suggestions
    pub product_suggestions: Vec<Product>,
    /// Visible notification
    pub notification: Option<Notification>,
}
