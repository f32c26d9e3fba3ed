//! Working Set Store
//!
//! Ordered, id-keyed collection of the positions loaded for a session,
//! plus the ephemeral view state used to derive what the operator sees.
//!
//! # Invariants
//!
//! - No two positions share an `id`.
//! - Insertion order is load order and is never changed by filtering.
//! - Only `counted_quantity` and `is_counted` are ever mutated.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_domain::{
    CountSnapshot, LocationId, PageRequest, PositionFilter, PositionId, Progress, StockPosition,
};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::view::{PageCursor, StatusFilter};

/// What a call to [`WorkingSet::load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Positions in the response
    pub received: usize,
    /// Positions actually inserted (duplicates dropped)
    pub added: usize,
    /// Whether the previous contents were replaced
    pub replaced: bool,
    /// Positions now held
    pub loaded: usize,
    /// Total reported by the ledger
    pub total: usize,
    /// More pages are available
    pub has_more: bool,
}

/// In-memory working set of stock positions.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    positions: Vec<StockPosition>,
    index: HashMap<PositionId, usize>,
    search_query: String,
    status_filter: StatusFilter,
    location_filter: Option<LocationId>,
    cursor: PageCursor,
}

impl WorkingSet {
    /// Empty working set with default view state.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Merge one page of positions returned for `filter` and `page`.
    ///
    /// A page at offset 0 replaces the stored sequence; any other page is
    /// appended. Positions whose id is already held are dropped in both
    /// cases, so overlapping pages never create duplicates.
    pub fn load(
        &mut self,
        filter: &PositionFilter,
        page: PageRequest,
        positions: Vec<StockPosition>,
        total: usize,
    ) -> LoadSummary {
        let replaced = page.offset == 0;
        if replaced {
            self.positions.clear();
            self.index.clear();
            self.location_filter = filter.location_id;
        }

        let received = positions.len();
        let mut added = 0;
        for position in positions {
            if self.index.contains_key(&position.id) {
                debug!(position_id = position.id, "Duplicate position dropped on load");
                continue;
            }
            self.index.insert(position.id, self.positions.len());
            self.positions.push(position);
            added += 1;
        }

        self.cursor = PageCursor::after(page.offset, page.limit, total);

        LoadSummary {
            received,
            added,
            replaced,
            loaded: self.positions.len(),
            total,
            has_more: self.cursor.has_more,
        }
    }

    /// Page to request next, if the ledger reported more records.
    pub fn next_page(&self) -> Option<PageRequest> {
        if !self.cursor.has_more {
            return None;
        }
        Some(PageRequest {
            offset: self.cursor.offset,
            limit: self.cursor.limit,
        }
        .next())
    }

    /// Server-side filter matching the current view state.
    ///
    /// Search stays local and is not forwarded.
    pub fn server_filter(&self) -> PositionFilter {
        PositionFilter::at_location(self.location_filter)
    }

    /// Drop every position and reset the cursor. View state is kept.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.index.clear();
        self.cursor = PageCursor::default();
    }

    // =========================================================================
    // Optimistic updates
    // =========================================================================

    /// Record a count locally, before the ledger confirms it.
    ///
    /// Returns the count state it replaced so the caller can roll back.
    pub fn apply_local(&mut self, id: PositionId, counted: Decimal) -> StoreResult<CountSnapshot> {
        let position = self.position_mut(id)?;
        let previous = position.count_snapshot();
        position.record_count(counted);
        Ok(previous)
    }

    /// Restore a count state captured by [`WorkingSet::apply_local`].
    pub fn revert_local(&mut self, id: PositionId, previous: CountSnapshot) -> StoreResult<()> {
        self.position_mut(id)?.restore(previous);
        Ok(())
    }

    fn position_mut(&mut self, id: PositionId) -> StoreResult<&mut StockPosition> {
        let idx = *self
            .index
            .get(&id)
            .ok_or_else(|| StoreError::not_found("position", id))?;
        self.positions
            .get_mut(idx)
            .ok_or_else(|| StoreError::not_found("position", id))
    }

    // =========================================================================
    // View state
    // =========================================================================

    /// Set the free-text search.
    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    /// Set the status partition.
    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.status_filter = filter;
    }

    /// Set the location the next full load is scoped to.
    pub fn set_location_filter(&mut self, location_id: Option<LocationId>) {
        self.location_filter = location_id;
    }

    /// Current free-text search.
    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Current status partition.
    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    /// Current location scope.
    pub fn location_filter(&self) -> Option<LocationId> {
        self.location_filter
    }

    /// Pagination cursor of the last load.
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    /// Every loaded position in load order.
    pub fn positions(&self) -> &[StockPosition] {
        &self.positions
    }

    /// Look up a loaded position.
    pub fn position(&self, id: PositionId) -> Option<&StockPosition> {
        self.index.get(&id).and_then(|&idx| self.positions.get(idx))
    }

    /// Positions loaded.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Search applied first, then the status filter. Load order is preserved.
    pub fn filtered_view(&self) -> Vec<&StockPosition> {
        let status = self.status_filter;
        self.searched()
            .filter(|p| status.admits(p.is_counted))
            .collect()
    }

    /// Searched positions not yet counted.
    pub fn todo(&self) -> Vec<&StockPosition> {
        self.searched().filter(|p| !p.is_counted).collect()
    }

    /// Searched positions already counted.
    pub fn done(&self) -> Vec<&StockPosition> {
        self.searched().filter(|p| p.is_counted).collect()
    }

    fn searched(&self) -> impl Iterator<Item = &StockPosition> {
        let needle = self.search_query.trim().to_lowercase();
        self.positions
            .iter()
            .filter(move |p| p.matches_search(&needle))
    }

    /// Completion over the entire loaded set, independent of filters.
    pub fn progress(&self) -> Progress {
        Progress::compute(&self.positions)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(id: PositionId, product: &str, location: &str, expected: Decimal) -> StockPosition {
        StockPosition::new(id, id * 10, product, 1, location, "Units", expected)
    }

    fn sample() -> Vec<StockPosition> {
        vec![
            position(1, "Office Chair", "WH/Stock/Shelf 1", dec!(10)),
            position(2, "Desk Lamp", "WH/Stock/Shelf 2", dec!(5)),
            position(3, "Cable Tray", "WH/Stock/Shelf 1", dec!(0)),
        ]
    }

    fn loaded() -> WorkingSet {
        let mut set = WorkingSet::new();
        set.load(&PositionFilter::default(), PageRequest::first(50), sample(), 3);
        set
    }

    fn ids(view: &[&StockPosition]) -> Vec<PositionId> {
        view.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_load_replaces_on_first_page() {
        let mut set = loaded();
        let summary = set.load(
            &PositionFilter::at_location(Some(4)),
            PageRequest::first(50),
            vec![position(9, "Screw", "WH/Stock", dec!(1))],
            1,
        );

        assert!(summary.replaced);
        assert_eq!(summary.loaded, 1);
        assert_eq!(set.location_filter(), Some(4));
        assert!(set.position(1).is_none());
        assert!(set.position(9).is_some());
    }

    #[test]
    fn test_load_appends_and_dedups() {
        let mut set = WorkingSet::new();
        set.load(
            &PositionFilter::default(),
            PageRequest::first(2),
            sample().into_iter().take(2).collect(),
            3,
        );
        assert!(set.cursor().has_more);

        let next = set.next_page().unwrap();
        assert_eq!(next, PageRequest { offset: 2, limit: 2 });

        // Overlapping page: position 2 arrives again
        let summary = set.load(
            &PositionFilter::default(),
            next,
            sample().into_iter().skip(1).collect(),
            3,
        );
        assert!(!summary.replaced);
        assert_eq!(summary.received, 2);
        assert_eq!(summary.added, 1);
        assert_eq!(set.len(), 3);
        assert!(!summary.has_more);
        assert_eq!(set.next_page(), None);
        assert_eq!(
            set.positions().iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_apply_local_and_revert() {
        let mut set = loaded();
        let previous = set.apply_local(2, dec!(7)).unwrap();
        assert_eq!(previous.counted_quantity, None);

        let counted = set.position(2).unwrap();
        assert!(counted.is_counted);
        assert_eq!(counted.counted_quantity, Some(dec!(7)));
        assert_eq!(counted.expected_quantity, dec!(5));

        set.revert_local(2, previous).unwrap();
        assert!(!set.position(2).unwrap().is_counted);
    }

    #[test]
    fn test_apply_local_unknown_id() {
        let mut set = loaded();
        assert_eq!(
            set.apply_local(99, dec!(1)),
            Err(StoreError::not_found("position", 99))
        );
    }

    #[test]
    fn test_search_then_status() {
        let mut set = loaded();
        set.apply_local(3, dec!(0)).unwrap();

        set.set_search("SHELF 1");
        assert_eq!(ids(&set.filtered_view()), vec![1, 3]);

        set.set_status_filter(StatusFilter::Done);
        assert_eq!(ids(&set.filtered_view()), vec![3]);

        set.set_status_filter(StatusFilter::Todo);
        assert_eq!(ids(&set.filtered_view()), vec![1]);

        assert_eq!(ids(&set.todo()), vec![1]);
        assert_eq!(ids(&set.done()), vec![3]);
    }

    #[test]
    fn test_filtered_view_is_ordered_subset() {
        let mut set = loaded();
        set.apply_local(2, dec!(1)).unwrap();
        let all: Vec<PositionId> = set.positions().iter().map(|p| p.id).collect();

        for query in ["", "desk", "shelf", "zzz", "c"] {
            for status in [StatusFilter::All, StatusFilter::Todo, StatusFilter::Done] {
                set.set_search(query);
                set.set_status_filter(status);
                let view = ids(&set.filtered_view());
                let mut cursor = all.iter();
                assert!(view.iter().all(|id| cursor.any(|x| x == id)));
            }
        }
    }

    #[test]
    fn test_progress_ignores_filters() {
        let mut set = loaded();
        set.apply_local(1, dec!(10)).unwrap();
        set.apply_local(2, dec!(7)).unwrap();
        set.apply_local(3, dec!(0)).unwrap();
        set.set_search("lamp");
        set.set_status_filter(StatusFilter::Todo);

        let progress = set.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.counted, 3);
        assert_eq!(progress.pct, 100);
        assert_eq!(progress.with_difference, 1);
        assert!(set.filtered_view().is_empty());
    }

    #[test]
    fn test_filters_never_touch_descriptive_fields() {
        let mut set = loaded();
        let before = set.positions().to_vec();
        set.set_search("chair");
        set.set_status_filter(StatusFilter::Done);
        let _ = set.filtered_view();
        assert_eq!(set.positions(), before.as_slice());
    }
}
