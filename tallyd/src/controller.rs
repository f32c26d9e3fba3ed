//! Reconciliation Controller.
//!
//! Orchestrates load → edit → optimistic apply → confirm/rollback against
//! the stock ledger, and the bulk apply-all step.
//!
//! # Session lifecycle
//!
//! ```text
//! Idle ──load_all()──► Loading ──ok──► Ready ◄──┐
//!                         │                 │   │ apply_all() (Validating overlay)
//!                         └──err──► Error   └───┘
//!                                     │
//!                                     └──load_all() (retry)
//! ```
//!
//! # Consistency rules
//!
//! - The session lock is never held across a ledger call. Other positions
//!   can be edited while a write is in flight.
//! - Every full load carries a request id. A response older than the latest
//!   issued load is discarded.
//! - Every count write carries a per-position generation. A failed write is
//!   only rolled back if no newer write for the same position was issued,
//!   and it restores the last count the ledger acknowledged.
//! - Remote failures end the operation with a notification. They are
//!   returned as values and never retried automatically.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tally_domain::{
    classify, ApplyScope, CountPolicy, DiffOutcome, DiffState, Location, LocationId, PageRequest,
    PositionId, ProductId,
};
use tally_engine::{parse_buffer, KeyOutcome, QuantityInput, QuickSet};
use tally_ledger::StockLedgerService;
use tally_store::{LoadSummary, StatusFilter, StoreError};

use crate::config::SessionConfig;
use crate::debounce::Debouncer;
use crate::error::{ControllerResult, ValidationError};
use crate::notify::{Notifier, Severity};
use crate::session::{ActiveCount, CountEntry, Session, SessionPhase, SessionSnapshot};

// =============================================================================
// Result types
// =============================================================================

/// Result of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LoadOutcome {
    /// Response applied to the working set
    Loaded(LoadSummary),
    /// A newer load was issued; response dropped
    Stale,
    /// Nothing left to load
    Exhausted,
}

/// Confirmed count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountReport {
    /// Position counted
    pub position_id: PositionId,
    /// Counted quantity
    pub quantity: Decimal,
    /// Classification against the expected quantity
    pub outcome: DiffOutcome,
    /// Message reported to the operator
    pub message: String,
}

// =============================================================================
// Controller
// =============================================================================

/// Reconciliation controller for one counting session.
pub struct Controller {
    ledger: Arc<dyn StockLedgerService>,
    session: Arc<RwLock<Session>>,
    notifier: Notifier,
    settings: SessionConfig,
    policy: CountPolicy,
    product_search: Debouncer,
}

impl Controller {
    /// Create a controller over `ledger`.
    pub fn new(ledger: Arc<dyn StockLedgerService>, notifier: Notifier, settings: SessionConfig) -> Self {
        let policy = settings.count_policy();
        let product_search = Debouncer::new(settings.search_debounce);
        Self {
            ledger,
            session: Arc::new(RwLock::new(Session::default())),
            notifier,
            settings,
            policy,
            product_search,
        }
    }

    /// Outcome reporter used by this controller.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Session settings.
    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Request the first page for the current scope and replace the working set.
    ///
    /// Concurrent calls are not deduplicated, but only the most recently
    /// issued one may land.
    pub async fn load_all(&self) -> ControllerResult<LoadOutcome> {
        let page = PageRequest::first(self.settings.page_size);
        let (request_id, filter) = {
            let mut session = self.session.write().await;
            session.latest_load += 1;
            session.phase = SessionPhase::Loading;
            (session.latest_load, session.working_set.server_filter())
        };

        info!(
            request_id,
            location_id = ?filter.location_id,
            ledger = self.ledger.name(),
            "Loading positions"
        );
        let result = self.ledger.list_positions(&filter, page).await;

        let mut session = self.session.write().await;
        if session.latest_load != request_id {
            debug!(request_id, latest = session.latest_load, "Discarding stale load");
            return Ok(LoadOutcome::Stale);
        }

        match result {
            Ok(fetched) => {
                let summary =
                    session
                        .working_set
                        .load(&filter, page, fetched.positions, fetched.total);
                // Old write generations refer to replaced data
                session.reset_writes();
                let entry_gone = session
                    .entry
                    .as_ref()
                    .is_some_and(|e| session.working_set.position(e.position_id).is_none());
                if entry_gone {
                    session.entry = None;
                }
                session.phase = SessionPhase::Ready;
                info!(
                    request_id,
                    loaded = summary.loaded,
                    total = summary.total,
                    "Positions loaded"
                );
                Ok(LoadOutcome::Loaded(summary))
            },
            Err(e) => {
                warn!(request_id, error = %e, "Failed to load positions");
                session.phase = SessionPhase::Error {
                    message: e.message(),
                };
                drop(session);
                self.notifier
                    .notify("Failed to load inventory data", Severity::Error);
                Err(e.into())
            },
        }
    }

    /// Load the next page and append it, skipping positions already held.
    pub async fn load_more(&self) -> ControllerResult<LoadOutcome> {
        let (request_id, filter, page) = {
            let mut session = self.session.write().await;
            if session.loading_more || session.phase != SessionPhase::Ready {
                return Ok(LoadOutcome::Exhausted);
            }
            let Some(page) = session.working_set.next_page() else {
                return Ok(LoadOutcome::Exhausted);
            };
            session.loading_more = true;
            (session.latest_load, session.working_set.server_filter(), page)
        };

        debug!(offset = page.offset, limit = page.limit, "Loading more positions");
        let result = self.ledger.list_positions(&filter, page).await;

        let mut session = self.session.write().await;
        session.loading_more = false;
        if session.latest_load != request_id {
            debug!(request_id, "Discarding page from a superseded load");
            return Ok(LoadOutcome::Stale);
        }

        match result {
            Ok(fetched) => {
                let summary =
                    session
                        .working_set
                        .load(&filter, page, fetched.positions, fetched.total);
                Ok(LoadOutcome::Loaded(summary))
            },
            Err(e) => {
                warn!(error = %e, "Failed to load more positions");
                drop(session);
                self.notifier
                    .notify("Failed to load inventory data", Severity::Error);
                Err(e.into())
            },
        }
    }

    /// Full reload followed by an informational notification.
    pub async fn refresh(&self) -> ControllerResult<LoadOutcome> {
        let outcome = self.load_all().await?;
        if matches!(outcome, LoadOutcome::Loaded(_)) {
            self.notifier.notify("Refreshed!", Severity::Info);
        }
        Ok(outcome)
    }

    /// Fetch the locations for the location filter.
    ///
    /// On failure the previous list is kept.
    pub async fn load_locations(&self) -> ControllerResult<Vec<Location>> {
        match self.ledger.list_locations().await {
            Ok(locations) => {
                self.session.write().await.locations = locations.clone();
                Ok(locations)
            },
            Err(e) => {
                warn!(error = %e, "Failed to load locations");
                self.notifier.notify("Failed to load locations", Severity::Error);
                Err(e.into())
            },
        }
    }

    // =========================================================================
    // Count entry
    // =========================================================================

    /// Make `id` the active position and open the keypad, pre-filled with
    /// its current count. Any other open count is discarded.
    pub async fn open_count(&self, id: PositionId) -> ControllerResult<ActiveCount> {
        let mut session = self.session.write().await;
        let initial = session
            .working_set
            .position(id)
            .ok_or_else(|| StoreError::not_found("position", id))?
            .effective_count();

        let mut input = QuantityInput::new();
        input.open(initial);
        session.entry = Some(CountEntry {
            position_id: id,
            input,
        });
        debug!(position_id = id, "Count opened");

        session
            .active_count()
            .ok_or_else(|| StoreError::not_found("position", id).into())
    }

    /// Forward a keystroke to the active count.
    pub async fn key(&self, ch: char) -> ControllerResult<KeyOutcome> {
        let mut session = self.session.write().await;
        let entry = session.entry.as_mut().ok_or(ValidationError::NoActiveCount)?;
        Ok(entry.input.key(ch))
    }

    /// Remove the last character of the active count.
    pub async fn backspace(&self) -> ControllerResult<()> {
        let mut session = self.session.write().await;
        let entry = session.entry.as_mut().ok_or(ValidationError::NoActiveCount)?;
        entry.input.backspace()?;
        Ok(())
    }

    /// Replace the buffer of the active count.
    pub async fn quick_set(&self, value: &str) -> ControllerResult<()> {
        let mut session = self.session.write().await;
        let entry = session.entry.as_mut().ok_or(ValidationError::NoActiveCount)?;
        entry.input.quick_set(value)?;
        Ok(())
    }

    /// Shortcut values for the active count.
    pub async fn quick_sets(&self) -> ControllerResult<Vec<QuickSet>> {
        Ok(self.active_count().await?.quick_sets)
    }

    /// Live difference of the active buffer.
    pub async fn preview(&self) -> ControllerResult<DiffOutcome> {
        Ok(self.active_count().await?.preview)
    }

    /// The active count.
    pub async fn active_count(&self) -> ControllerResult<ActiveCount> {
        let session = self.session.read().await;
        session
            .active_count()
            .ok_or_else(|| ValidationError::NoActiveCount.into())
    }

    /// Confirm the keypad buffer of the active count.
    pub async fn confirm_active(&self) -> ControllerResult<CountReport> {
        let (id, quantity) = {
            let session = self.session.read().await;
            let entry = session.entry.as_ref().ok_or(ValidationError::NoActiveCount)?;
            (entry.position_id, parse_buffer(entry.input.buffer())?)
        };
        self.submit_count(id, quantity).await
    }

    /// Submit `quantity` for the active count.
    ///
    /// The position reflects the count before the ledger answers. The
    /// active count is closed once the value is applied locally.
    pub async fn confirm_count(&self, quantity: Decimal) -> ControllerResult<CountReport> {
        let id = {
            let session = self.session.read().await;
            session
                .entry
                .as_ref()
                .map(|e| e.position_id)
                .ok_or(ValidationError::NoActiveCount)?
        };
        self.submit_count(id, quantity).await
    }

    /// Count `id` as exactly its expected quantity, without the keypad.
    pub async fn set_match(&self, id: PositionId) -> ControllerResult<CountReport> {
        let expected = self
            .session
            .read()
            .await
            .working_set
            .position(id)
            .map(|p| p.expected_quantity);
        match expected {
            Some(expected) => self.submit_count(id, expected).await,
            None => Err(self.missing_target(id).into()),
        }
    }

    /// Close the active count without writing.
    pub async fn skip(&self) -> ControllerResult<()> {
        let name = {
            let mut session = self.session.write().await;
            let entry = session.entry.take().ok_or(ValidationError::NoActiveCount)?;
            session
                .working_set
                .position(entry.position_id)
                .map(|p| p.short_name().to_string())
                .unwrap_or_default()
        };
        self.notifier
            .notify(format!("Skipped — {}", name), Severity::Info);
        Ok(())
    }

    /// Discard the active count, if any.
    pub async fn close_count(&self) {
        if let Some(entry) = self.session.write().await.entry.take() {
            debug!(position_id = entry.position_id, "Count closed");
        }
    }

    /// Optimistic count protocol.
    async fn submit_count(&self, id: PositionId, quantity: Decimal) -> ControllerResult<CountReport> {
        self.policy.validate(quantity)?;

        let (generation, expected, name) = {
            let mut session = self.session.write().await;
            let applied = session.working_set.apply_local(id, quantity);
            let previous = match applied {
                Ok(previous) => previous,
                Err(_) => {
                    drop(session);
                    return Err(self.missing_target(id).into());
                },
            };
            let generation = session.begin_write(id, previous);
            if session.entry.as_ref().map(|e| e.position_id) == Some(id) {
                session.entry = None;
            }
            let position = session.working_set.position(id);
            let expected = position.map(|p| p.expected_quantity).unwrap_or_default();
            let name = position.map(|p| p.short_name().to_string()).unwrap_or_default();
            (generation, expected, name)
        };

        info!(position_id = id, %quantity, generation, "Submitting count");
        match self.ledger.set_count(id, quantity).await {
            Ok(receipt) => {
                self.session.write().await.acknowledge(id, receipt.quantity);
                let outcome = classify(expected, Some(quantity));
                let message = format!("{} — {}", name, outcome.label());
                let severity = if outcome.state == DiffState::Match {
                    Severity::Success
                } else {
                    Severity::Warning
                };
                self.notifier.notify(message.clone(), severity);
                info!(
                    position_id = id,
                    state = %outcome.state,
                    stored = %receipt.quantity,
                    ledger_diff = %receipt.diff_quantity,
                    "Count confirmed"
                );

                Ok(CountReport {
                    position_id: id,
                    quantity,
                    outcome,
                    message,
                })
            },
            Err(e) => {
                warn!(position_id = id, error = %e, "Count rejected by ledger");
                if self.settings.rollback_on_failure {
                    let mut session = self.session.write().await;
                    let restore = session
                        .acknowledged(id)
                        .filter(|_| session.is_latest_write(id, generation));
                    if let Some(restore) = restore {
                        match session.working_set.revert_local(id, restore) {
                            Ok(()) => debug!(position_id = id, "Optimistic count rolled back"),
                            Err(_) => debug!(position_id = id, "Position gone, nothing to roll back"),
                        }
                    } else {
                        debug!(position_id = id, "Newer count issued, keeping it");
                    }
                }
                self.notifier
                    .notify("Failed to save. Check connection.", Severity::Error);
                Err(e.into())
            },
        }
    }

    /// Report a count aimed at a position the working set no longer holds.
    fn missing_target(&self, id: PositionId) -> StoreError {
        warn!(position_id = id, "Count target missing from working set");
        self.notifier.notify(
            "Item is no longer in the list. Refresh and try again.",
            Severity::Error,
        );
        StoreError::not_found("position", id)
    }

    // =========================================================================
    // Bulk apply
    // =========================================================================

    /// Ask the ledger to commit every outstanding difference in the current
    /// location scope, then reload.
    ///
    /// On failure nothing is changed locally.
    pub async fn apply_all(&self) -> ControllerResult<()> {
        let scope = {
            let mut session = self.session.write().await;
            if session.validating {
                return Err(ValidationError::ApplyInProgress.into());
            }
            session.validating = true;
            ApplyScope {
                location_id: session.working_set.location_filter(),
            }
        };

        info!(location_id = ?scope.location_id, "Applying inventory adjustments");
        let result = self.ledger.apply_all(scope).await;
        self.session.write().await.validating = false;

        match result {
            Ok(()) => {
                self.notifier
                    .notify("✓ Inventory validated!", Severity::Success);
                // Reload failures are reported by load_all itself
                if let Err(e) = self.load_all().await {
                    debug!(error = %e, "Reload after apply failed");
                }
                Ok(())
            },
            Err(e) => {
                warn!(error = %e, "Apply-all rejected");
                self.notifier
                    .notify(format!("Validation failed: {}", e.message()), Severity::Error);
                Err(e.into())
            },
        }
    }

    // =========================================================================
    // View state
    // =========================================================================

    /// Set the free-text search. Local only.
    pub async fn search(&self, query: &str) {
        self.session.write().await.working_set.set_search(query);
    }

    /// Set the status partition. Local only.
    pub async fn set_filter(&self, status: StatusFilter) {
        self.session
            .write()
            .await
            .working_set
            .set_status_filter(status);
    }

    /// Scope the session to a location and reload.
    pub async fn set_location(&self, location_id: Option<LocationId>) -> ControllerResult<LoadOutcome> {
        self.session
            .write()
            .await
            .working_set
            .set_location_filter(location_id);
        self.load_all().await
    }

    // =========================================================================
    // Add position
    // =========================================================================

    /// Debounced product search for the add-position flow.
    ///
    /// Queries shorter than the minimum clear the suggestions at once and
    /// return `None`. Search errors are only logged.
    pub async fn lookup_products(&self, query: &str) -> Option<JoinHandle<bool>> {
        let query = query.trim().to_string();
        {
            let mut session = self.session.write().await;
            session.product_query = query.clone();
            if query.chars().count() < self.settings.product_search_min_chars {
                self.product_search.cancel();
                session.product_suggestions.clear();
                return None;
            }
        }

        let ledger = Arc::clone(&self.ledger);
        let session = Arc::clone(&self.session);
        let limit = self.settings.product_search_limit;
        Some(self.product_search.schedule(async move {
            match ledger.search_products(&query, limit).await {
                Ok(products) => {
                    let mut session = session.write().await;
                    // Ignore answers for a query the operator already changed
                    if session.product_query == query {
                        session.product_suggestions = products;
                    }
                },
                Err(e) => debug!(error = %e, "Product search failed"),
            }
        }))
    }

    /// Record a count for a product at a location, creating the position
    /// when needed, then reload.
    pub async fn add_position(
        &self,
        product_id: Option<ProductId>,
        location_id: Option<LocationId>,
        quantity: Decimal,
    ) -> ControllerResult<PositionId> {
        let validated = location_id
            .ok_or(ValidationError::MissingLocation)
            .and_then(|location| {
                product_id
                    .map(|product| (product, location))
                    .ok_or(ValidationError::MissingProduct)
            });
        let (product_id, location_id) = match validated {
            Ok(ids) => ids,
            Err(e) => {
                self.notifier.notify(e.to_string(), Severity::Error);
                return Err(e.into());
            },
        };
        self.policy.validate(quantity)?;

        info!(product_id, location_id, %quantity, "Adding position");
        match self
            .ledger
            .create_position(product_id, location_id, quantity)
            .await
        {
            Ok(id) => {
                {
                    let mut session = self.session.write().await;
                    session.product_query.clear();
                    session.product_suggestions.clear();
                }
                self.notifier
                    .notify("Product added to inventory!", Severity::Success);
                if let Err(e) = self.load_all().await {
                    debug!(error = %e, "Reload after add failed");
                }
                Ok(id)
            },
            Err(e) => {
                warn!(error = %e, "Add position rejected");
                self.notifier
                    .notify(format!("Error: {}", e.message()), Severity::Error);
                Err(e.into())
            },
        }
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Owned view of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let notification = self.notifier.current();
        self.session.read().await.snapshot(notification)
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.session.read().await.phase.clone()
    }
}
