//! Search session state machine: live query, lookup acceptance, shelf
//! reconciliation.
//!
//! A [`SearchSession`] owns the query text of one search screen: it decides
//! when a lookup is needed, which completion to believe when several are in
//! flight, and how to keep settled results consistent with the authoritative
//! shelf store. It performs no IO itself. [`SearchSession::set_query`] hands
//! back a [`LookupRequest`] for the caller (normally the driver) to execute,
//! and completions come back through [`SearchSession::on_lookup_response`].
//!
//! # Design principles
//!
//! 1. **Run to completion**: every entry point is synchronous and atomic, so
//!    state is never observable mid-transition and no locking is needed.
//! 2. **Acceptance by query string**: a completion is applied only when its
//!    originating query equals the current query, so a slow response for an
//!    old keystroke can never overwrite results for a newer one.
//! 3. **Shelves are never trusted from the wire**: every accepted entry is
//!    reconciled against the [`ShelfAssignmentView`] before it becomes
//!    visible, and re-reconciled in place whenever the view changes.
//!
//! ```ignore
//! let slot = Arc::new(MemoryQuerySlot::default());
//! let mut session = SearchSession::new(slot);
//! let shelves =
//!     ShelfAssignmentView::from_pairs([(BookId::from("wzyC"), Shelf::CurrentlyReading)]);
//!
//! if let Some(req) = session.set_query("harry potter") {
//!     let outcome = lookup(&req.query); // async against the catalog in real use
//!     session.on_lookup_response(&req.query, outcome, &shelves);
//! }
//! assert!(session.phase().is_settled());
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{CatalogEntry, LookupOutcome};
use crate::error::StorageError;
use crate::shelf::ShelfAssignmentView;

// =============================================================================
// Search phase
// =============================================================================

/// Where the session stands relative to its current query.
///
/// ```text
///         ┌───────────────── set_query("") ─────────────────┐
///         ▼                                                 │
///       Idle ── set_query(q) ──► Searching ── accepted ──► Settled
///                                  ▲    ▲                    │
///                                  │    └── set_query(q') ───┘
///                                  │
///                         stale completions are
///                        discarded in any phase
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Query trims empty: nothing to look up, nothing to show.
    #[default]
    Idle,
    /// A lookup for the current query is outstanding.
    Searching,
    /// The most recent accepted completion has been applied.
    Settled,
}

impl SearchPhase {
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub const fn is_searching(self) -> bool {
        matches!(self, Self::Searching)
    }

    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Settled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Settled => "settled",
        }
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Last-query slot
// =============================================================================

/// Single-value durable store for the last typed query.
///
/// Read once when a session is created, written on every
/// [`SearchSession::set_query`]. Durability is best effort: slot failures are
/// logged and never surface through the session.
pub trait QuerySlot: Send + Sync {
    /// The saved query, if one was ever written.
    fn get(&self) -> Result<Option<String>, StorageError>;

    /// Overwrite the saved query.
    fn set(&self, value: &str) -> Result<(), StorageError>;
}

/// In-memory slot for embedders that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryQuerySlot {
    value: Mutex<Option<String>>,
}

impl MemoryQuerySlot {
    /// A slot pre-seeded with a saved query.
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl QuerySlot for MemoryQuerySlot {
    fn get(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .value
            .lock()
            .map_err(|_| StorageError::Database("query slot mutex poisoned".to_string()))?
            .clone())
    }

    fn set(&self, value: &str) -> Result<(), StorageError> {
        *self
            .value
            .lock()
            .map_err(|_| StorageError::Database("query slot mutex poisoned".to_string()))? =
            Some(value.to_string());
        Ok(())
    }
}

// =============================================================================
// Lookup request
// =============================================================================

/// A lookup the caller must execute against the catalog service.
///
/// The completion must be reported back with this exact `query` string; the
/// session compares it against the current query to decide acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a lookup request does nothing until executed"]
pub struct LookupRequest {
    /// The originating query, as typed (untrimmed).
    pub query: String,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Overwrite each entry's shelf with the authoritative assignment.
///
/// O(n) over `entries` with O(1) view lookups. Order and every other field
/// are preserved; unknown ids resolve to `Shelf::None`. Idempotent.
pub fn reconcile(entries: &mut [CatalogEntry], shelves: &ShelfAssignmentView) {
    for entry in entries.iter_mut() {
        entry.shelf = shelves.shelf_of(&entry.id);
    }
}

// =============================================================================
// Read model
// =============================================================================

/// Presentation-facing read model, derived from phase and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchView<'a> {
    /// Query is empty; the screen shows nothing.
    NotSearching,
    /// A lookup for the current query is outstanding.
    Loading,
    /// The query settled with zero matches. Presentation may offer suggested
    /// alternate queries here.
    NoMatches,
    /// Settled, ordered, shelf-reconciled results.
    HasResults(&'a [CatalogEntry]),
}

/// Owned copy of a session's observable state, for crossing task boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnapshot {
    pub query: String,
    pub phase: SearchPhase,
    pub results: Vec<CatalogEntry>,
}

impl SearchSnapshot {
    /// Read-model classification of this snapshot.
    #[must_use]
    pub fn view(&self) -> SearchView<'_> {
        match self.phase {
            SearchPhase::Idle => SearchView::NotSearching,
            SearchPhase::Searching => SearchView::Loading,
            SearchPhase::Settled if self.results.is_empty() => SearchView::NoMatches,
            SearchPhase::Settled => SearchView::HasResults(&self.results),
        }
    }
}

// =============================================================================
// Search session
// =============================================================================

/// One search screen's worth of query state.
///
/// Created per screen activation (see [`SearchSession::restore`]) and
/// discarded when the screen closes. Holds the injected [`QuerySlot`]; the
/// shelf view is re-supplied by the caller at each use, never stored.
pub struct SearchSession {
    query: String,
    phase: SearchPhase,
    results: Vec<CatalogEntry>,
    slot: Arc<dyn QuerySlot>,
}

impl fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSession")
            .field("query", &self.query)
            .field("phase", &self.phase)
            .field("results", &self.results.len())
            .finish_non_exhaustive()
    }
}

impl SearchSession {
    /// An idle session with an empty query.
    #[must_use]
    pub fn new(slot: Arc<dyn QuerySlot>) -> Self {
        Self {
            query: String::new(),
            phase: SearchPhase::Idle,
            results: Vec::new(),
            slot,
        }
    }

    /// A session seeded from the slot's saved query.
    ///
    /// A non-empty saved value is replayed through [`set_query`], so the
    /// returned request (if any) is the immediate lookup for the restored
    /// text. A whitespace-only value restores the text without a lookup; a
    /// slot read failure starts fresh.
    ///
    /// [`set_query`]: SearchSession::set_query
    #[must_use]
    pub fn restore(slot: Arc<dyn QuerySlot>) -> (Self, Option<LookupRequest>) {
        let saved = match slot.get() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to read last-query slot; starting fresh");
                None
            }
        };
        let mut session = Self::new(slot);
        let request = match saved {
            Some(q) if !q.is_empty() => session.set_query(&q),
            _ => None,
        };
        (session, request)
    }

    // -- Accessors ------------------------------------------------------------

    /// The current query, exactly as typed.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Ordered, shelf-reconciled results of the last accepted completion.
    #[must_use]
    pub fn results(&self) -> &[CatalogEntry] {
        &self.results
    }

    /// Presentation read model.
    #[must_use]
    pub fn view(&self) -> SearchView<'_> {
        match self.phase {
            SearchPhase::Idle => SearchView::NotSearching,
            SearchPhase::Searching => SearchView::Loading,
            SearchPhase::Settled if self.results.is_empty() => SearchView::NoMatches,
            SearchPhase::Settled => SearchView::HasResults(&self.results),
        }
    }

    /// Owned copy of the observable state.
    #[must_use]
    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            query: self.query.clone(),
            phase: self.phase,
            results: self.results.clone(),
        }
    }

    // -- Entry points ---------------------------------------------------------

    /// Record `text` as the current query.
    ///
    /// The raw text is persisted to the slot and kept as typed; only the
    /// emptiness check trims. A trim-empty query resets to `Idle` with no
    /// results and returns `None`; a lookup still in flight for an older
    /// query will fail acceptance when it lands. A non-empty query moves to
    /// `Searching` and returns the lookup the caller must run.
    pub fn set_query(&mut self, text: &str) -> Option<LookupRequest> {
        self.query = text.to_string();
        if let Err(e) = self.slot.set(text) {
            warn!(error = %e, "failed to persist last query");
        }

        if text.trim().is_empty() {
            debug!("query cleared; session idle");
            self.phase = SearchPhase::Idle;
            self.results.clear();
            return None;
        }

        self.phase = SearchPhase::Searching;
        debug!(query = %self.query, "lookup issued");
        Some(LookupRequest {
            query: self.query.clone(),
        })
    }

    /// Apply a lookup completion.
    ///
    /// Acceptance: `for_query` must equal the current query, byte for byte;
    /// anything else is a stale completion and is dropped without touching
    /// state. Completions arriving while idle are also dropped; an idle
    /// session issued no lookup, so none can legitimately complete.
    ///
    /// On acceptance an `Err` outcome degrades to zero results: the consumer
    /// cannot tell an unreachable catalog from a zero-match query, only the
    /// logs can. Accepted entries are reconciled before they become visible,
    /// results are replaced wholesale, and the phase settles.
    pub fn on_lookup_response(
        &mut self,
        for_query: &str,
        outcome: LookupOutcome,
        shelves: &ShelfAssignmentView,
    ) {
        if self.phase.is_idle() {
            debug!(for_query = %for_query, "completion ignored; session idle");
            return;
        }
        if for_query != self.query {
            debug!(for_query = %for_query, current = %self.query, "stale lookup discarded");
            return;
        }

        let mut entries = match outcome {
            Ok(entries) => entries,
            Err(e) => {
                warn!(query = %for_query, error = %e, "lookup failed; settling with no results");
                Vec::new()
            }
        };
        reconcile(&mut entries, shelves);
        debug!(query = %for_query, count = entries.len(), "lookup accepted");
        self.results = entries;
        self.phase = SearchPhase::Settled;
    }

    /// Re-derive the shelf of every visible result after the store changed.
    ///
    /// In-place: no lookup is issued, order is preserved, and only shelf
    /// fields move. Keeps settled results consistent with the authoritative
    /// store even while they stay on screen.
    pub fn on_shelf_assignment_changed(&mut self, shelves: &ShelfAssignmentView) {
        reconcile(&mut self.results, shelves);
    }
}
