//! Async search driver: owns a [`SearchSession`] and executes its lookups.
//!
//! The session itself is synchronous; this task gives it a place to live.
//! Events come in over an mpsc channel, each one is applied run-to-completion,
//! and the resulting [`SearchSnapshot`] is published over a watch channel.
//! Lookups run as detached sub-tasks that report back through an internal
//! completion channel, so a slow catalog never blocks query edits.
//!
//! ```text
//!  SessionEvent ──► driver task ──► watch<SearchSnapshot>
//!                     │    ▲
//!              lookup │    │ (query, outcome)
//!                     ▼    │
//!                  catalog client          ShelfChangeRequest ──► embedder
//! ```
//!
//! Shelf changes are fire and forget: the driver resolves the id against the
//! visible results and forwards a full [`ShelfChangeRequest`] to the embedder,
//! which writes the store and feeds back a `ShelvesReplaced` event.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::{CatalogClient, CatalogEntry, LookupOutcome};
use crate::session::{LookupRequest, QuerySlot, SearchSession, SearchSnapshot};
use crate::shelf::{BookId, Shelf, ShelfAssignmentView};

/// Queue depth for inbound session events.
const EVENT_BUFFER: usize = 32;

/// Queue depth for lookup completions.
const COMPLETION_BUFFER: usize = 8;

// =============================================================================
// Events
// =============================================================================

/// Instruction for the driver task.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The query text changed.
    QueryEdited(String),
    /// The authoritative shelf assignments changed.
    ShelvesReplaced(ShelfAssignmentView),
    /// The user asked to move a visible result to a shelf.
    ShelfChangeRequested { id: BookId, shelf: Shelf },
}

/// Outbound shelf change, resolved to the full visible entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfChangeRequest {
    pub entry: CatalogEntry,
    pub shelf: Shelf,
}

// =============================================================================
// Driver
// =============================================================================

/// Channels for talking to a running driver task.
#[derive(Debug)]
pub struct DriverHandles {
    /// Inbound events. Dropping every sender stops the driver.
    pub events: mpsc::Sender<SessionEvent>,
    /// Published state, updated after every transition.
    pub snapshots: watch::Receiver<SearchSnapshot>,
    /// The driver task itself.
    pub task: JoinHandle<()>,
}

impl DriverHandles {
    /// Send an event; `false` when the driver already exited.
    pub async fn send(&self, event: SessionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn latest(&self) -> SearchSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until the session is not `Searching` and return that snapshot.
    ///
    /// Returns immediately for an idle or settled session. If the driver
    /// exits mid-wait, the last published snapshot is returned.
    pub async fn settled(&mut self) -> SearchSnapshot {
        loop {
            let snapshot = self.snapshots.borrow_and_update().clone();
            if !snapshot.phase.is_searching() {
                return snapshot;
            }
            if self.snapshots.changed().await.is_err() {
                return self.snapshots.borrow().clone();
            }
        }
    }

    /// Close the event channel and wait for the driver to drain and exit.
    pub async fn shutdown(self) {
        drop(self.events);
        let _ = self.task.await;
    }
}

/// Spawn the driver task. Must be called within a tokio runtime.
///
/// The session is restored from `slot` before the task starts, so a saved
/// query is already `Searching` in the first published snapshot and its
/// lookup is in flight.
#[must_use]
pub fn spawn_search_driver(
    client: Arc<dyn CatalogClient>,
    slot: Arc<dyn QuerySlot>,
    shelves: ShelfAssignmentView,
    shelf_changes: mpsc::Sender<ShelfChangeRequest>,
) -> DriverHandles {
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER);
    let (completion_tx, mut completion_rx) =
        mpsc::channel::<(String, LookupOutcome)>(COMPLETION_BUFFER);

    let (mut session, initial) = SearchSession::restore(slot);
    if let Some(request) = initial {
        issue_lookup(&client, &completion_tx, request);
    }
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

    let task = tokio::spawn(async move {
        let mut shelves = shelves;
        loop {
            tokio::select! {
                maybe_event = event_rx.recv() => match maybe_event {
                    Some(SessionEvent::QueryEdited(text)) => {
                        if let Some(request) = session.set_query(&text) {
                            issue_lookup(&client, &completion_tx, request);
                        }
                        snapshot_tx.send_replace(session.snapshot());
                    }
                    Some(SessionEvent::ShelvesReplaced(view)) => {
                        shelves = view;
                        session.on_shelf_assignment_changed(&shelves);
                        snapshot_tx.send_replace(session.snapshot());
                    }
                    Some(SessionEvent::ShelfChangeRequested { id, shelf }) => {
                        forward_shelf_change(&session, &shelf_changes, &id, shelf).await;
                    }
                    None => break,
                },
                Some((for_query, outcome)) = completion_rx.recv() => {
                    session.on_lookup_response(&for_query, outcome, &shelves);
                    snapshot_tx.send_replace(session.snapshot());
                }
            }
        }
        debug!("search driver exited");
    });

    DriverHandles {
        events: event_tx,
        snapshots: snapshot_rx,
        task,
    }
}

fn issue_lookup(
    client: &Arc<dyn CatalogClient>,
    completions: &mpsc::Sender<(String, LookupOutcome)>,
    request: LookupRequest,
) {
    let future = client.search(&request.query);
    let completions = completions.clone();
    tokio::spawn(async move {
        let outcome = future.await;
        if completions.send((request.query, outcome)).await.is_err() {
            debug!("search driver gone; lookup completion dropped");
        }
    });
}

async fn forward_shelf_change(
    session: &SearchSession,
    shelf_changes: &mpsc::Sender<ShelfChangeRequest>,
    id: &BookId,
    shelf: Shelf,
) {
    let Some(entry) = session.results().iter().find(|e| e.id == *id) else {
        warn!(book_id = %id, "shelf change for a book not in the current results; dropped");
        return;
    };
    let request = ShelfChangeRequest {
        entry: entry.clone(),
        shelf,
    };
    if shelf_changes.send(request).await.is_err() {
        debug!(book_id = %id, "shelf change receiver closed; request dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::session::MemoryQuerySlot;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Per-query scripted outcomes with simulated latency.
    struct ScriptedClient {
        scripts: Mutex<HashMap<String, Script>>,
    }

    #[derive(Clone)]
    struct Script {
        delay: Duration,
        outcome: Result<Vec<CatalogEntry>, String>,
    }

    impl ScriptedClient {
        fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
            }
        }

        fn respond(self, query: &str, delay: Duration, entries: Vec<CatalogEntry>) -> Self {
            self.scripts.lock().unwrap().insert(
                query.to_string(),
                Script {
                    delay,
                    outcome: Ok(entries),
                },
            );
            self
        }

        fn fail(self, query: &str, delay: Duration, reason: &str) -> Self {
            self.scripts.lock().unwrap().insert(
                query.to_string(),
                Script {
                    delay,
                    outcome: Err(reason.to_string()),
                },
            );
            self
        }
    }

    impl CatalogClient for ScriptedClient {
        fn search(&self, query: &str) -> crate::catalog::LookupFuture {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(query)
                .cloned()
                .unwrap_or(Script {
                    delay: Duration::ZERO,
                    outcome: Ok(Vec::new()),
                });
            Box::pin(async move {
                tokio::time::sleep(script.delay).await;
                script.outcome.map_err(CatalogError::Transport)
            })
        }
    }

    fn entry(id: &str, title: &str) -> CatalogEntry {
        CatalogEntry::new(id, title)
    }

    fn spawn_with(
        client: ScriptedClient,
        slot: Arc<dyn QuerySlot>,
        shelves: ShelfAssignmentView,
    ) -> (DriverHandles, mpsc::Receiver<ShelfChangeRequest>) {
        let (change_tx, change_rx) = mpsc::channel(8);
        let handles = spawn_search_driver(Arc::new(client), slot, shelves, change_tx);
        (handles, change_rx)
    }

    /// Wait for a snapshot matching `pred`, with a generous paused-time cap.
    async fn wait_for(
        handles: &mut DriverHandles,
        pred: impl Fn(&SearchSnapshot) -> bool,
    ) -> SearchSnapshot {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let snapshot = handles.snapshots.borrow_and_update().clone();
                if pred(&snapshot) {
                    return snapshot;
                }
                handles.snapshots.changed().await.expect("driver exited");
            }
        })
        .await
        .expect("no matching snapshot published")
    }

    #[tokio::test(start_paused = true)]
    async fn query_edit_settles_with_reconciled_results() {
        let client = ScriptedClient::new().respond(
            "harry potter",
            Duration::from_millis(5),
            vec![entry("wzyC", "Harry Potter and the Sorcerer's Stone")],
        );
        let shelves = ShelfAssignmentView::from_pairs([(
            BookId::from("wzyC"),
            Shelf::CurrentlyReading,
        )]);
        let (mut handles, _changes) =
            spawn_with(client, Arc::new(MemoryQuerySlot::default()), shelves);

        assert!(handles.send(SessionEvent::QueryEdited("harry potter".into())).await);
        let snapshot = wait_for(&mut handles, |s| s.phase.is_settled()).await;

        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.results[0].shelf, Shelf::CurrentlyReading);
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stale_lookup_never_overwrites_newer_results() {
        let client = ScriptedClient::new()
            .respond(
                "harry",
                Duration::from_millis(500),
                vec![entry("h1", "Harry Potter")],
            )
            .respond(
                "hobbit",
                Duration::from_millis(10),
                vec![entry("h2", "The Hobbit")],
            );
        let (mut handles, _changes) = spawn_with(
            client,
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );

        handles.send(SessionEvent::QueryEdited("harry".into())).await;
        handles.send(SessionEvent::QueryEdited("hobbit".into())).await;

        let snapshot = wait_for(&mut handles, |s| s.phase.is_settled()).await;
        assert_eq!(snapshot.results[0].id.as_str(), "h2");

        // Let the stale "harry" lookup land; it must be discarded.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let latest = handles.latest();
        assert_eq!(latest.query, "hobbit");
        assert_eq!(latest.results[0].id.as_str(), "h2");
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_the_query_resets_despite_in_flight_lookup() {
        let client = ScriptedClient::new().respond(
            "harry",
            Duration::from_millis(500),
            vec![entry("h1", "Harry Potter")],
        );
        let (mut handles, _changes) = spawn_with(
            client,
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );

        handles.send(SessionEvent::QueryEdited("harry".into())).await;
        handles.send(SessionEvent::QueryEdited(String::new())).await;

        let snapshot = wait_for(&mut handles, |s| s.phase.is_idle()).await;
        assert!(snapshot.results.is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let latest = handles.latest();
        assert!(latest.phase.is_idle());
        assert!(latest.results.is_empty());
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_failure_settles_quietly_with_no_results() {
        let client =
            ScriptedClient::new().fail("dune", Duration::from_millis(5), "connection refused");
        let (mut handles, _changes) = spawn_with(
            client,
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );

        handles.send(SessionEvent::QueryEdited("dune".into())).await;
        let snapshot = wait_for(&mut handles, |s| s.phase.is_settled()).await;
        assert!(snapshot.results.is_empty());
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn restored_query_is_searching_from_the_first_snapshot() {
        let client = ScriptedClient::new().respond(
            "dune",
            Duration::from_millis(5),
            vec![entry("d", "Dune")],
        );
        let slot = Arc::new(MemoryQuerySlot::with_value("dune"));
        let (mut handles, _changes) = spawn_with(client, slot, ShelfAssignmentView::new());

        let first = handles.latest();
        assert!(first.phase.is_searching());
        assert_eq!(first.query, "dune");

        // The first snapshot is Searching, so settled() waits out the lookup.
        let snapshot = handles.settled().await;
        assert!(snapshot.phase.is_settled());
        assert_eq!(snapshot.results[0].id.as_str(), "d");
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settled_returns_immediately_when_nothing_is_in_flight() {
        let (mut handles, _changes) = spawn_with(
            ScriptedClient::new(),
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );
        let snapshot = handles.settled().await;
        assert!(snapshot.phase.is_idle());
        assert!(snapshot.results.is_empty());
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shelves_replaced_updates_visible_results() {
        let client = ScriptedClient::new().respond(
            "potter",
            Duration::from_millis(5),
            vec![entry("wzyC", "Sorcerer's Stone")],
        );
        let (mut handles, _changes) = spawn_with(
            client,
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );

        handles.send(SessionEvent::QueryEdited("potter".into())).await;
        let settled = wait_for(&mut handles, |s| s.phase.is_settled()).await;
        assert_eq!(settled.results[0].shelf, Shelf::None);

        let view =
            ShelfAssignmentView::from_pairs([(BookId::from("wzyC"), Shelf::WantToRead)]);
        handles.send(SessionEvent::ShelvesReplaced(view)).await;

        let updated = wait_for(&mut handles, |s| {
            s.results.first().map(|e| e.shelf) == Some(Shelf::WantToRead)
        })
        .await;
        assert_eq!(updated.results[0].title, "Sorcerer's Stone");
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shelf_change_request_carries_the_full_entry() {
        let mut shelved = entry("wzyC", "Sorcerer's Stone");
        shelved.authors = vec!["J.K. Rowling".to_string()];
        let client =
            ScriptedClient::new().respond("potter", Duration::from_millis(5), vec![shelved]);
        let (mut handles, mut changes) = spawn_with(
            client,
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );

        handles.send(SessionEvent::QueryEdited("potter".into())).await;
        wait_for(&mut handles, |s| s.phase.is_settled()).await;

        handles
            .send(SessionEvent::ShelfChangeRequested {
                id: BookId::from("wzyC"),
                shelf: Shelf::Read,
            })
            .await;

        let request = changes.recv().await.expect("shelf change expected");
        assert_eq!(request.shelf, Shelf::Read);
        assert_eq!(request.entry.id.as_str(), "wzyC");
        assert_eq!(request.entry.authors, vec!["J.K. Rowling"]);
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shelf_change_for_unknown_id_is_dropped() {
        let client = ScriptedClient::new().respond(
            "potter",
            Duration::from_millis(5),
            vec![entry("known", "Known")],
        );
        let (mut handles, mut changes) = spawn_with(
            client,
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );

        handles.send(SessionEvent::QueryEdited("potter".into())).await;
        wait_for(&mut handles, |s| s.phase.is_settled()).await;

        handles
            .send(SessionEvent::ShelfChangeRequested {
                id: BookId::from("ghost"),
                shelf: Shelf::Read,
            })
            .await;
        handles
            .send(SessionEvent::ShelfChangeRequested {
                id: BookId::from("known"),
                shelf: Shelf::Read,
            })
            .await;

        // Only the known id makes it through.
        let request = changes.recv().await.expect("shelf change expected");
        assert_eq!(request.entry.id.as_str(), "known");
        handles.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn driver_exits_when_event_channel_closes() {
        let (handles, _changes) = spawn_with(
            ScriptedClient::new(),
            Arc::new(MemoryQuerySlot::default()),
            ShelfAssignmentView::new(),
        );
        let DriverHandles { events, task, .. } = handles;
        drop(events);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("driver should exit")
            .expect("driver should not panic");
    }
}
