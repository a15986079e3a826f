//! `fshelf search` - look up books in the catalog and reconcile the results
//! against the local shelf.
//!
//! Two modes share one search driver:
//!
//! * **One-shot** (`fshelf search "harry potter"`): issue a single query,
//!   wait for it to settle, print the outcome, exit.
//! * **Interactive** (`fshelf search`): read queries line by line from stdin.
//!   `:move <id> <shelf>` reshelves a result without disturbing the result
//!   order, `:quit` exits. The last query is persisted and replayed on the
//!   next start.
//!
//! In both modes a catalog failure is not a command failure: transport
//! errors and malformed payloads settle as an empty result set and the
//! process exits 0.

use std::sync::Arc;

use clap::Args;
use frankenshelf_core::Result;
use frankenshelf_core::catalog::{CatalogClient, CatalogEntry};
use frankenshelf_core::config::Config;
use frankenshelf_core::driver::{
    DriverHandles, SessionEvent, ShelfChangeRequest, spawn_search_driver,
};
use frankenshelf_core::session::{SearchSnapshot, SearchView};
use frankenshelf_core::shelf::{BookId, Shelf};
use frankenshelf_core::store::ShelfStore;
use frankenshelf_core::suggest::suggested_pair;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::HttpCatalogClient;
use crate::commands::OutputFormat;

/// Buffer for shelf-change requests flowing back from the driver.
const CHANGE_BUFFER: usize = 8;

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Query text. Omit to search interactively from stdin.
    pub query: Option<String>,

    /// Maximum number of results to request from the catalog.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: Option<u32>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain, value_name = "FORMAT")]
    pub format: OutputFormat,
}

pub async fn execute(args: SearchArgs, config: &Config) -> Result<()> {
    let layout = config.data_layout();
    let store = ShelfStore::open_at(&layout.db_path)?;
    let slot = Arc::new(store.query_slot());

    let mut catalog = config.catalog.clone();
    if let Some(limit) = args.limit {
        catalog.max_results = limit;
    }
    let client: Arc<dyn CatalogClient> = Arc::new(HttpCatalogClient::new(&catalog)?);

    let (change_tx, mut change_rx) = mpsc::channel(CHANGE_BUFFER);
    let mut handles = spawn_search_driver(client, slot, store.view()?, change_tx);

    let outcome = match args.query {
        Some(ref query) => one_shot(&mut handles, query, args.format).await,
        None => interactive(&mut handles, &mut change_rx, &store).await,
    };
    handles.shutdown().await;
    outcome
}

// =============================================================================
// One-shot mode
// =============================================================================

async fn one_shot(
    handles: &mut DriverHandles,
    query: &str,
    format: OutputFormat,
) -> Result<()> {
    if !handles.send(SessionEvent::QueryEdited(query.to_string())).await {
        warn!("search driver exited before the query was issued");
    }
    let snapshot = settled_for(handles, query).await;
    if format.is_json() {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        render_plain(&snapshot);
    }
    Ok(())
}

/// Waits until the driver has settled (or idled) the given query.
///
/// Plain [`DriverHandles::settled`] is not enough here: a query restored
/// from a previous run may settle first, and its snapshot must not be
/// mistaken for ours.
async fn settled_for(handles: &mut DriverHandles, query: &str) -> SearchSnapshot {
    loop {
        let snapshot = handles.snapshots.borrow_and_update().clone();
        if snapshot.query == query && !snapshot.phase.is_searching() {
            return snapshot;
        }
        if handles.snapshots.changed().await.is_err() {
            return handles.latest();
        }
    }
}

// =============================================================================
// Interactive mode
// =============================================================================

/// What to do with one line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum LineAction {
    Query(String),
    Move { id: BookId, shelf: Shelf },
    Help,
    Quit,
    Invalid(String),
}

fn classify_line(line: &str) -> LineAction {
    let Some(rest) = line.strip_prefix(':') else {
        return LineAction::Query(line.to_string());
    };
    let mut parts = rest.split_whitespace();
    match parts.next() {
        Some("quit" | "q") => LineAction::Quit,
        Some("help" | "h") => LineAction::Help,
        Some("move" | "m") => {
            let (Some(id), Some(shelf)) = (parts.next(), parts.next()) else {
                return LineAction::Invalid("usage: :move <id> <shelf>".to_string());
            };
            match shelf.parse::<Shelf>() {
                Ok(shelf) => LineAction::Move {
                    id: BookId::from(id),
                    shelf,
                },
                Err(e) => LineAction::Invalid(e.to_string()),
            }
        }
        Some(other) => LineAction::Invalid(format!("unknown command :{other} (try :help)")),
        None => LineAction::Invalid("empty command (try :help)".to_string()),
    }
}

fn print_help() {
    println!("Type a query and press Enter; an empty line clears the search.");
    println!("  :move <id> <shelf>   reshelve a result in place");
    println!("  :help                show this message");
    println!("  :quit                exit");
    println!("Shelves: currentlyReading, wantToRead, read, none");
}

async fn interactive(
    handles: &mut DriverHandles,
    change_rx: &mut mpsc::Receiver<ShelfChangeRequest>,
    store: &ShelfStore,
) -> Result<()> {
    println!("fshelf interactive search");
    print_help();

    let restored = handles.latest();
    if !restored.query.trim().is_empty() {
        println!("Restoring last search \"{}\".", restored.query);
        let snapshot = settled_for(handles, &restored.query).await;
        render_plain(&snapshot);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match classify_line(&line) {
                    LineAction::Quit => break,
                    LineAction::Help => print_help(),
                    LineAction::Invalid(message) => println!("{message}"),
                    LineAction::Move { id, shelf } => {
                        debug!(book_id = %id, shelf = %shelf, "reshelve requested");
                        handles
                            .send(SessionEvent::ShelfChangeRequested { id, shelf })
                            .await;
                    }
                    LineAction::Query(text) => {
                        handles.send(SessionEvent::QueryEdited(text.clone())).await;
                        let snapshot = settled_for(handles, &text).await;
                        render_plain(&snapshot);
                    }
                }
            }
            Some(request) = change_rx.recv() => {
                store.upsert(&request.entry, request.shelf)?;
                handles
                    .send(SessionEvent::ShelvesReplaced(store.view()?))
                    .await;
                println!(
                    "Moved \"{}\" to {}.",
                    request.entry.title,
                    request.shelf.label()
                );
                render_plain(&next_snapshot(handles).await);
            }
        }
    }
    Ok(())
}

/// Waits for the driver to publish a snapshot newer than the last one seen.
async fn next_snapshot(handles: &mut DriverHandles) -> SearchSnapshot {
    if handles.snapshots.changed().await.is_err() {
        return handles.latest();
    }
    handles.snapshots.borrow_and_update().clone()
}

// =============================================================================
// Rendering
// =============================================================================

fn render_plain(snapshot: &SearchSnapshot) {
    match snapshot.view() {
        SearchView::NotSearching => println!("Nothing to search for."),
        SearchView::Loading => println!("Searching for \"{}\"...", snapshot.query),
        SearchView::NoMatches => {
            let [first, second] = suggested_pair();
            println!("No books matched \"{}\".", snapshot.query);
            println!("Try \"{first}\" or \"{second}\".");
        }
        SearchView::HasResults(entries) => {
            println!("{} result(s) for \"{}\":", entries.len(), snapshot.query);
            for entry in entries {
                println!("{}", format_entry(entry));
            }
        }
    }
}

fn format_entry(entry: &CatalogEntry) -> String {
    let shelf = if entry.shelf.is_assigned() {
        format!("[{}]", entry.shelf.as_str())
    } else {
        "[ ]".to_string()
    };
    let authors = if entry.authors.is_empty() {
        String::new()
    } else {
        format!(" by {}", entry.authors_joined())
    };
    format!("  {shelf:<18} {:<14} {}{authors}", entry.id, entry.title)
}
