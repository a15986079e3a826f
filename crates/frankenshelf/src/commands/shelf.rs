//! `fshelf shelf` - inspect and reorganize the local shelf.
//!
//! `list` prints every stored book grouped by shelf, `move` reassigns one
//! stored book (`none` drops it). Moving a book that was never shelved is an
//! error; use `fshelf search` to shelve new books.

use clap::{Args, Subcommand};
use frankenshelf_core::Result;
use frankenshelf_core::catalog::CatalogEntry;
use frankenshelf_core::config::Config;
use frankenshelf_core::shelf::{BookId, Shelf};
use frankenshelf_core::store::ShelfStore;
use serde::Serialize;
use tracing::{debug, info};

use crate::commands::OutputFormat;

#[derive(Debug, Subcommand)]
pub enum ShelfCommand {
    /// List every shelved book, grouped by shelf.
    List(ListArgs),
    /// Move a stored book to another shelf, or to `none` to drop it.
    Move(MoveArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain, value_name = "FORMAT")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Catalog id of the book.
    pub id: String,

    /// Target shelf: currentlyReading, wantToRead, read, or none.
    #[arg(value_parser = parse_shelf)]
    pub shelf: Shelf,
}

fn parse_shelf(raw: &str) -> std::result::Result<Shelf, String> {
    raw.parse::<Shelf>().map_err(|e| e.to_string())
}

pub fn execute(command: ShelfCommand, config: &Config) -> Result<()> {
    let store = ShelfStore::open_at(&config.data_layout().db_path)?;
    match command {
        ShelfCommand::List(args) => list(&store, args.format),
        ShelfCommand::Move(args) => move_book(&store, &args.id, args.shelf),
    }
}

// =============================================================================
// list
// =============================================================================

/// One shelf and its books, in stored order.
#[derive(Debug, Serialize)]
struct ShelfGroup {
    shelf: Shelf,
    label: &'static str,
    books: Vec<CatalogEntry>,
}

fn group_by_shelf(entries: Vec<CatalogEntry>) -> Vec<ShelfGroup> {
    let mut groups: Vec<ShelfGroup> = Shelf::all()
        .iter()
        .map(|&shelf| ShelfGroup {
            shelf,
            label: shelf.label(),
            books: Vec::new(),
        })
        .collect();
    for entry in entries {
        match groups.iter_mut().find(|g| g.shelf == entry.shelf) {
            Some(group) => group.books.push(entry),
            None => debug!(book_id = %entry.id, "stored book has no shelf, skipping"),
        }
    }
    groups
}

fn list(store: &ShelfStore, format: OutputFormat) -> Result<()> {
    let groups = group_by_shelf(store.all()?);
    if format.is_json() {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }
    let mut total = 0usize;
    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            println!();
        }
        println!("{}", group.label);
        if group.books.is_empty() {
            println!("  (empty)");
        }
        for book in &group.books {
            total += 1;
            let authors = if book.authors.is_empty() {
                String::new()
            } else {
                format!("  by {}", book.authors_joined())
            };
            println!("  {:<14} {}{authors}", book.id, book.title);
        }
    }
    println!();
    println!("{total} book(s) shelved.");
    Ok(())
}

// =============================================================================
// move
// =============================================================================

fn move_book(store: &ShelfStore, id: &str, shelf: Shelf) -> Result<()> {
    let id = BookId::from(id);
    store.assign(&id, shelf)?;
    info!(book_id = %id, shelf = %shelf, "shelf assignment changed");
    if shelf.is_assigned() {
        println!("Moved {id} to {}.", shelf.label());
    } else {
        println!("Removed {id} from the shelf.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, shelf: Shelf) -> CatalogEntry {
        let mut entry = CatalogEntry::new(BookId::from(id), title);
        entry.shelf = shelf;
        entry
    }

    // -- grouping -------------------------------------------------------------

    #[test]
    fn groups_follow_shelf_order() {
        let groups = group_by_shelf(Vec::new());
        let shelves: Vec<Shelf> = groups.iter().map(|g| g.shelf).collect();
        assert_eq!(
            shelves,
            vec![Shelf::CurrentlyReading, Shelf::WantToRead, Shelf::Read]
        );
        assert!(groups.iter().all(|g| g.books.is_empty()));
    }

    #[test]
    fn books_land_on_their_shelf_in_input_order() {
        let groups = group_by_shelf(vec![
            entry("a", "Alpha", Shelf::Read),
            entry("b", "Beta", Shelf::CurrentlyReading),
            entry("c", "Gamma", Shelf::Read),
        ]);
        assert_eq!(groups[0].books.len(), 1);
        assert_eq!(groups[1].books.len(), 0);
        assert_eq!(groups[2].books.len(), 2);
        assert_eq!(groups[2].books[0].id.as_str(), "a");
        assert_eq!(groups[2].books[1].id.as_str(), "c");
    }

    #[test]
    fn unshelved_entries_are_not_listed() {
        let groups = group_by_shelf(vec![entry("x", "Stray", Shelf::None)]);
        assert!(groups.iter().all(|g| g.books.is_empty()));
    }

    // -- serialization --------------------------------------------------------

    #[test]
    fn shelf_group_serializes_with_wire_shelf_names() {
        let groups = group_by_shelf(vec![entry("a", "Alpha", Shelf::WantToRead)]);
        let json = serde_json::to_value(&groups).unwrap();
        assert_eq!(json[1]["shelf"], "wantToRead");
        assert_eq!(json[1]["label"], "Want to Read");
        assert_eq!(json[1]["books"][0]["title"], "Alpha");
    }

    // -- argument parsing -----------------------------------------------------

    #[test]
    fn parse_shelf_accepts_canonical_and_relaxed_forms() {
        assert_eq!(parse_shelf("read"), Ok(Shelf::Read));
        assert_eq!(parse_shelf("want-to-read"), Ok(Shelf::WantToRead));
        assert_eq!(parse_shelf("none"), Ok(Shelf::None));
    }

    #[test]
    fn parse_shelf_reports_the_offending_value() {
        let err = parse_shelf("attic").unwrap_err();
        assert!(err.contains("attic"));
    }
}
