//! Durable shelf store: SQLite-backed book assignments and the last-query
//! slot.
//!
//! The store is the single source of truth for which shelf a book sits on.
//! Search results are only ever a view over it: the session reconciles every
//! accepted entry against [`ShelfStore::view`], and shelf moves write here
//! first.
//!
//! # Schema
//!
//! ```text
//! books(book_id PK, title, authors_json, thumbnail_url, shelf, updated_at)
//! meta(key PK, value)                       -- holds the last-query slot
//! ```
//!
//! Only assigned books are stored; moving a book to `Shelf::None` deletes its
//! row. Connections are opened per operation with WAL and a busy timeout, so
//! concurrent CLI invocations do not trample each other.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::debug;

use crate::catalog::CatalogEntry;
use crate::error::StorageError;
use crate::session::QuerySlot;
use crate::shelf::{BookId, Shelf, ShelfAssignmentView};

const LAST_QUERY_KEY: &str = "last_query";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS books (
        book_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        authors_json TEXT NOT NULL,
        thumbnail_url TEXT,
        shelf TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_books_shelf ON books(shelf);
";

// =============================================================================
// Store
// =============================================================================

/// Handle to the on-disk shelf database.
///
/// Cheap to clone; each operation opens its own connection.
#[derive(Debug, Clone)]
pub struct ShelfStore {
    db_path: PathBuf,
}

impl ShelfStore {
    /// Open the store at `db_path`, creating parent directories and the
    /// schema on first use.
    pub fn open_at(db_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Database(format!(
                    "cannot create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let store = Self { db_path };
        let conn = store.open()?;
        conn.execute_batch(SCHEMA)?;
        debug!(db_path = %store.db_path.display(), "shelf store ready");
        Ok(store)
    }

    /// Path of the underlying database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Ok(conn)
    }

    // -- Writes ---------------------------------------------------------------

    /// Put `entry` on `shelf`, inserting or updating its stored metadata.
    ///
    /// `Shelf::None` removes the book instead; the store never holds
    /// unassigned rows.
    pub fn upsert(&self, entry: &CatalogEntry, shelf: Shelf) -> Result<(), StorageError> {
        if !shelf.is_assigned() {
            return self.remove(&entry.id);
        }

        let conn = self.open()?;
        let authors_json = serde_json::to_string(&entry.authors)
            .map_err(|e| StorageError::Database(format!("cannot encode authors: {e}")))?;
        conn.execute(
            "INSERT INTO books (book_id, title, authors_json, thumbnail_url, shelf, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(book_id) DO UPDATE SET
                 title = excluded.title,
                 authors_json = excluded.authors_json,
                 thumbnail_url = excluded.thumbnail_url,
                 shelf = excluded.shelf,
                 updated_at = excluded.updated_at",
            params![
                entry.id.as_str(),
                entry.title,
                authors_json,
                entry.thumbnail_url,
                shelf.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        debug!(book_id = %entry.id, shelf = %shelf, "book shelved");
        Ok(())
    }

    /// Move an already-stored book to `shelf`.
    ///
    /// Unlike [`upsert`], this cannot introduce a book the store has never
    /// seen; moving an unknown id fails with [`StorageError::UnknownBook`].
    /// `Shelf::None` removes the row.
    ///
    /// [`upsert`]: ShelfStore::upsert
    pub fn assign(&self, id: &BookId, shelf: Shelf) -> Result<(), StorageError> {
        let conn = self.open()?;
        let changed = if shelf.is_assigned() {
            conn.execute(
                "UPDATE books SET shelf = ?1, updated_at = ?2 WHERE book_id = ?3",
                params![shelf.as_str(), Utc::now().to_rfc3339(), id.as_str()],
            )?
        } else {
            conn.execute("DELETE FROM books WHERE book_id = ?1", [id.as_str()])?
        };
        if changed == 0 {
            return Err(StorageError::UnknownBook(id.as_str().to_string()));
        }
        debug!(book_id = %id, shelf = %shelf, "book moved");
        Ok(())
    }

    fn remove(&self, id: &BookId) -> Result<(), StorageError> {
        let conn = self.open()?;
        let removed = conn.execute("DELETE FROM books WHERE book_id = ?1", [id.as_str()])?;
        if removed > 0 {
            debug!(book_id = %id, "book unshelved");
        }
        Ok(())
    }

    // -- Reads ----------------------------------------------------------------

    /// The shelf `id` is assigned to. Total: unknown ids are `Shelf::None`.
    pub fn shelf_of(&self, id: &BookId) -> Result<Shelf, StorageError> {
        let conn = self.open()?;
        let shelf = conn.query_row(
            "SELECT shelf FROM books WHERE book_id = ?1",
            [id.as_str()],
            |row| row.get::<_, String>(0),
        );
        match shelf {
            Ok(raw) => Ok(raw.parse().unwrap_or_default()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(Shelf::None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every stored book, ordered by title for stable listings.
    pub fn all(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT book_id, title, authors_json, thumbnail_url, shelf
             FROM books
             ORDER BY title COLLATE NOCASE, book_id",
        )?;

        let books = stmt
            .query_map([], |row| {
                let authors_json: String = row.get(2)?;
                let shelf_raw: String = row.get(4)?;
                Ok(CatalogEntry {
                    id: BookId::new(row.get::<_, String>(0)?),
                    title: row.get(1)?,
                    authors: serde_json::from_str(&authors_json).unwrap_or_default(),
                    thumbnail_url: row.get(3)?,
                    shelf: shelf_raw.parse().unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }

    /// Snapshot of all assignments, for reconciling search results.
    pub fn view(&self) -> Result<ShelfAssignmentView, StorageError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT book_id, shelf FROM books")?;

        let pairs = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let shelf_raw: String = row.get(1)?;
                Ok((BookId::new(id), shelf_raw.parse().unwrap_or_default()))
            })?
            .collect::<Result<Vec<(BookId, Shelf)>, _>>()?;

        Ok(ShelfAssignmentView::from_pairs(pairs))
    }

    /// Last-query slot persisted alongside the shelves.
    #[must_use]
    pub fn query_slot(&self) -> SqliteQuerySlot {
        SqliteQuerySlot {
            db_path: self.db_path.clone(),
        }
    }
}

// =============================================================================
// Sqlite-backed query slot
// =============================================================================

/// [`QuerySlot`] stored in the `meta` table of the shelf database.
#[derive(Debug, Clone)]
pub struct SqliteQuerySlot {
    db_path: PathBuf,
}

impl SqliteQuerySlot {
    fn open(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Ok(conn)
    }
}

impl QuerySlot for SqliteQuerySlot {
    fn get(&self) -> Result<Option<String>, StorageError> {
        let conn = self.open()?;
        let value = conn.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [LAST_QUERY_KEY],
            |row| row.get::<_, String>(0),
        );
        match value {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, value: &str) -> Result<(), StorageError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_QUERY_KEY, value],
        )?;
        Ok(())
    }
}
