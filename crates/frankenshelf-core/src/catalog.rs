//! Catalog entries and the search lookup contract.
//!
//! The catalog service answers `POST /search` with a JSON envelope
//! `{"books": ...}` whose payload is either an entry array or an error object.
//! [`parse_search_body`] turns that "maybe array, maybe error object" shape
//! into an explicit [`LookupOutcome`]; the session collapses the error arm to
//! an empty result list when it accepts a response.
//!
//! The transport itself stays out of this crate. [`CatalogClient`] is the
//! seam: the CLI provides a reqwest-backed implementation, tests provide
//! scripted ones.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CatalogError;
use crate::shelf::{BookId, Shelf};

// =============================================================================
// Catalog entry
// =============================================================================

/// A book record returned by the external search lookup.
///
/// `shelf` is derived state. The raw wire value is parsed for completeness,
/// but every accepted lookup overwrites it from the shelf assignment view, so
/// a settled result list never disagrees with the authoritative store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Stable catalog id, the join key with the shelf store.
    pub id: BookId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub shelf: Shelf,
}

impl CatalogEntry {
    /// A bare entry with no authors, no thumbnail, and no shelf.
    #[must_use]
    pub fn new(id: impl Into<BookId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            thumbnail_url: None,
            shelf: Shelf::None,
        }
    }

    /// Authors joined for one-line rendering.
    #[must_use]
    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

// =============================================================================
// Lookup contract
// =============================================================================

/// Outcome of one catalog lookup: entries, or the reason none arrived.
pub type LookupOutcome = std::result::Result<Vec<CatalogEntry>, CatalogError>;

/// Boxed future returned by [`CatalogClient::search`].
pub type LookupFuture = Pin<Box<dyn Future<Output = LookupOutcome> + Send + 'static>>;

/// An asynchronous catalog search backend.
///
/// Implementations carry no ordering or latency guarantees. The driver pairs
/// each completion with its originating query string; the session alone
/// decides whether a completion is still current.
pub trait CatalogClient: Send + Sync {
    /// Look up `query` against the catalog.
    fn search(&self, query: &str) -> LookupFuture;
}

// =============================================================================
// Wire parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct WireBook {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default, rename = "imageLinks")]
    image_links: Option<WireImageLinks>,
    #[serde(default)]
    shelf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireImageLinks {
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default, rename = "smallThumbnail")]
    small_thumbnail: Option<String>,
}

impl From<WireBook> for CatalogEntry {
    fn from(book: WireBook) -> Self {
        let thumbnail_url = book
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail));
        // Unknown wire shelf strings degrade to unassigned; the value is
        // overwritten at reconciliation either way.
        let shelf = book
            .shelf
            .as_deref()
            .and_then(|s| s.parse::<Shelf>().ok())
            .unwrap_or(Shelf::None);
        Self {
            id: BookId(book.id),
            title: book.title,
            authors: book.authors,
            thumbnail_url,
            shelf,
        }
    }
}

/// Parse the body of a search response.
///
/// Accepts the `{"books": ...}` envelope. An entry array yields `Ok`;
/// a service error object (`{"books": {"error": ...}}`) yields
/// [`CatalogError::Service`]; anything else is [`CatalogError::Malformed`].
/// Individual entries that fail to parse are skipped rather than failing the
/// whole lookup.
pub fn parse_search_body(body: &serde_json::Value) -> LookupOutcome {
    let books = body
        .get("books")
        .ok_or_else(|| CatalogError::Malformed("missing books field".to_string()))?;

    match books {
        serde_json::Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                match serde_json::from_value::<WireBook>(item.clone()) {
                    Ok(book) => entries.push(CatalogEntry::from(book)),
                    Err(e) => {
                        debug!(error = %e, "skipping unparseable catalog entry");
                    }
                }
            }
            Ok(entries)
        }
        serde_json::Value::Object(obj) => {
            let reason = obj
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown service error")
                .to_string();
            Err(CatalogError::Service(reason))
        }
        other => Err(CatalogError::Malformed(format!(
            "books field is neither array nor object: {other}"
        ))),
    }
}
