//! Shelf identity and the read-only shelf assignment projection.
//!
//! [`Shelf`] names the bucket a book lives in. [`ShelfAssignmentView`] is the
//! id-indexed snapshot of the authoritative store that search results are
//! reconciled against; its owner replaces it wholesale, and nothing here
//! mutates the store through it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Shelf
// =============================================================================

/// The bucket a book is assigned to, or none.
///
/// Serialized camelCase to match the catalog service wire format
/// (`currentlyReading`, `wantToRead`, `read`, `none`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Shelf {
    /// Being read right now.
    CurrentlyReading,
    /// Queued for later.
    WantToRead,
    /// Finished.
    Read,
    /// Not on any shelf. This is the resolution for every unknown book id.
    #[default]
    None,
}

impl Shelf {
    /// Stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CurrentlyReading => "currentlyReading",
            Self::WantToRead => "wantToRead",
            Self::Read => "read",
            Self::None => "none",
        }
    }

    /// Human label for rendering.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CurrentlyReading => "Currently Reading",
            Self::WantToRead => "Want to Read",
            Self::Read => "Read",
            Self::None => "None",
        }
    }

    /// Whether the book sits on a real shelf (`None` means unassigned).
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        !matches!(self, Self::None)
    }

    /// The three real shelves, in display order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::CurrentlyReading, Self::WantToRead, Self::Read]
    }
}

impl fmt::Display for Shelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown shelf name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shelf: {0} (expected currentlyReading, wantToRead, read, or none)")]
pub struct ParseShelfError(pub String);

impl FromStr for Shelf {
    type Err = ParseShelfError;

    /// Accepts wire names plus forgiving `currently-reading` / `want_to_read`
    /// style spellings for CLI input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "currentlyreading" => Ok(Self::CurrentlyReading),
            "wanttoread" => Ok(Self::WantToRead),
            "read" => Ok(Self::Read),
            "none" => Ok(Self::None),
            _ => Err(ParseShelfError(s.to_string())),
        }
    }
}

// =============================================================================
// Book identity
// =============================================================================

/// Stable catalog identifier, the join key between search results and the
/// shelf store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookId(pub String);

impl BookId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BookId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// Shelf assignment view
// =============================================================================

/// Read-only, id-indexed projection of the shelf store.
///
/// `shelf_of` is total: unknown ids resolve to [`Shelf::None`]. Recording an
/// explicit `Shelf::None` removes the id, so the map only ever contains
/// assigned books and "absent" and "unassigned" stay the same observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfAssignmentView {
    assignments: HashMap<BookId, Shelf>,
}

impl ShelfAssignmentView {
    /// An empty view: every id resolves to `Shelf::None`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a view from (id, shelf) pairs. `Shelf::None` pairs are dropped.
    #[must_use]
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (BookId, Shelf)>,
    {
        let mut view = Self::new();
        for (id, shelf) in pairs {
            view.insert(id, shelf);
        }
        view
    }

    /// Record an assignment. A book has exactly one shelf, so inserting an id
    /// twice keeps the latest value; `Shelf::None` removes the id.
    pub fn insert(&mut self, id: BookId, shelf: Shelf) {
        if shelf.is_assigned() {
            self.assignments.insert(id, shelf);
        } else {
            self.assignments.remove(&id);
        }
    }

    /// The shelf for `id`; `Shelf::None` when the book is not stored.
    #[must_use]
    pub fn shelf_of(&self, id: &BookId) -> Shelf {
        self.assignments.get(id).copied().unwrap_or(Shelf::None)
    }

    /// Number of assigned books.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assigned (id, shelf) pairs, arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&BookId, Shelf)> {
        self.assignments.iter().map(|(id, shelf)| (id, *shelf))
    }
}
