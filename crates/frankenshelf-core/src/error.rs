//! Error types for frankenshelf-core.
//!
//! Errors that can stop a command carry a [`Remediation`]: a one-line fix
//! summary, commands worth trying, and optional notes. The CLI prints it
//! under the error message so a dead end always names a next step.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A concrete command a stuck user can paste, with a short label saying
/// what it is for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedCommand {
    pub command: String,
    pub label: String,
}

/// Actionable guidance attached to an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    /// One-line summary of the fix.
    pub summary: String,
    /// Commands to try, in order of usefulness.
    pub commands: Vec<SuggestedCommand>,
    /// Free-form hints that are not commands.
    pub notes: Vec<String>,
}

impl Remediation {
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Append a command suggestion. The label reads as a trailing comment,
    /// so keep it short and lowercase.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>, label: impl Into<String>) -> Self {
        self.commands.push(SuggestedCommand {
            command: command.into(),
            label: label.into(),
        });
        self
    }

    /// Append a free-form note.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Render as indented plain text:
    ///
    /// ```text
    /// To fix:
    ///   <summary>
    ///   Try:
    ///     <command>   # <label>
    ///   Note: <note>
    /// ```
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut out = String::from("To fix:\n");
        let _ = writeln!(out, "  {}", self.summary);
        if !self.commands.is_empty() {
            out.push_str("  Try:\n");
            for cmd in &self.commands {
                let _ = writeln!(out, "    {}   # {}", cmd.command, cmd.label);
            }
        }
        for note in &self.notes {
            let _ = writeln!(out, "  Note: {note}");
        }
        out
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for frankenshelf-core
#[derive(Error, Debug)]
pub enum Error {
    /// Shelf store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Catalog lookup errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Storage(err) => Some(err.remediation()),
            Self::Catalog(err) => Some(err.remediation()),
            Self::Config(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("An I/O operation failed. Check paths and permissions.")
                    .command("fshelf config show", "see the resolved data directory")
                    .note("The data directory must exist and be writable."),
            ),
            Self::Json(_) => Some(
                Remediation::new("JSON output could not be produced.")
                    .command(
                        "fshelf --log-level debug search \"...\"",
                        "retry with debug logs",
                    )
                    .note("Strings with invalid UTF-8 cannot be serialized."),
            ),
        }
    }
}

/// Shelf-store-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Book not on any shelf: {0}")]
    UnknownBook(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl StorageError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::Database(_) => {
                Remediation::new("A shelf database operation failed.")
                    .command("fshelf config show", "see the resolved data directory")
                    .note("The data directory must be writable by the current user.")
            }
            Self::UnknownBook(id) => Remediation::new(format!(
                "Book {id} is not on any shelf. Search for it first, then move it."
            ))
            .command("fshelf shelf list", "list everything shelved")
            .command("fshelf search \"title or author\"", "find the book and its id")
            .note("Use the id printed next to a search result."),
        }
    }
}

/// Catalog-lookup-specific errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Network-level failure reaching the catalog service
    #[error("Catalog unreachable: {0}")]
    Transport(String),

    /// Non-success HTTP status from the catalog service
    #[error("Catalog returned HTTP {0}")]
    Status(u16),

    /// Response body was not the expected `{"books": [...]}` shape
    #[error("Malformed catalog response: {0}")]
    Malformed(String),

    /// The service reported an error object instead of an entry list
    #[error("Catalog service error: {0}")]
    Service(String),
}

impl CatalogError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::Transport(_) => {
                Remediation::new("The catalog service could not be reached.")
                    .command("fshelf config show", "see the configured endpoint")
                    .note("Set [catalog].endpoint in config.toml if the service moved.")
            }
            Self::Status(status) => Remediation::new(format!(
                "The catalog service answered HTTP {status}."
            ))
            .command("fshelf config show", "check the endpoint and token")
            .note("A 401 or 403 usually means [catalog].token is wrong."),
            Self::Malformed(_) => {
                Remediation::new("The catalog answered with an unexpected body.")
                    .command("fshelf config show", "see the configured endpoint")
                    .note("The endpoint must answer POST /search with a books array.")
            }
            Self::Service(_) => {
                Remediation::new("The catalog rejected the query.")
                    .command("fshelf search \"another term\"", "try a different search")
                    .note("Very short or symbol-only queries are often rejected.")
            }
        }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(String),

    #[error("Failed to write config file {0}: {1}")]
    WriteFailed(String, String),

    #[error("Validation error: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::ReadFailed(path, _) => {
                Remediation::new(format!("The config file {path} could not be read."))
                    .command(format!("ls -l \"{path}\""), "check its permissions")
                    .note("The file must be readable by the current user.")
            }
            Self::ParseFailed(_) => {
                Remediation::new("The config file is not valid TOML.")
                    .command("fshelf config show", "see the config values in effect")
                    .note("fshelf config init writes a known-good starter file.")
            }
            Self::SerializeFailed(_) => {
                Remediation::new("The configuration could not be rendered as TOML.")
                    .command("fshelf config show", "see the config values in effect")
                    .note("Recreate the config from defaults with fshelf config init.")
            }
            Self::WriteFailed(path, _) => {
                Remediation::new(format!("The config file {path} could not be written."))
                    .command(
                        format!("ls -ld \"$(dirname \"{path}\")\""),
                        "check the directory",
                    )
                    .note("Pass --config with a writable path.")
            }
            Self::Invalid(_) => {
                Remediation::new("A config value failed validation.")
                    .command("fshelf config show", "see the config values in effect")
                    .note("The message above names the offending field.")
            }
        }
    }
}

/// Format an error followed by its remediation, ready for stderr.
#[must_use]
pub fn format_error_with_remediation(error: &Error) -> String {
    match error.remediation() {
        Some(remediation) => format!("Error: {error}\n\n{}", remediation.render_plain()),
        None => format!("Error: {error}"),
    }
}
