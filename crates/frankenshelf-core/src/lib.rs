//! frankenshelf-core: Core library for FrankenShelf
//!
//! This crate provides the core functionality for `fshelf`, a search-session
//! reconciliation engine for a personal book shelf backed by a remote
//! catalog service.
//!
//! # Architecture
//!
//! ```text
//! query edits → SearchSession → LookupRequest → CatalogClient (HTTP in CLI)
//!                    ↑                                  ↓
//!            ShelfAssignmentView ◄── ShelfStore   LookupOutcome
//!                    ↑                                  ↓
//!              shelf moves  ◄──────── reconcile ── acceptance rule
//! ```
//!
//! # Modules
//!
//! - `shelf`: Shelf identifiers, book ids, and the assignment view
//! - `catalog`: Catalog entries, the lookup client trait, and wire parsing
//! - `session`: The search session state machine and acceptance rule
//! - `store`: SQLite-backed shelf assignments and the last-query slot
//! - `driver`: Async task that hosts a session and executes its lookups
//! - `suggest`: Known-good search terms for the zero-match screen
//! - `config`: Configuration management
//! - `logging`: Structured logging setup
//! - `error`: Error types with remediation hints
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod session;
pub mod shelf;
pub mod store;
pub mod suggest;

pub use error::{CatalogError, Error, Result, StorageError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
