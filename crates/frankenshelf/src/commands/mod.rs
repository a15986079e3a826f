//! Subcommand implementations for the `fshelf` binary.
//!
//! Each submodule owns one subcommand: its clap argument struct and an
//! `execute` entry point. Commands return the core error type so `main` can
//! render remediation hints for failures that have one.

pub mod config;
pub mod search;
pub mod shelf;

use clap::ValueEnum;

/// Output format for commands that print structured data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Plain,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}
