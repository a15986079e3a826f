//! fshelf - search an external book catalog and keep a personal shelf.
//!
//! The binary stays thin: parse the CLI, load config, fold flag overrides
//! in, initialize logging, then dispatch onto a current-thread tokio
//! runtime. Errors that carry a remediation hint are printed with it.

mod client;
mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use frankenshelf_core::config::{Config, LogFormat};
use frankenshelf_core::error::format_error_with_remediation;
use frankenshelf_core::logging::init_logging;
use tracing::debug;

use crate::commands::{config as config_cmd, search, shelf};

#[derive(Debug, Parser)]
#[command(
    name = "fshelf",
    version,
    about = "Search a book catalog and keep a personal shelf",
    propagate_version = true
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, env = "FSHELF_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for the shelf database.
    #[arg(long, global = true, env = "FSHELF_DATA", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log output format (pretty, json).
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Also write logs to this file.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search the catalog and reconcile results against the shelf.
    Search(search::SearchArgs),
    /// Inspect and reorganize the local shelf.
    #[command(subcommand)]
    Shelf(shelf::ShelfCommand),
    /// Show or initialize the configuration.
    #[command(subcommand)]
    Config(config_cmd::ConfigCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<frankenshelf_core::Error>() {
                Some(core_err) => eprintln!("{}", format_error_with_remediation(core_err)),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        Config::load(cli.config.as_deref()).map_err(frankenshelf_core::Error::from)?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }
    if let Some(file) = cli.log_file {
        config.log.file = Some(file);
    }
    init_logging(&config.log)?;
    debug!(version = frankenshelf_core::VERSION, "fshelf starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let result = match cli.command {
            Commands::Search(args) => search::execute(args, &config).await,
            Commands::Shelf(command) => shelf::execute(command, &config),
            Commands::Config(command) => {
                config_cmd::execute(command, &config, cli.config.as_deref())
            }
        };
        result.map_err(anyhow::Error::from)
    })
}
