//! `fshelf config` - show and initialize the configuration file.

use std::path::Path;

use clap::Subcommand;
use frankenshelf_core::Result;
use frankenshelf_core::config::{Config, resolve_config_path};
use frankenshelf_core::error::ConfigError;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the active configuration as TOML.
    Show,
    /// Write a default config file, unless one already exists.
    Init,
}

pub fn execute(command: ConfigCommand, config: &Config, explicit: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommand::Show => show(config, explicit),
        ConfigCommand::Init => init(explicit),
    }
}

fn show(config: &Config, explicit: Option<&Path>) -> Result<()> {
    match resolve_config_path(explicit) {
        Some(path) if path.exists() => println!("# loaded from {}", path.display()),
        Some(path) => println!("# defaults ({} not present)", path.display()),
        None => println!("# defaults (no config directory available)"),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

fn init(explicit: Option<&Path>) -> Result<()> {
    let Some(path) = resolve_config_path(explicit) else {
        return Err(ConfigError::Invalid(
            "no config directory available for this platform".to_string(),
        )
        .into());
    };
    if path.exists() {
        println!("Config already exists at {}.", path.display());
        return Ok(());
    }
    Config::default().write_to(&path)?;
    info!(path = %path.display(), "wrote default config");
    println!("Wrote default config to {}.", path.display());
    Ok(())
}
