//! Configuration loading and the on-disk data layout.
//!
//! fshelf reads a single optional TOML file; every field has a default, so a
//! missing file is a valid configuration.
//!
//! ```toml
//! [catalog]
//! endpoint = "https://reactnd-books-api.udacity.com"
//! token = "frankenshelf"
//! max_results = 20
//! timeout_ms = 10000
//!
//! [log]
//! level = "info"
//! format = "pretty"
//! ```
//!
//! The config file resolves from the explicit `--config` path, then
//! `FSHELF_CONFIG`, then `<platform config dir>/frankenshelf/config.toml`.
//! The data directory (shelf database) resolves from `FSHELF_DATA`, then
//! `data_dir` in the config file, then `<platform data dir>/frankenshelf`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// Default catalog service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://reactnd-books-api.udacity.com";

/// Default bearer token. The service keys shelf data per token; any stable
/// string works.
pub const DEFAULT_TOKEN: &str = "frankenshelf";

// =============================================================================
// Log format
// =============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output for interactive use.
    #[default]
    Pretty,
    /// Machine-parseable JSON lines.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected pretty or json")),
        }
    }
}

// =============================================================================
// Config
// =============================================================================

/// Top-level fshelf configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub log: LogConfig,
    /// Overrides the platform data directory for the shelf database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Catalog service connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the catalog service.
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub token: String,
    /// Page size requested per lookup.
    pub max_results: u32,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: DEFAULT_TOKEN.to_string(),
            max_results: 20,
            timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load from the resolved config path, falling back to defaults when no
    /// file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match resolve_config_path(explicit) {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate a specific config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.display().to_string(), e.to_string()))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML for `config show` and `config init`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeFailed(e.to_string()))
    }

    /// Write atomically (tmp file + rename), creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::WriteFailed(parent.display().to_string(), e.to_string())
            })?;
        }

        let content = self.to_toml()?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content).map_err(|e| {
            ConfigError::WriteFailed(tmp_path.display().to_string(), e.to_string())
        })?;
        std::fs::rename(&tmp_path, path)
            .map_err(|e| ConfigError::WriteFailed(path.display().to_string(), e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "catalog.endpoint must not be empty".to_string(),
            ));
        }
        if self.catalog.max_results == 0 {
            return Err(ConfigError::Invalid(
                "catalog.max_results must be at least 1".to_string(),
            ));
        }
        if self.catalog.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "catalog.timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved data layout for this configuration.
    #[must_use]
    pub fn data_layout(&self) -> DataLayout {
        DataLayout::resolve(self.data_dir.as_deref())
    }
}

// =============================================================================
// Path resolution
// =============================================================================

/// Explicit path, then `FSHELF_CONFIG`, then the platform config dir.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let env = std::env::var("FSHELF_CONFIG")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    config_path_from(explicit, env)
}

fn config_path_from(explicit: Option<&Path>, env: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env {
        return Some(path);
    }
    dirs::config_dir().map(|d| d.join("frankenshelf").join("config.toml"))
}

/// On-disk layout of the frankenshelf data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    /// Directory that holds everything fshelf persists.
    pub root: PathBuf,
    /// The shelf database (assignments plus the last-query slot).
    pub db_path: PathBuf,
}

impl DataLayout {
    /// The configured `data_dir`, then `FSHELF_DATA`, then the platform data
    /// dir. Callers that take a `--data-dir` flag fold it into the config
    /// before resolving, so an explicit flag is never shadowed by the
    /// environment.
    #[must_use]
    pub fn resolve(configured: Option<&Path>) -> Self {
        let env = std::env::var("FSHELF_DATA")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::resolve_from(env, configured)
    }

    fn resolve_from(env: Option<PathBuf>, configured: Option<&Path>) -> Self {
        let root = configured
            .map(Path::to_path_buf)
            .or(env)
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("frankenshelf")
            });
        let db_path = root.join("shelf.sqlite3");
        Self { root, db_path }
    }
}
