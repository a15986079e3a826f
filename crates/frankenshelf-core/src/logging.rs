//! Structured logging for fshelf.
//!
//! Log lines go to stderr so command output on stdout stays clean enough
//! to pipe; an optional file copy can be written alongside. Both follow the
//! configured [`LogFormat`], pretty for humans or JSON lines for machines.
//!
//! # Correlation fields
//!
//! Use these field names consistently in spans and events:
//! - `query`: The raw search query a lookup was issued for
//! - `book_id`: Catalog id of the book being shelved or moved
//! - `shelf`: Target shelf of an assignment
//! - `count`: Number of entries in an accepted completion

pub use crate::config::LogFormat;

use std::io;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry, fmt};

static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Logging configuration, the `[log]` section of config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level filter: a bare level name or a full filter directive string.
    /// The `RUST_LOG` environment variable takes precedence when set.
    pub level: String,

    /// Output format (pretty or json)
    pub format: LogFormat,

    /// Optional path to a log file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Error type for logging initialization
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("failed to create log file: {0}")]
    FileCreate(#[from] io::Error),

    #[error("failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global logging subscriber.
///
/// Call once at application startup; subsequent calls return
/// `Err(LogError::AlreadyInitialized)`. `RUST_LOG` overrides the configured
/// level, e.g. `RUST_LOG=frankenshelf_core=debug,fshelf=trace`.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => parse_filter(&config.level)?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![filter.boxed()];
    layers.push(stderr_layer(config.format));
    if let Some(path) = &config.file {
        layers.push(file_layer(config.format, open_log_file(path)?));
    }
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))?;
    let _ = LOGGING_INITIALIZED.set(true);

    tracing::info!(
        log_level = %config.level,
        log_format = %config.format,
        log_file = ?config.file,
        "Logging initialized"
    );

    Ok(())
}

/// Build a filter from the configured level.
///
/// A bare level name is validated strictly and normalized through
/// [`LogLevel`], so `WARNING` works and `verbose` is rejected up front.
/// Anything with `=` or `,` is treated as a directive string and handed to
/// the filter parser as-is.
fn parse_filter(spec: &str) -> Result<EnvFilter, LogError> {
    if spec.contains('=') || spec.contains(',') {
        return EnvFilter::try_new(spec).map_err(|_| LogError::InvalidLevel(spec.to_string()));
    }
    let level: LogLevel = spec
        .parse()
        .map_err(|_| LogError::InvalidLevel(spec.to_string()))?;
    Ok(EnvFilter::new(level.as_str()))
}

fn stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(SystemTime)
            .with_writer(io::stderr)
            .with_target(true)
            .with_current_span(true)
            .flatten_event(true)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, file: std::fs::File) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(file)
            .with_target(true)
            .with_ansi(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(SystemTime)
            .with_writer(file)
            .with_target(true)
            .with_current_span(true)
            .flatten_event(true)
            .boxed(),
    }
}

/// Open the log file for appending, creating parent directories.
///
/// Freshly created directories get mode 0700 and fresh files 0600; the log
/// can carry query text, which is private.
fn open_log_file(path: &Path) -> Result<std::fs::File, LogError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let existed = parent.exists();
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            if !existed {
                set_mode(parent, 0o700)?;
            }
        }
    }

    let existed = path.exists();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    #[cfg(unix)]
    if !existed {
        set_mode(path, 0o600)?;
    }
    Ok(file)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

/// Bare log level names accepted in config and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Canonical lowercase name, as the filter parser expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "unknown log level: {s}. Expected one of: trace, debug, info, warn, error"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects everything a layer writes, for asserting on output.
    #[derive(Clone, Default)]
    struct CaptureWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl CaptureWriter {
        fn text(&self) -> String {
            String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
        }

        fn first_line_json(&self) -> serde_json::Value {
            let text = self.text();
            let line = text
                .lines()
                .find(|line| !line.trim().is_empty())
                .expect("captured at least one log line");
            serde_json::from_str(line).expect("log line is valid JSON")
        }
    }

    impl io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    // -- level parsing --------------------------------------------------------

    #[test]
    fn log_level_parses_every_name_and_alias() {
        for (raw, want) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("warning", LogLevel::Warn),
            ("error", LogLevel::Error),
            ("WARNING", LogLevel::Warn),
            ("Error", LogLevel::Error),
        ] {
            assert_eq!(raw.parse::<LogLevel>().unwrap(), want, "parsing {raw:?}");
        }
    }

    #[test]
    fn log_level_rejects_unknown_names() {
        let err = "verbose".parse::<LogLevel>().unwrap_err();
        assert!(err.contains("verbose"));
        assert!(err.contains("trace, debug, info, warn, error"));
    }

    #[test]
    fn log_level_round_trips_through_as_str() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn log_level_orders_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn log_level_maps_onto_tracing_levels() {
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }

    // -- filter building ------------------------------------------------------

    #[test]
    fn parse_filter_accepts_bare_levels() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("WARNING").is_ok());
    }

    #[test]
    fn parse_filter_rejects_bad_levels_up_front() {
        let err = parse_filter("verbose").unwrap_err();
        let LogError::InvalidLevel(spec) = err else {
            panic!("expected InvalidLevel, got {err:?}");
        };
        assert_eq!(spec, "verbose");
    }

    #[test]
    fn parse_filter_passes_directives_through() {
        assert!(parse_filter("frankenshelf_core=debug,fshelf=trace").is_ok());
    }

    // -- config ---------------------------------------------------------------

    #[test]
    fn log_config_defaults_to_pretty_info() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn log_config_fills_missing_fields_from_defaults() {
        let config: LogConfig = serde_json::from_str(r#"{"level": "debug"}"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn log_config_survives_a_serde_round_trip() {
        let config = LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
            file: Some(PathBuf::from("/tmp/fshelf.log")),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: LogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.level, config.level);
        assert_eq!(parsed.format, config.format);
        assert_eq!(parsed.file, config.file);
    }

    // -- output formats -------------------------------------------------------

    #[test]
    fn json_lines_flatten_event_fields() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("info"))
            .with(
                fmt::layer()
                    .json()
                    .with_timer(SystemTime)
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(writer.clone()),
            );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(query = "harry potter", count = 3_u64, "lookup accepted");
        });

        let parsed = writer.first_line_json();
        assert!(parsed.get("timestamp").is_some());
        assert_eq!(
            parsed.get("query").and_then(|v| v.as_str()),
            Some("harry potter")
        );
        assert_eq!(
            parsed.get("count").and_then(serde_json::Value::as_u64),
            Some(3)
        );
    }

    #[test]
    fn json_lines_carry_the_current_span() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("info"))
            .with(
                fmt::layer()
                    .json()
                    .with_timer(SystemTime)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(writer.clone()),
            );

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("lookup", query = "dune");
            let _guard = span.enter();
            tracing::info!("inside span");
        });

        let parsed = writer.first_line_json();
        assert_eq!(
            parsed.pointer("/span/query").and_then(|v| v.as_str()),
            Some("dune")
        );
    }

    #[test]
    fn pretty_lines_contain_the_message() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("info"))
            .with(
                fmt::layer()
                    .with_writer(writer.clone())
                    .with_target(true)
                    .with_ansi(false),
            );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("restoring last search");
        });

        assert!(writer.text().contains("restoring last search"));
    }

    // Note: init_logging itself is not unit-testable here because it sets a
    // process-global subscriber and tests run in parallel. The CLI smoke
    // tests cover that path.

    // -- errors ---------------------------------------------------------------

    #[test]
    fn log_error_messages_name_the_problem() {
        assert_eq!(
            LogError::AlreadyInitialized.to_string(),
            "logging already initialized"
        );
        assert_eq!(
            LogError::InvalidLevel("verbose".to_string()).to_string(),
            "invalid log level: verbose"
        );
        let err: LogError = io::Error::new(io::ErrorKind::NotFound, "no such file").into();
        assert!(matches!(err, LogError::FileCreate(_)));
    }

    // -- log file handling ----------------------------------------------------

    #[test]
    fn open_log_file_creates_nested_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a").join("b").join("fshelf.log");
        let _file = open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn open_log_file_appends_to_an_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("fshelf.log");
        std::fs::write(&path, "first\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        io::Write::write_all(&mut file, b"second\n").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[cfg(unix)]
    #[test]
    fn open_log_file_restricts_fresh_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("private").join("fshelf.log");
        let _file = open_log_file(&path).unwrap();

        let dir_mode = std::fs::metadata(tmp.path().join("private"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn open_log_file_leaves_existing_permissions_alone() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("fshelf.log");
        std::fs::write(&path, "data").unwrap();
        set_mode(&path, 0o644).unwrap();

        let _file = open_log_file(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
