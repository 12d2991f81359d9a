//! Logging setup using tracing.
//!
//! Two outputs:
//! - the console, filtered by `RUST_LOG` when set
//! - a persistent `app.log` in the log directory, written by a single
//!   background worker so callers never block on disk
//!
//! The log file is never rotated. Instead it is discarded at start-up once it
//! grows past [`MAX_LOG_FILE_SIZE`], and can be read back or cleared through
//! [`LogFile`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Name of the log file inside the log directory.
pub const LOG_FILE_NAME: &str = "app.log";

/// Size above which the log file is discarded at start-up (2 MiB).
pub const MAX_LOG_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Timestamp format of log lines.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory holding the log file.
    pub log_directory: PathBuf,
    /// Maximum level written to the console.
    pub console_level: Level,
    /// Maximum level written to the log file.
    pub file_level: Level,
    /// Whether to colour console output.
    pub console_ansi: bool,
    /// Write the log file as JSON lines instead of plain text.
    pub json_file: bool,
    /// Size above which an existing log file is discarded.
    pub max_file_size: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LoggingConfig {
    /// Verbose logging for development builds.
    #[must_use]
    pub fn development() -> Self {
        Self {
            log_directory: default_log_directory(),
            console_level: Level::DEBUG,
            file_level: Level::TRACE,
            console_ansi: true,
            json_file: false,
            max_file_size: MAX_LOG_FILE_SIZE,
        }
    }

    /// Quiet console, debug-level file.
    #[must_use]
    pub fn production() -> Self {
        Self {
            log_directory: default_log_directory(),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            console_ansi: true,
            json_file: false,
            max_file_size: MAX_LOG_FILE_SIZE,
        }
    }

    /// Pick a configuration based on the build type.
    #[must_use]
    pub fn auto() -> Self {
        if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Set the log directory.
    #[must_use]
    pub fn with_log_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_directory = path.into();
        self
    }

    /// Set the console log level.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    /// Set the file log level.
    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    /// Write the log file as JSON lines.
    #[must_use]
    pub const fn with_json_file(mut self, json: bool) -> Self {
        self.json_file = json;
        self
    }
}

/// The persistent log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    path: PathBuf,
}

impl LogFile {
    /// The log file inside `log_directory`.
    #[must_use]
    pub fn new(log_directory: &Path) -> Self {
        Self {
            path: log_directory.join(LOG_FILE_NAME),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole content of the log. Empty when nothing was logged yet.
    pub fn read(&self) -> Result<String, LoggingError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(LoggingError::Io {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Truncate the log.
    pub fn clear(&self) -> Result<(), LoggingError> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::write(&self.path, "").map_err(|e| LoggingError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Delete the log if it is larger than `max_size`. Returns whether it was.
    pub fn discard_if_larger_than(&self, max_size: u64) -> Result<bool, LoggingError> {
        let Ok(metadata) = fs::metadata(&self.path) else {
            return Ok(false);
        };
        if metadata.len() <= max_size {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| LoggingError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }
}

/// Keeps file logging active. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
    log_file: LogFile,
    discarded: bool,
}

impl LoggingGuard {
    /// The log file being written.
    #[must_use]
    pub const fn log_file(&self) -> &LogFile {
        &self.log_file
    }

    /// Whether an oversized log file was discarded during setup.
    #[must_use]
    pub const fn discarded_oversized(&self) -> bool {
        self.discarded
    }
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("log_file", &self.log_file)
            .finish_non_exhaustive()
    }
}

/// Build the console + file subscriber without installing it.
///
/// Prepares the log directory and discards an oversized log file first.
pub fn build_subscriber(
    config: &LoggingConfig,
) -> Result<(impl Subscriber + Send + Sync + 'static, LoggingGuard), LoggingError> {
    if !config.log_directory.exists() {
        fs::create_dir_all(&config.log_directory).map_err(|e| {
            LoggingError::DirectoryCreationFailed {
                path: config.log_directory.clone(),
                reason: e.to_string(),
            }
        })?;
    }

    let log_file = LogFile::new(&config.log_directory);
    let discarded = log_file.discard_if_larger_than(config.max_file_size)?;

    let file_appender = tracing_appender::rolling::never(&config.log_directory, LOG_FILE_NAME);
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG overrides the console filter only.
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(crate_directives(config.console_level)));
    let file_filter = EnvFilter::new(crate_directives(config.file_level));

    let console_layer = fmt::layer()
        .with_ansi(config.console_ansi)
        .with_target(false)
        .with_timer(ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_string()))
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = if config.json_file {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_timer(ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_string()))
            .json()
            .with_filter(file_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_timer(ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_string()))
            .with_filter(file_filter)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer);

    Ok((
        subscriber,
        LoggingGuard {
            _file_guard: file_guard,
            log_file,
            discarded,
        },
    ))
}

/// Install the global subscriber.
///
/// Returns a guard that must be kept alive for the lifetime of the process.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let (subscriber, guard) = build_subscriber(config)?;
    subscriber
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
    if guard.discarded_oversized() {
        tracing::info!("Discarded log file larger than {} bytes", config.max_file_size);
    }
    tracing::debug!("Logging to {}", guard.log_file().path().display());
    Ok(guard)
}

/// Install the global subscriber with [`LoggingConfig::auto`].
pub fn init_auto() -> Result<LoggingGuard, LoggingError> {
    init(&LoggingConfig::auto())
}

/// Default log directory.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("libretube")
        .join("logs")
}

fn crate_directives(level: Level) -> String {
    let level = level_to_directive(level);
    format!("warn,libretube={level},libretube_core={level}")
}

const fn level_to_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Errors that can occur while setting up or accessing logs.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// Reading, clearing or discarding the log file failed.
    #[error("Log file error at {path}: {reason}")]
    Io {
        /// The log file.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_production() {
        let config = LoggingConfig::default();
        assert_eq!(config.console_level, Level::INFO);
        assert_eq!(config.file_level, Level::DEBUG);
        assert_eq!(config.max_file_size, MAX_LOG_FILE_SIZE);
        assert!(!config.json_file);
    }

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::development()
            .with_log_directory("/tmp/logs")
            .with_console_level(Level::WARN)
            .with_file_level(Level::INFO)
            .with_json_file(true);

        assert_eq!(config.log_directory, PathBuf::from("/tmp/logs"));
        assert_eq!(config.console_level, Level::WARN);
        assert_eq!(config.file_level, Level::INFO);
        assert!(config.json_file);
    }

    #[test]
    fn test_read_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let log = LogFile::new(temp_dir.path());
        assert_eq!(log.read().unwrap(), "");
        log.clear().unwrap();

        fs::write(log.path(), "line\n").unwrap();
        assert_eq!(log.read().unwrap(), "line\n");
        log.clear().unwrap();
        assert_eq!(log.read().unwrap(), "");
        assert!(log.path().exists());
    }

    #[test]
    fn test_oversized_log_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let log = LogFile::new(temp_dir.path());
        fs::write(log.path(), vec![b'x'; 16]).unwrap();

        assert!(!log.discard_if_larger_than(16).unwrap());
        assert!(log.path().exists());
        assert!(log.discard_if_larger_than(15).unwrap());
        assert!(!log.path().exists());
        assert!(!log.discard_if_larger_than(15).unwrap());
    }

    #[test]
    fn test_file_layer_writes_lines() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoggingConfig::production().with_log_directory(temp_dir.path().join("logs"));
        fs::create_dir_all(&config.log_directory).unwrap();
        fs::write(
            config.log_directory.join(LOG_FILE_NAME),
            vec![b'x'; (MAX_LOG_FILE_SIZE + 1) as usize],
        )
        .unwrap();

        let (subscriber, guard) = build_subscriber(&config).unwrap();
        let log_file = guard.log_file().clone();
        assert!(guard.discarded_oversized());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "libretube_core::backup", "backup written");
            tracing::trace!(target: "libretube_core::backup", "too detailed");
        });
        drop(guard);

        let content = log_file.read().unwrap();
        assert!(!content.starts_with('x'));
        assert!(content.contains("INFO"));
        assert!(content.contains("libretube_core::backup"));
        assert!(content.contains("backup written"));
        assert!(!content.contains("too detailed"));
    }
}
