//! Application configuration management.
//!
//! Host-level settings that are needed before the database is opened: where
//! data, logs and downloads live, and which remote services to talk to.
//! User-facing settings live in the preference store instead.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::download::DEFAULT_PIPED_API_URL;
use crate::error::{Error, FileSystemError, Result};
use crate::logging::LoggingConfig;
use crate::update::{DEFAULT_UPDATE_FEED_URL, UpdateChannel};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the database.
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    /// Directory holding `app.log`.
    #[serde(default = "crate::logging::default_log_directory")]
    pub log_directory: PathBuf,
    /// Directory downloads and playlist thumbnails go to.
    #[serde(default = "default_download_directory")]
    pub download_directory: PathBuf,
    /// Piped API instance.
    #[serde(default = "default_piped_api_url")]
    pub piped_api_url: String,
    /// Release feed (GitHub repository API URL).
    #[serde(default = "default_update_feed_url")]
    pub update_feed_url: String,
    /// Release line to follow.
    #[serde(default)]
    pub update_channel: UpdateChannel,
    /// Version name of the running build, e.g. `Nightly Build 42`.
    #[serde(default = "default_version_name")]
    pub version_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            log_directory: crate::logging::default_log_directory(),
            download_directory: default_download_directory(),
            piped_api_url: default_piped_api_url(),
            update_feed_url: default_update_feed_url(),
            update_channel: UpdateChannel::default(),
            version_name: default_version_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults, which are written back so the
    /// user has something to edit.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to read config file: {e}"),
            })
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;

        info!("Loaded config from {}", path.display());
        debug!("Data directory: {}", config.data_directory.display());
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: format!("Failed to create config directory: {e}"),
                })
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write config file: {e}"),
            })
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Update the download directory after checking it is usable.
    pub fn set_download_directory(&mut self, path: PathBuf) -> Result<()> {
        validate_directory(&path)?;
        self.download_directory = path;
        info!(
            "Updated download directory to: {}",
            self.download_directory.display()
        );
        Ok(())
    }

    /// Logging configuration writing into [`Self::log_directory`].
    #[must_use]
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::auto().with_log_directory(self.log_directory.clone())
    }

    /// Path of the default config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

/// Default directory holding the database.
#[must_use]
pub fn default_data_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("libretube")
}

/// Default download directory.
#[must_use]
pub fn default_download_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("LibreTube")
}

fn default_piped_api_url() -> String {
    DEFAULT_PIPED_API_URL.to_string()
}

fn default_update_feed_url() -> String {
    DEFAULT_UPDATE_FEED_URL.to_string()
}

fn default_version_name() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("libretube")
        .join("config.json")
}

/// Check that `path` is an absolute, writable directory, creating it if needed.
pub fn validate_directory(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Configuration(
            "Directory must be an absolute path".to_string(),
        ));
    }

    if path.exists() {
        if !path.is_dir() {
            return Err(Error::Configuration(format!(
                "Path exists but is not a directory: {}",
                path.display()
            )));
        }

        let probe = path.join(".libretube_write_test");
        match fs::write(&probe, "test") {
            Ok(()) => {
                let _ = fs::remove_file(&probe);
            }
            Err(e) => {
                warn!("Write probe in {} failed: {}", path.display(), e);
                return Err(Error::FileSystem(FileSystemError::NotWritable(
                    path.to_path_buf(),
                )));
            }
        }
    } else {
        fs::create_dir_all(path).map_err(|e| {
            Error::Configuration(format!("Cannot create directory {}: {}", path.display(), e))
        })?;
    }

    Ok(())
}
