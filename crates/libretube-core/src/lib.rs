//! LibreTube Core Library
//!
//! Data management for the LibreTube client:
//! - Typed preferences served from memory and persisted to SQLite in the background
//! - Structured JSON backups (export, restore) and raw database copies
//! - Scheduled auto backups with retention pruning
//! - Enqueueing whole playlists for download
//! - Checking for and downloading newer builds
//! - A persistent log file
//!
//! # Error Handling
//!
//! Fallible operations return [`Result`], whose [`Error`] carries a typed
//! sub-error per domain. See the [`error`] module for details.
//!
//! ```rust,ignore
//! use libretube_core::{BackupManager, BackupOption, Result};
//!
//! async fn export(backups: &BackupManager) -> Result<()> {
//!     let dir = std::path::Path::new("/backups");
//!     let path = backups.export_to_dir(&BackupOption::ALL, dir).await?;
//!     println!("wrote {}", path.display());
//!     Ok(())
//! }
//! ```

pub mod autobackup;
pub mod backup;
pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod keys;
pub mod logging;
pub mod preferences;
pub mod retry;
pub mod update;

pub use autobackup::{
    AUTO_BACKUP_PREFIX, AUTO_BACKUP_WORK_NAME, AutoBackupScheduler, AutoBackupSettings,
    AutoBackupWorker, Job, JobOutcome, JobScheduler, prune_old_backups,
};
pub use backup::{
    BackupFile, BackupManager, BackupOption, PreferenceItem, PreferenceValue, RestoreHook,
    RestoreOutcome, RestorePolicy, RestoreSummary, is_sqlite_database, read_backup_file,
};
pub use config::AppConfig;
pub use db::Database;
pub use download::{
    DownloadQueue, DownloadRequest, DownloadSink, EnqueueProgress, EnqueueRequest,
    EnqueueSummary, MediaService, PipedClient, PlaylistDownloadEnqueuer, PlaylistType,
};
pub use error::{
    BackupError, DatabaseError, DownloadError, Error, ErrorKind, FileSystemError, Result,
    UpdateError,
};
pub use logging::{LogFile, LoggingConfig, LoggingError, LoggingGuard};
pub use preferences::{PreferenceDataStore, SettingsStore, SqliteSettingsStore};
pub use retry::RetryPolicy;
pub use update::{
    GithubReleases, ReleaseSource, UpdateChannel, UpdateChecker, UpdateInfo, UpdateManager,
    UpdateStatus,
};
