//! Structured backups and raw database copies.
//!
//! [`BackupManager`] is the entry point: it collects selected categories into
//! a [`BackupFile`], writes it atomically, restores it back, and routes a
//! user-picked file to either the JSON restore or the raw database import
//! depending on its header.

mod export;
mod model;
pub mod raw;
mod restore;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::{DateTime, TimeZone};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::{BackupError, Error, FileSystemError, Result};
use crate::preferences::PreferenceDataStore;

pub use export::{BackupOption, collect_backup};
pub use model::{
    BackupFile, PipedImportPlaylist, PreferenceItem, PreferenceValue, YOUTUBE_FRONTEND_URL,
};
pub use raw::{SQLITE_HEADER, is_sqlite_database};
pub use restore::{
    RestoreHook, RestorePolicy, RestoreSummary, restore_local_playlist, restore_preferences,
    restore_tables,
};

/// File name prefix of manual backups.
pub const MANUAL_BACKUP_PREFIX: &str = "libretube-backup-";

/// Timestamp format used in backup file names. Contains no `:` so the names
/// are valid on every filesystem.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Build `<prefix><timestamp>.json`.
#[must_use]
pub fn backup_file_name<Tz>(prefix: &str, time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{prefix}{}.json", time.format(BACKUP_TIMESTAMP_FORMAT))
}

/// Serialize `value` as JSON into `path` without ever leaving a partial file.
///
/// The document is written to a temporary file next to `path` and renamed
/// over it once fully flushed. On failure the temporary file is removed.
pub fn write_json_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let write_failed = |reason: String| FileSystemError::WriteFailed {
        path: path.to_path_buf(),
        reason,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".libretube-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| write_failed(e.to_string()))?;
    serde_json::to_writer(temp.as_file_mut(), value)?;
    temp.as_file()
        .sync_all()
        .map_err(|e| write_failed(e.to_string()))?;
    temp.persist(path)
        .map_err(|e| write_failed(e.error.to_string()))?;
    Ok(())
}

/// Result of restoring a user-picked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The file was a SQLite database and replaced the local one.
    Database,
    /// The file was a JSON backup.
    Structured(RestoreSummary),
}

/// Creates and restores backups of the local data.
pub struct BackupManager {
    db: Arc<Database>,
    prefs: Arc<PreferenceDataStore>,
    hooks: RwLock<Vec<Weak<dyn RestoreHook>>>,
}

impl BackupManager {
    /// Create a manager over the shared database and preference store.
    pub fn new(db: Arc<Database>, prefs: Arc<PreferenceDataStore>) -> Self {
        Self {
            db,
            prefs,
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// The shared database.
    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// The shared preference store.
    #[must_use]
    pub fn preferences(&self) -> &Arc<PreferenceDataStore> {
        &self.prefs
    }

    /// Register a component to notify after every restore.
    ///
    /// Only a weak reference is kept; dropped hooks are skipped.
    pub fn register_restore_hook(&self, hook: &Arc<dyn RestoreHook>) {
        self.hooks.write().push(Arc::downgrade(hook));
    }

    /// Collect the selected categories into a backup document.
    pub async fn create_backup(&self, options: &[BackupOption]) -> Result<BackupFile> {
        let preferences = self.prefs.get_all();
        let options = options.to_vec();
        let db = Arc::clone(&self.db);

        let file = tokio::task::spawn_blocking(move || collect_backup(&db, &preferences, &options))
            .await
            .map_err(|e| BackupError::CollectFailed(e.to_string()))?
            .map_err(|e| BackupError::CollectFailed(e.to_string()))?;
        debug!("Created backup with {} categories", category_count(&file));
        Ok(file)
    }

    /// Write a backup document to `path`.
    pub async fn write_backup(file: &BackupFile, path: &Path) -> Result<()> {
        let json = serde_json::to_value(file)?;
        let path_buf = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_json_atomically(&path_buf, &json)).await??;
        info!("Wrote backup to {}", path.display());
        Ok(())
    }

    /// Collect the selected categories and write them to `path`.
    pub async fn export_to_file(&self, options: &[BackupOption], path: &Path) -> Result<()> {
        let file = self.create_backup(options).await?;
        Self::write_backup(&file, path).await
    }

    /// Collect the selected categories into a timestamp-named file inside
    /// `dir` and return its path.
    pub async fn export_to_dir(&self, options: &[BackupOption], dir: &Path) -> Result<PathBuf> {
        if !dir.is_dir() {
            return Err(FileSystemError::DirectoryNotFound(dir.to_path_buf()).into());
        }
        let path = dir.join(backup_file_name(MANUAL_BACKUP_PREFIX, &chrono::Local::now()));
        self.export_to_file(options, &path).await?;
        Ok(path)
    }

    /// Restore a decoded backup document.
    ///
    /// Table categories are inserted first, then preferences are reapplied
    /// according to `policy`, and finally every restore hook runs. Rows
    /// inserted before a failure stay in place.
    pub async fn restore_backup(
        &self,
        file: BackupFile,
        policy: &RestorePolicy,
    ) -> Result<RestoreSummary> {
        let file = Arc::new(file);
        let db = Arc::clone(&self.db);
        let tables = Arc::clone(&file);
        let mut summary = tokio::task::spawn_blocking(move || {
            let mut summary = RestoreSummary::default();
            restore_tables(&db, &tables, &mut summary).map(|()| summary)
        })
        .await??;

        if let Some(items) = &file.preferences {
            self.prefs.initialize().await?;
            restore_preferences(&self.prefs, items, policy, &mut summary);
            self.prefs.flush().await?;
        }

        self.notify_restored();
        info!("Restore finished: {:?}", summary);
        Ok(summary)
    }

    /// Decode the JSON backup at `path` and restore it.
    ///
    /// Nothing is written when the file cannot be decoded.
    pub async fn restore_from_file(
        &self,
        path: &Path,
        policy: &RestorePolicy,
    ) -> Result<RestoreSummary> {
        let file = read_backup_file(path).await?;
        self.restore_backup(file, policy).await
    }

    /// Restore `path`, importing it as a database if it carries the SQLite
    /// header and decoding it as a JSON backup otherwise.
    pub async fn restore_any(&self, path: &Path, policy: &RestorePolicy) -> Result<RestoreOutcome> {
        let sniff_path = path.to_path_buf();
        let is_database = tokio::task::spawn_blocking(move || raw::sniff_file(&sniff_path)).await??;

        if is_database {
            info!("{} is a database file, importing", path.display());
            if self.import_database(path).await {
                Ok(RestoreOutcome::Database)
            } else {
                Err(FileSystemError::CopyFailed {
                    source_path: path.to_path_buf(),
                    destination: self.db.path().to_path_buf(),
                    reason: "database import failed".to_string(),
                }
                .into())
            }
        } else {
            self.restore_from_file(path, policy)
                .await
                .map(RestoreOutcome::Structured)
        }
    }

    /// Copy the database file to `dest`. Returns `false` on failure.
    pub async fn export_database(&self, dest: &Path) -> bool {
        let db = Arc::clone(&self.db);
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || raw::export_database(&db, &dest))
            .await
            .unwrap_or_else(|e| {
                error!("Database export task failed: {}", e);
                false
            })
    }

    /// Replace the database file with `src`. Returns `false` on failure.
    ///
    /// On success the preference cache is reloaded from the new file and the
    /// restore hooks run.
    pub async fn import_database(&self, src: &Path) -> bool {
        self.prefs.flush().await.ok();
        let db = Arc::clone(&self.db);
        let src = src.to_path_buf();
        let imported = tokio::task::spawn_blocking(move || raw::import_database(&db, &src))
            .await
            .unwrap_or_else(|e| {
                error!("Database import task failed: {}", e);
                false
            });

        if imported {
            if let Err(e) = self.prefs.reload().await {
                warn!("Failed to reload preferences after import: {}", e);
            }
            self.notify_restored();
        }
        imported
    }

    fn notify_restored(&self) {
        let hooks: Vec<Arc<dyn RestoreHook>> =
            self.hooks.read().iter().filter_map(Weak::upgrade).collect();
        debug!("Running {} restore hooks", hooks.len());
        for hook in hooks {
            hook.on_restored();
        }
        self.hooks.write().retain(|hook| hook.strong_count() > 0);
    }
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager")
            .field("db", &self.db)
            .field("hooks", &self.hooks.read().len())
            .finish_non_exhaustive()
    }
}

/// Read and decode a JSON backup file.
pub async fn read_backup_file(path: &Path) -> Result<BackupFile> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FileSystemError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!("Backup {} is not valid: {}", path.display(), e);
        Error::corrupted(e.to_string())
    })
}

fn category_count(file: &BackupFile) -> usize {
    [
        file.watch_history.is_some(),
        file.watch_positions.is_some(),
        file.search_history.is_some(),
        file.subscriptions.is_some(),
        file.custom_instances.is_some(),
        file.playlist_bookmarks.is_some(),
        file.local_playlists.is_some(),
        file.groups.is_some(),
        file.preferences.is_some(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_backup_file_name() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 30)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap();
        assert_eq!(
            backup_file_name("libretube-autobackup-", &time),
            "libretube-autobackup-2024-03-09-07-05-30.json"
        );
    }

    #[test]
    fn test_atomic_write_replaces_target() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");
        fs::write(&path, "old").unwrap();

        write_json_atomically(&path, &serde_json::json!({"a": 1})).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"a":1}"#);

        let leftovers = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_atomic_write_into_missing_dir_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("out.json");
        let err = write_json_atomically(&path, &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::FileSystem(FileSystemError::WriteFailed { .. })));
        assert!(!path.exists());
    }
}
