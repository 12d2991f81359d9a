//! Local SQLite store.
//!
//! A [`Database`] owns a single SQLite file in WAL mode. The connection is
//! opened lazily: [`Database::close`] drops it (so the raw importer can
//! replace the file underneath) and the next access reopens it.

mod dao;
pub mod models;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{DatabaseError, FileSystemError, Result};

pub use models::{
    AppSetting, CustomInstance, Download, DownloadPlaylist, DownloadPlaylistVideo,
    LocalPlaylist, LocalPlaylistItem, LocalPlaylistWithVideos, LocalSubscription,
    PlaylistBookmark, SearchHistoryItem, SubscriptionGroup, WatchHistoryItem, WatchPosition,
};

/// File name of the database inside the data directory.
pub const DATABASE_NAME: &str = "LibreTubeDatabase";

const SCHEMA: &str = r"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS app_setting (
      key TEXT PRIMARY KEY NOT NULL,
      value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS watch_history (
      video_id TEXT PRIMARY KEY NOT NULL,
      title TEXT,
      upload_date TEXT,
      uploader TEXT,
      uploader_url TEXT,
      uploader_avatar TEXT,
      thumbnail_url TEXT,
      duration INTEGER
    );

    CREATE TABLE IF NOT EXISTS watch_position (
      video_id TEXT PRIMARY KEY NOT NULL,
      position INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS search_history (
      query TEXT PRIMARY KEY NOT NULL
    );

    CREATE TABLE IF NOT EXISTS local_subscription (
      channel_id TEXT PRIMARY KEY NOT NULL,
      name TEXT,
      avatar TEXT,
      verified INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS custom_instance (
      name TEXT PRIMARY KEY NOT NULL,
      api_url TEXT NOT NULL,
      frontend_url TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS playlist_bookmark (
      playlist_id TEXT PRIMARY KEY NOT NULL,
      playlist_name TEXT,
      thumbnail_url TEXT,
      uploader_name TEXT,
      uploader_url TEXT,
      uploader_avatar TEXT,
      video_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS local_playlist (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      thumbnail_url TEXT NOT NULL DEFAULT '',
      description TEXT
    );

    CREATE TABLE IF NOT EXISTS local_playlist_item (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      playlist_id INTEGER NOT NULL REFERENCES local_playlist(id) ON DELETE CASCADE,
      video_id TEXT NOT NULL,
      title TEXT,
      upload_date TEXT,
      uploader TEXT,
      uploader_url TEXT,
      uploader_avatar TEXT,
      thumbnail_url TEXT,
      duration INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_local_playlist_item_playlist
      ON local_playlist_item(playlist_id);

    CREATE TABLE IF NOT EXISTS subscription_group (
      name TEXT PRIMARY KEY NOT NULL,
      channels TEXT NOT NULL,
      sort_index INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS download (
      video_id TEXT PRIMARY KEY NOT NULL,
      title TEXT NOT NULL,
      uploader TEXT,
      duration INTEGER,
      thumbnail_path TEXT
    );

    CREATE TABLE IF NOT EXISTS download_playlist (
      playlist_id TEXT PRIMARY KEY NOT NULL,
      title TEXT NOT NULL,
      description TEXT,
      thumbnail_path TEXT
    );

    CREATE TABLE IF NOT EXISTS download_playlist_video (
      playlist_id TEXT NOT NULL,
      video_id TEXT NOT NULL,
      PRIMARY KEY (playlist_id, video_id)
    );
";

/// Handle to the local database file.
pub struct Database {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = open_connection(&path)?;
        info!("Opened database at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open the database named [`DATABASE_NAME`] inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Self::open(data_dir.join(DATABASE_NAME))
    }

    /// Path of the main database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the write-ahead-log sidecar.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        sidecar_path(&self.path, "-wal")
    }

    /// Path of the shared-memory sidecar.
    #[must_use]
    pub fn shm_path(&self) -> PathBuf {
        sidecar_path(&self.path, "-shm")
    }

    /// Whether a connection is currently open.
    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Close the connection. The next access reopens it.
    pub fn close(&self) {
        if self.conn.lock().take().is_some() {
            info!("Closed database {}", self.path.display());
        }
    }

    /// Force a full WAL checkpoint so the main file holds every commit.
    pub fn checkpoint(&self) -> Result<()> {
        self.with_connection(|conn| {
            let (busy, log, checkpointed): (i64, i64, i64) =
                conn.query_row("PRAGMA wal_checkpoint(FULL)", [], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
            debug!(
                "WAL checkpoint: busy={}, log={}, checkpointed={}",
                busy, log, checkpointed
            );
            Ok(())
        })
    }

    /// Overwrite the database file with the bytes of `src`.
    ///
    /// The connection lock is held, with the handle closed, across the copy
    /// and the removal of the `-wal`/`-shm` sidecars, so no caller can reopen
    /// a half-written file. The next access reopens it. Replacing the file
    /// with itself is a no-op.
    pub fn replace_with(&self, src: &Path) -> Result<u64> {
        if is_same_file(src, &self.path) {
            info!("{} is the live database, nothing to import", src.display());
            return Ok(0);
        }

        let mut guard = self.conn.lock();
        if guard.take().is_some() {
            info!("Closed database {}", self.path.display());
        }
        let bytes = copy_file(src, &self.path)?;
        for sidecar in [self.wal_path(), self.shm_path()] {
            match fs::remove_file(&sidecar) {
                Ok(()) => info!("Removed {}", sidecar.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", sidecar.display(), e),
            }
        }
        drop(guard);
        Ok(bytes)
    }

    /// Run `f` with the open connection, reopening it first if needed.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            debug!("Reopening database {}", self.path.display());
            *guard = Some(open_connection(&self.path)?);
        }
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(DatabaseError::FileNotFound(self.path.clone()).into()),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("Journal mode for {}: {}", path.display(), mode);
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Stream `source` into `destination` and sync it to disk.
pub(crate) fn copy_file(source: &Path, destination: &Path) -> Result<u64> {
    let copy_failed = |e: io::Error| FileSystemError::CopyFailed {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        reason: e.to_string(),
    };
    let mut reader = File::open(source).map_err(copy_failed)?;
    let mut writer = File::create(destination).map_err(copy_failed)?;
    let bytes = io::copy(&mut reader, &mut writer).map_err(copy_failed)?;
    writer.sync_all().map_err(copy_failed)?;
    Ok(bytes)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
