//! Error types for LibreTube core operations.
//!
//! Errors are grouped by domain. Every domain error converts into the
//! crate-wide [`Error`], and [`Error::kind`] folds them into the coarse
//! categories callers use to decide how to surface a failure (a clean
//! "disabled" result, a retryable I/O failure, a corrupted-file message, …).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Feature disabled or required setting missing.
    Configuration,
    /// File or directory access failed.
    Io,
    /// Input could not be decoded (malformed JSON, unexpected header).
    Decode,
    /// Remote API unreachable or returned an unexpected response.
    Network,
    /// The local SQLite store failed.
    Database,
}

/// File system errors.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Reading a file or directory failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Writing a file failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Creating a directory failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Deleting a file failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path that could not be deleted.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Copying a file failed.
    #[error("Failed to copy {source_path} to {destination}: {reason}")]
    CopyFailed {
        /// Source file.
        source_path: PathBuf,
        /// Destination file.
        destination: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A directory that must exist does not.
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// A directory is not writable.
    #[error("Directory is not writable: {0}")]
    NotWritable(PathBuf),
}

/// Local database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLite reported an error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database file does not exist.
    #[error("Database file not found: {0}")]
    FileNotFound(PathBuf),

    /// A stored value could not be mapped to its entity.
    #[error("Invalid row in {table}: {reason}")]
    InvalidRow {
        /// Table name.
        table: &'static str,
        /// What was wrong.
        reason: String,
    },
}

/// Backup and restore errors.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The backup file is not a valid backup document.
    #[error("Backup file is corrupted: {0}")]
    Corrupted(String),

    /// Auto backup is enabled but no destination directory is configured.
    #[error("Auto backup path is not set")]
    PathNotSet,

    /// Gathering data for a backup failed.
    #[error("Failed to create backup data: {0}")]
    CollectFailed(String),
}

/// Download enqueue errors.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The playlist itself could not be fetched.
    #[error("Failed to fetch playlist {playlist_id}: {reason}")]
    PlaylistFetchFailed {
        /// Playlist ID.
        playlist_id: String,
        /// Underlying reason.
        reason: String,
    },

    /// A continuation page could not be fetched after all retry attempts.
    #[error("Failed to fetch next page of playlist {playlist_id} after {attempts} attempts")]
    PageFetchFailed {
        /// Playlist ID.
        playlist_id: String,
        /// Attempts made.
        attempts: u32,
    },

    /// A stream URL did not contain a video ID.
    #[error("Invalid stream URL: {0}")]
    InvalidStreamUrl(String),

    /// The download executor rejected a request.
    #[error("Download submission failed: {0}")]
    SubmitFailed(String),
}

/// Update check errors.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The release feed returned a non-success status.
    #[error("Release feed returned status {0}")]
    BadStatus(u16),

    /// The release feed could not be parsed.
    #[error("Invalid release metadata: {0}")]
    InvalidMetadata(String),
}

/// Errors that can occur in LibreTube core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File system error.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Database error.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Backup error.
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// Download error.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Update error.
    #[error(transparent)]
    Update(#[from] UpdateError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// A background task failed to complete.
    #[error("Background task failed: {0}")]
    Task(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a network error.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a corrupted-backup error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Backup(BackupError::Corrupted(message.into()))
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::FileSystem(_) | Self::Io(_) | Self::Task(_) => ErrorKind::Io,
            Self::Database(_) => ErrorKind::Database,
            Self::Backup(BackupError::Corrupted(_)) | Self::Serialization(_) => ErrorKind::Decode,
            Self::Backup(BackupError::PathNotSet) | Self::Configuration(_) => {
                ErrorKind::Configuration
            }
            Self::Backup(BackupError::CollectFailed(_)) => ErrorKind::Database,
            Self::Download(_) | Self::Update(_) | Self::Network(_) => ErrorKind::Network,
        }
    }

    /// Whether a background job hitting this error should be retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Io | ErrorKind::Network | ErrorKind::Database
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config_error("missing path");
        assert_eq!(err.to_string(), "Configuration error: missing path");
    }

    #[test]
    fn test_file_system_error_display() {
        let err = Error::FileSystem(FileSystemError::WriteFailed {
            path: PathBuf::from("/test/path"),
            reason: "permission denied".to_string(),
        });
        assert!(err.to_string().contains("/test/path"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_json_error_is_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_corrupted_backup_kind() {
        let err = Error::corrupted("unexpected token");
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("corrupted"));
    }

    #[test]
    fn test_path_not_set_is_configuration() {
        let err: Error = BackupError::PathNotSet.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_page_fetch_failed_display() {
        let err: Error = DownloadError::PageFetchFailed {
            playlist_id: "PL123".to_string(),
            attempts: 2,
        }
        .into();
        assert!(err.to_string().contains("PL123"));
        assert!(err.to_string().contains("2 attempts"));
        assert!(err.is_retryable());
    }
}
