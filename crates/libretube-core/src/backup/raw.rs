//! Byte-level export and import of the database file.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::{error, info};

use crate::db::{Database, copy_file};
use crate::error::{DatabaseError, FileSystemError, Result};

/// Header every SQLite 3 database file starts with.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Whether `bytes` begin with the SQLite file signature.
#[must_use]
pub fn is_sqlite_database(bytes: &[u8]) -> bool {
    bytes.starts_with(SQLITE_HEADER)
}

/// Read the first bytes of `path` and check them for the SQLite signature.
///
/// Files shorter than the signature are not databases.
pub fn sniff_file(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| FileSystemError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut header = [0_u8; SQLITE_HEADER.len()];
    match file.read_exact(&mut header) {
        Ok(()) => Ok(is_sqlite_database(&header)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(FileSystemError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()),
    }
}

/// Copy the database file to `dest`.
///
/// The WAL is checkpointed first so the main file holds every committed
/// change. Returns `false` (after logging) when anything fails.
pub fn export_database(db: &Database, dest: &Path) -> bool {
    match try_export(db, dest) {
        Ok(bytes) => {
            info!(
                "Exported database ({} bytes) to {}",
                bytes,
                dest.display()
            );
            true
        }
        Err(e) => {
            error!("Database export to {} failed: {}", dest.display(), e);
            false
        }
    }
}

fn try_export(db: &Database, dest: &Path) -> Result<u64> {
    db.checkpoint()?;
    let source = db.path();
    if !source.exists() {
        return Err(DatabaseError::FileNotFound(source.to_path_buf()).into());
    }
    copy_file(source, dest)
}

/// Replace the database file with the bytes of `src`.
///
/// See [`Database::replace_with`]: the handle stays closed until the copy and
/// the WAL/SHM cleanup are done. Returns `false` (after logging) when
/// anything fails.
pub fn import_database(db: &Database, src: &Path) -> bool {
    match db.replace_with(src) {
        Ok(bytes) => {
            info!(
                "Imported database ({} bytes) from {}",
                bytes,
                src.display()
            );
            true
        }
        Err(e) => {
            error!("Database import from {} failed: {}", src.display(), e);
            false
        }
    }
}
