//! Deleting auto backups beyond the retention count.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{FileSystemError, Result};

use super::AUTO_BACKUP_PREFIX;

/// Auto backup files in `dir`, newest first.
///
/// Only regular files named `libretube-autobackup-*.json` are listed. The
/// timestamp in the name sorts chronologically, so name order is age order.
pub fn list_auto_backups(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| FileSystemError::ReadFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut backups: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| is_auto_backup_name(path))
        .collect();
    backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(backups)
}

/// Delete all but the `keep` newest auto backups in `dir`.
///
/// Returns the deleted paths. A file that cannot be deleted is logged and
/// left in place.
pub fn prune_old_backups(dir: &Path, keep: usize) -> Result<Vec<PathBuf>> {
    let backups = list_auto_backups(dir)?;
    debug!(
        "Found {} auto backups in {}, keeping {}",
        backups.len(),
        dir.display(),
        keep
    );

    let mut deleted = Vec::new();
    for path in backups.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted old backup {}", path.display());
                deleted.push(path);
            }
            Err(e) => warn!("Failed to delete old backup {}: {}", path.display(), e),
        }
    }
    Ok(deleted)
}

fn is_auto_backup_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(AUTO_BACKUP_PREFIX) && name.ends_with(".json"))
}
