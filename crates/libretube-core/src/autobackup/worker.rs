//! The auto backup job body.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use super::retention::prune_old_backups;
use super::scheduler::{Job, JobOutcome};
use super::{AUTO_BACKUP_PREFIX, AutoBackupSettings};
use crate::backup::{BackupManager, BackupOption, backup_file_name};
use crate::error::{BackupError, Error, FileSystemError, Result};

/// Writes a full backup into the configured directory and prunes old ones.
#[derive(Debug, Clone)]
pub struct AutoBackupWorker {
    backups: Arc<BackupManager>,
}

impl AutoBackupWorker {
    /// Create a worker backed by `backups`.
    pub const fn new(backups: Arc<BackupManager>) -> Self {
        Self { backups }
    }

    /// Run once and report the outcome.
    ///
    /// * disabled: [`JobOutcome::Success`] without writing anything
    /// * no usable destination or write failure: [`JobOutcome::Failure`]
    /// * data could not be gathered: [`JobOutcome::Retry`]
    pub async fn run_at(&self, now: DateTime<Local>) -> JobOutcome {
        match self.perform(now).await {
            Ok(Some(path)) => {
                info!("Auto backup written to {}", path.display());
                JobOutcome::Success
            }
            Ok(None) => {
                info!("Auto backup is disabled, nothing to do");
                JobOutcome::Success
            }
            Err(Error::Backup(BackupError::CollectFailed(reason))) => {
                warn!("Auto backup could not gather data: {}", reason);
                JobOutcome::Retry
            }
            Err(e) => {
                error!("Auto backup failed: {}", e);
                JobOutcome::Failure
            }
        }
    }

    /// Write the backup if enabled and return its path.
    pub async fn perform(&self, now: DateTime<Local>) -> Result<Option<PathBuf>> {
        let prefs = self.backups.preferences();
        prefs
            .initialize()
            .await
            .map_err(|e| BackupError::CollectFailed(e.to_string()))?;

        let settings = AutoBackupSettings::load(prefs, now.time());
        if !settings.enabled {
            return Ok(None);
        }
        let dir = settings.path.ok_or(BackupError::PathNotSet)?;
        if !dir.is_dir() {
            return Err(FileSystemError::DirectoryNotFound(dir).into());
        }

        let file = self.backups.create_backup(&BackupOption::ALL).await?;
        let path = dir.join(backup_file_name(AUTO_BACKUP_PREFIX, &now));
        BackupManager::write_backup(&file, &path).await?;

        let keep = settings.max_keep;
        let prune_dir = dir.clone();
        match tokio::task::spawn_blocking(move || prune_old_backups(&prune_dir, keep)).await {
            Ok(Ok(deleted)) if !deleted.is_empty() => {
                info!("Pruned {} old auto backups", deleted.len());
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to prune old backups in {}: {}", dir.display(), e),
            Err(e) => warn!("Prune task failed: {}", e),
        }
        Ok(Some(path))
    }
}

#[async_trait]
impl Job for AutoBackupWorker {
    async fn run(&self) -> JobOutcome {
        self.run_at(Local::now()).await
    }
}
