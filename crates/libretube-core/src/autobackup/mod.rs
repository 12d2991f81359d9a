//! Scheduled, unattended backups with retention pruning.
//!
//! The settings live in the preference store under the `auto_backup_*`
//! keys. [`AutoBackupScheduler::reschedule`] reads them and (re)places the
//! single `auto_backup_work` job; it is also registered as a restore hook so
//! a restored backup takes effect without restarting.

mod retention;
mod schedule;
mod scheduler;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use tracing::{debug, info};

use crate::backup::RestoreHook;
use crate::keys;
use crate::preferences::PreferenceDataStore;

pub use retention::{list_auto_backups, prune_old_backups};
pub use schedule::{DAILY, format_time_of_day, initial_delay, next_trigger, parse_time_of_day};
pub use scheduler::{Job, JobOutcome, JobScheduler};
pub use worker::AutoBackupWorker;

/// File name prefix of auto backups.
pub const AUTO_BACKUP_PREFIX: &str = "libretube-autobackup-";

/// Name of the job slot holding the auto backup.
pub const AUTO_BACKUP_WORK_NAME: &str = "auto_backup_work";

/// Hours between backups when unset or invalid.
pub const DEFAULT_INTERVAL_HOURS: u64 = 24;

/// Longest accepted interval between backups (one year).
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

/// Backups kept when unset or invalid.
pub const DEFAULT_MAX_KEEP: usize = 25;

/// Auto backup settings as read from preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoBackupSettings {
    /// Whether auto backup runs at all.
    pub enabled: bool,
    /// Destination directory.
    pub path: Option<PathBuf>,
    /// Preferred time of day for daily runs.
    pub time: NaiveTime,
    /// Time between runs.
    pub interval: Duration,
    /// Number of backup files to keep.
    pub max_keep: usize,
}

impl AutoBackupSettings {
    /// Read the settings, using `now` when no preferred time is stored.
    pub fn load(prefs: &PreferenceDataStore, now: NaiveTime) -> Self {
        let time = prefs
            .get_optional_string(keys::AUTO_BACKUP_TIME)
            .and_then(|value| parse_time_of_day(&value))
            .unwrap_or(now);

        let hours = u64::try_from(prefs.get_long(keys::AUTO_BACKUP_INTERVAL, 0))
            .ok()
            .filter(|hours| (1..=MAX_INTERVAL_HOURS).contains(hours))
            .unwrap_or(DEFAULT_INTERVAL_HOURS);

        let max_keep = usize::try_from(prefs.get_long(keys::AUTO_BACKUP_MAX_KEEP, 0))
            .ok()
            .filter(|keep| *keep >= 1)
            .unwrap_or(DEFAULT_MAX_KEEP);

        Self {
            enabled: prefs.get_boolean(keys::AUTO_BACKUP_ENABLED, false),
            path: prefs
                .get_optional_string(keys::AUTO_BACKUP_PATH)
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            time,
            interval: Duration::from_secs(hours.saturating_mul(60 * 60)),
            max_keep,
        }
    }

    /// Whether the job should be scheduled at all.
    pub const fn is_active(&self) -> bool {
        self.enabled && self.path.is_some()
    }
}

/// Keeps the auto backup job in line with the current settings.
#[derive(Debug)]
pub struct AutoBackupScheduler {
    scheduler: JobScheduler,
    prefs: Arc<PreferenceDataStore>,
    worker: Arc<AutoBackupWorker>,
}

impl AutoBackupScheduler {
    /// Create a scheduler for `worker`, reading settings from `prefs`.
    pub fn new(
        scheduler: JobScheduler,
        prefs: Arc<PreferenceDataStore>,
        worker: Arc<AutoBackupWorker>,
    ) -> Self {
        Self {
            scheduler,
            prefs,
            worker,
        }
    }

    /// Replace the scheduled job according to the current settings.
    ///
    /// The job is cancelled when auto backup is disabled or has no
    /// destination. Returns whether a job is scheduled afterwards.
    pub fn reschedule(&self) -> bool {
        let now = Local::now().naive_local();
        let settings = AutoBackupSettings::load(&self.prefs, now.time());

        if !settings.is_active() {
            if self.scheduler.cancel(AUTO_BACKUP_WORK_NAME) {
                info!("Auto backup disabled, job cancelled");
            } else {
                debug!("Auto backup disabled, nothing scheduled");
            }
            return false;
        }

        let delay = initial_delay(now, settings.time, settings.interval);
        let job: Arc<dyn Job> = self.worker.clone();
        self.scheduler
            .schedule_periodic(AUTO_BACKUP_WORK_NAME, job, delay, settings.interval);
        true
    }

    /// Stop the auto backup job.
    pub fn cancel(&self) -> bool {
        self.scheduler.cancel(AUTO_BACKUP_WORK_NAME)
    }

    /// Whether the auto backup job is scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_scheduled(AUTO_BACKUP_WORK_NAME)
    }

    /// Run the backup immediately, outside the schedule.
    pub async fn backup_now(&self) -> JobOutcome {
        self.scheduler.run_now(self.worker.as_ref()).await
    }
}

impl RestoreHook for AutoBackupScheduler {
    fn on_restored(&self) {
        info!("Preferences restored, rescheduling auto backup");
        self.reschedule();
    }
}
