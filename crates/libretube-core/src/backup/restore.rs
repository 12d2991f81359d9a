//! Writing a structured backup back into the database and preferences.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use super::model::{BackupFile, PreferenceItem, PreferenceValue};
use crate::db::{Database, LocalPlaylist, LocalPlaylistItem, LocalPlaylistWithVideos};
use crate::error::Result;
use crate::keys;
use crate::preferences::PreferenceDataStore;

/// Component notified after preferences have been restored.
///
/// Implemented by jobs whose schedule depends on preference values.
pub trait RestoreHook: Send + Sync {
    /// Called once a restore has finished writing preferences.
    fn on_restored(&self);
}

/// Which preference keys survive a restore untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePolicy {
    /// Keys that are neither cleared nor overwritten.
    pub ignored_keys: HashSet<String>,
}

impl RestorePolicy {
    /// Overwrite every preference.
    #[must_use]
    pub fn overwrite_all() -> Self {
        Self {
            ignored_keys: HashSet::new(),
        }
    }

    /// Protect `keys` from the restore.
    #[must_use]
    pub fn ignoring<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` is protected.
    #[must_use]
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored_keys.contains(key)
    }
}

impl Default for RestorePolicy {
    /// Keeps the auto backup destination, which refers to a directory on
    /// this device rather than the one the backup came from.
    fn default() -> Self {
        Self::ignoring([keys::AUTO_BACKUP_PATH])
    }
}

/// Counts of what a restore wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    /// Watch history rows.
    pub watch_history: usize,
    /// Watch position rows.
    pub watch_positions: usize,
    /// Search history rows.
    pub search_history: usize,
    /// Subscription rows.
    pub subscriptions: usize,
    /// Custom instance rows.
    pub custom_instances: usize,
    /// Playlist bookmark rows.
    pub playlist_bookmarks: usize,
    /// Local playlists created.
    pub local_playlists: usize,
    /// Local playlist videos inserted.
    pub local_playlist_videos: usize,
    /// Subscription group rows.
    pub groups: usize,
    /// Preferences written.
    pub preferences: usize,
    /// Preferences skipped (no key, ignored key, or undecodable value).
    pub preferences_skipped: usize,
}

/// Insert every table category of `file`. Absent categories count as empty.
pub fn restore_tables(db: &Database, file: &BackupFile, summary: &mut RestoreSummary) -> Result<()> {
    summary.watch_history = db.insert_watch_history(slice(&file.watch_history))?;
    summary.watch_positions = db.insert_watch_positions(slice(&file.watch_positions))?;
    summary.search_history = db.insert_search_history(slice(&file.search_history))?;
    summary.subscriptions = db.insert_local_subscriptions(slice(&file.subscriptions))?;
    summary.custom_instances = db.insert_custom_instances(slice(&file.custom_instances))?;
    summary.playlist_bookmarks = db.insert_playlist_bookmarks(slice(&file.playlist_bookmarks))?;
    summary.groups = db.insert_subscription_groups(slice(&file.groups))?;

    for playlist in slice(&file.local_playlists) {
        summary.local_playlist_videos += restore_local_playlist(db, playlist)?;
        summary.local_playlists += 1;
    }
    Ok(())
}

/// Recreate one local playlist under a fresh ID and return how many videos
/// were inserted.
pub fn restore_local_playlist(db: &Database, playlist: &LocalPlaylistWithVideos) -> Result<usize> {
    let header = LocalPlaylist {
        id: 0,
        ..playlist.playlist.clone()
    };
    let new_id = db.create_local_playlist(&header)?;
    debug!(
        "Restoring playlist '{}' (backup id {}) as id {}",
        header.name, playlist.playlist.id, new_id
    );

    for video in &playlist.videos {
        db.add_local_playlist_item(&LocalPlaylistItem {
            id: 0,
            playlist_id: new_id,
            ..video.clone()
        })?;
    }
    Ok(playlist.videos.len())
}

/// Reapply backed-up preferences to `prefs`.
///
/// Every key except the ignored ones is cleared first. Items without a key,
/// with an ignored key or with a value that cannot be decoded are skipped.
pub fn restore_preferences(
    prefs: &PreferenceDataStore,
    items: &[PreferenceItem],
    policy: &RestorePolicy,
    summary: &mut RestoreSummary,
) {
    prefs.clear_except(&policy.ignored_keys);

    for item in items {
        let Some(key) = item.key.as_deref() else {
            summary.preferences_skipped += 1;
            continue;
        };
        if policy.is_ignored(key) {
            summary.preferences_skipped += 1;
            continue;
        }
        let Some(value) = PreferenceValue::decode(key, &item.value) else {
            debug!("Skipping preference {} with value {}", key, item.value);
            summary.preferences_skipped += 1;
            continue;
        };

        match value {
            PreferenceValue::Boolean(b) => prefs.put_boolean(key, b),
            PreferenceValue::Int(i) => prefs.put_int(key, i),
            PreferenceValue::Long(l) => prefs.put_long(key, l),
            PreferenceValue::Float(f) => prefs.put_float(key, f),
            PreferenceValue::String(s) => prefs.put_string(key, Some(s.as_str())),
            PreferenceValue::StringSet(set) => prefs.put_string_set(key, Some(set)),
        }
        summary.preferences += 1;
    }

    info!(
        "Restored {} preferences ({} skipped)",
        summary.preferences, summary.preferences_skipped
    );
}

fn slice<T>(items: &Option<Vec<T>>) -> &[T] {
    items.as_deref().unwrap_or_default()
}
