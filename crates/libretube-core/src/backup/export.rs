//! Selecting and collecting data categories for a structured backup.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{BackupFile, PipedImportPlaylist, PreferenceItem};
use crate::db::Database;
use crate::error::Result;

/// A data category that can be included in a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupOption {
    /// Watch history.
    WatchHistory,
    /// Watch positions.
    WatchPositions,
    /// Search history.
    SearchHistory,
    /// Local subscriptions.
    LocalSubscriptions,
    /// Custom Piped instances.
    CustomInstances,
    /// Playlist bookmarks.
    PlaylistBookmarks,
    /// Local playlists, also exported in the Piped import format.
    LocalPlaylists,
    /// Subscription groups.
    SubscriptionGroups,
    /// Preferences.
    Preferences,
}

impl BackupOption {
    /// Every category, in backup dialog order.
    pub const ALL: [Self; 9] = [
        Self::WatchHistory,
        Self::WatchPositions,
        Self::SearchHistory,
        Self::LocalSubscriptions,
        Self::CustomInstances,
        Self::PlaylistBookmarks,
        Self::LocalPlaylists,
        Self::SubscriptionGroups,
        Self::Preferences,
    ];

    /// Stable name used on the command line and in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::WatchHistory => "watch_history",
            Self::WatchPositions => "watch_positions",
            Self::SearchHistory => "search_history",
            Self::LocalSubscriptions => "local_subscriptions",
            Self::CustomInstances => "custom_instances",
            Self::PlaylistBookmarks => "playlist_bookmarks",
            Self::LocalPlaylists => "local_playlists",
            Self::SubscriptionGroups => "subscription_groups",
            Self::Preferences => "preferences",
        }
    }

    /// Look up an option by its [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|option| option.name() == name)
    }

    /// Populate this option's field of `file`.
    ///
    /// `preferences` is the current preference snapshot; it is only read by
    /// [`BackupOption::Preferences`].
    pub fn apply(
        self,
        db: &Database,
        preferences: &BTreeMap<String, String>,
        file: &mut BackupFile,
    ) -> Result<()> {
        match self {
            Self::WatchHistory => file.watch_history = Some(db.watch_history()?),
            Self::WatchPositions => file.watch_positions = Some(db.watch_positions()?),
            Self::SearchHistory => file.search_history = Some(db.search_history()?),
            Self::LocalSubscriptions => file.subscriptions = Some(db.local_subscriptions()?),
            Self::CustomInstances => file.custom_instances = Some(db.custom_instances()?),
            Self::PlaylistBookmarks => file.playlist_bookmarks = Some(db.playlist_bookmarks()?),
            Self::LocalPlaylists => {
                let playlists = db.local_playlists_with_videos()?;
                file.playlists = Some(playlists.iter().map(PipedImportPlaylist::from_local).collect());
                file.local_playlists = Some(playlists);
            }
            Self::SubscriptionGroups => file.groups = Some(db.subscription_groups()?),
            Self::Preferences => {
                file.preferences = Some(
                    preferences
                        .iter()
                        .map(|(key, value)| PreferenceItem::from_stored(key, value))
                        .collect(),
                );
            }
        }
        debug!("Collected backup category {}", self);
        Ok(())
    }
}

impl fmt::Display for BackupOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build a backup containing exactly the selected categories.
pub fn collect_backup(
    db: &Database,
    preferences: &BTreeMap<String, String>,
    options: &[BackupOption],
) -> Result<BackupFile> {
    let mut file = BackupFile::default();
    for option in options {
        option.apply(db, preferences, &mut file)?;
    }
    Ok(file)
}
