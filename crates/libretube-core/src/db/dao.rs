//! Table accessors for [`Database`].

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{
    AppSetting, CustomInstance, DownloadPlaylist, DownloadPlaylistVideo, LocalPlaylist,
    LocalPlaylistItem, LocalPlaylistWithVideos, LocalSubscription, PlaylistBookmark,
    SearchHistoryItem, SubscriptionGroup, WatchHistoryItem, WatchPosition,
};
use crate::db::models::Download;
use crate::error::{DatabaseError, Result};

impl Database {
    // ---------------------------------------------------------------------
    // App settings
    // ---------------------------------------------------------------------

    /// All persisted settings.
    pub fn all_settings(&self) -> Result<Vec<AppSetting>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM app_setting")?;
            let rows = stmt
                .query_map([], AppSetting::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace a setting.
    pub fn upsert_setting(&self, setting: &AppSetting) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO app_setting (key, value) VALUES (?1, ?2)",
                params![setting.key, setting.value],
            )?;
            Ok(())
        })
    }

    /// Delete a setting by key.
    pub fn delete_setting(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM app_setting WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    /// Delete every setting.
    pub fn delete_all_settings(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM app_setting", [])?;
            Ok(())
        })
    }

    // ---------------------------------------------------------------------
    // History
    // ---------------------------------------------------------------------

    /// All watch history entries.
    pub fn watch_history(&self) -> Result<Vec<WatchHistoryItem>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT video_id, title, upload_date, uploader, uploader_url, uploader_avatar,
                        thumbnail_url, duration
                 FROM watch_history",
            )?;
            let rows = stmt
                .query_map([], WatchHistoryItem::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace watch history entries.
    pub fn insert_watch_history(&self, items: &[WatchHistoryItem]) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO watch_history (
                       video_id, title, upload_date, uploader, uploader_url, uploader_avatar,
                       thumbnail_url, duration
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for item in items {
                    stmt.execute(params![
                        item.video_id,
                        item.title,
                        item.upload_date,
                        item.uploader,
                        item.uploader_url,
                        item.uploader_avatar,
                        item.thumbnail_url,
                        item.duration,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(items.len())
        })
    }

    /// All saved watch positions.
    pub fn watch_positions(&self) -> Result<Vec<WatchPosition>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT video_id, position FROM watch_position")?;
            let rows = stmt
                .query_map([], WatchPosition::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace watch positions.
    pub fn insert_watch_positions(&self, items: &[WatchPosition]) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO watch_position (video_id, position) VALUES (?1, ?2)",
                )?;
                for item in items {
                    stmt.execute(params![item.video_id, item.position])?;
                }
            }
            tx.commit()?;
            Ok(items.len())
        })
    }

    /// All search queries.
    pub fn search_history(&self) -> Result<Vec<SearchHistoryItem>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT query FROM search_history")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(SearchHistoryItem {
                        query: row.get("query")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert search queries, replacing duplicates.
    pub fn insert_search_history(&self, items: &[SearchHistoryItem]) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT OR REPLACE INTO search_history (query) VALUES (?1)")?;
                for item in items {
                    stmt.execute(params![item.query])?;
                }
            }
            tx.commit()?;
            Ok(items.len())
        })
    }

    // ---------------------------------------------------------------------
    // Subscriptions, instances, bookmarks, groups
    // ---------------------------------------------------------------------

    /// All local subscriptions.
    pub fn local_subscriptions(&self) -> Result<Vec<LocalSubscription>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT channel_id, name, avatar, verified FROM local_subscription")?;
            let rows = stmt
                .query_map([], LocalSubscription::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace local subscriptions.
    pub fn insert_local_subscriptions(&self, items: &[LocalSubscription]) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO local_subscription (channel_id, name, avatar, verified)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for item in items {
                    stmt.execute(params![item.channel_id, item.name, item.avatar, item.verified])?;
                }
            }
            tx.commit()?;
            Ok(items.len())
        })
    }

    /// All custom instances.
    pub fn custom_instances(&self) -> Result<Vec<CustomInstance>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT name, api_url, frontend_url FROM custom_instance")?;
            let rows = stmt
                .query_map([], CustomInstance::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace custom instances.
    pub fn insert_custom_instances(&self, items: &[CustomInstance]) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO custom_instance (name, api_url, frontend_url)
                     VALUES (?1, ?2, ?3)",
                )?;
                for item in items {
                    stmt.execute(params![item.name, item.api_url, item.frontend_url])?;
                }
            }
            tx.commit()?;
            Ok(items.len())
        })
    }

    /// All playlist bookmarks.
    pub fn playlist_bookmarks(&self) -> Result<Vec<PlaylistBookmark>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT playlist_id, playlist_name, thumbnail_url, uploader_name, uploader_url,
                        uploader_avatar, video_count
                 FROM playlist_bookmark",
            )?;
            let rows = stmt
                .query_map([], PlaylistBookmark::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace playlist bookmarks.
    pub fn insert_playlist_bookmarks(&self, items: &[PlaylistBookmark]) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO playlist_bookmark (
                       playlist_id, playlist_name, thumbnail_url, uploader_name, uploader_url,
                       uploader_avatar, video_count
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for item in items {
                    stmt.execute(params![
                        item.playlist_id,
                        item.playlist_name,
                        item.thumbnail_url,
                        item.uploader_name,
                        item.uploader_url,
                        item.uploader_avatar,
                        item.video_count,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(items.len())
        })
    }

    /// All subscription groups, ordered by their index.
    pub fn subscription_groups(&self) -> Result<Vec<SubscriptionGroup>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, channels, sort_index FROM subscription_group ORDER BY sort_index",
            )?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>("name")?,
                        row.get::<_, String>("channels")?,
                        row.get::<_, i64>("sort_index")?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            raw.into_iter()
                .map(|(name, channels, index)| -> Result<SubscriptionGroup> {
                    let channels = serde_json::from_str(&channels).map_err(|e| {
                        DatabaseError::InvalidRow {
                            table: "subscription_group",
                            reason: format!("channels of {name}: {e}"),
                        }
                    })?;
                    Ok(SubscriptionGroup {
                        name,
                        channels,
                        index,
                    })
                })
                .collect()
        })
    }

    /// Insert or replace subscription groups.
    pub fn insert_subscription_groups(&self, items: &[SubscriptionGroup]) -> Result<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO subscription_group (name, channels, sort_index)
                     VALUES (?1, ?2, ?3)",
                )?;
                for item in items {
                    let channels = serde_json::to_string(&item.channels)?;
                    stmt.execute(params![item.name, channels, item.index])?;
                }
            }
            tx.commit()?;
            Ok(items.len())
        })
    }

    // ---------------------------------------------------------------------
    // Local playlists
    // ---------------------------------------------------------------------

    /// Insert a playlist header and return its ID.
    ///
    /// An `id` of `0` lets SQLite assign a fresh one.
    pub fn create_local_playlist(&self, playlist: &LocalPlaylist) -> Result<i64> {
        self.with_connection(|conn| {
            let id = (playlist.id != 0).then_some(playlist.id);
            conn.execute(
                "INSERT INTO local_playlist (id, name, thumbnail_url, description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, playlist.name, playlist.thumbnail_url, playlist.description],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Append a video to a local playlist and return the item ID.
    pub fn add_local_playlist_item(&self, item: &LocalPlaylistItem) -> Result<i64> {
        self.with_connection(|conn| {
            let id = (item.id != 0).then_some(item.id);
            conn.execute(
                "INSERT INTO local_playlist_item (
                   id, playlist_id, video_id, title, upload_date, uploader, uploader_url,
                   uploader_avatar, thumbnail_url, duration
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    item.playlist_id,
                    item.video_id,
                    item.title,
                    item.upload_date,
                    item.uploader,
                    item.uploader_url,
                    item.uploader_avatar,
                    item.thumbnail_url,
                    item.duration,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// A single local playlist with its videos.
    pub fn local_playlist(&self, id: i64) -> Result<Option<LocalPlaylistWithVideos>> {
        self.with_connection(|conn| {
            let playlist = conn
                .query_row(
                    "SELECT id, name, thumbnail_url, description FROM local_playlist WHERE id = ?1",
                    params![id],
                    LocalPlaylist::from_row,
                )
                .optional()?;
            let Some(playlist) = playlist else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT id, playlist_id, video_id, title, upload_date, uploader, uploader_url,
                        uploader_avatar, thumbnail_url, duration
                 FROM local_playlist_item WHERE playlist_id = ?1 ORDER BY id",
            )?;
            let videos = stmt
                .query_map(params![id], LocalPlaylistItem::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(Some(LocalPlaylistWithVideos { playlist, videos }))
        })
    }

    /// All local playlists with their videos, in creation order.
    pub fn local_playlists_with_videos(&self) -> Result<Vec<LocalPlaylistWithVideos>> {
        let ids = self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM local_playlist ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })?;

        let mut playlists = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(playlist) = self.local_playlist(id)? {
                playlists.push(playlist);
            }
        }
        Ok(playlists)
    }

    // ---------------------------------------------------------------------
    // Downloads
    // ---------------------------------------------------------------------

    /// Whether a video has already been downloaded.
    pub fn download_exists(&self, video_id: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM download WHERE video_id = ?1)",
                params![video_id],
                |row| row.get::<_, bool>(0),
            )?;
            Ok(exists)
        })
    }

    /// Record a downloaded video.
    pub fn insert_download(&self, download: &Download) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO download (video_id, title, uploader, duration, thumbnail_path)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    download.video_id,
                    download.title,
                    download.uploader,
                    download.duration,
                    download.thumbnail_path,
                ],
            )?;
            Ok(())
        })
    }

    /// Record a downloaded public playlist.
    pub fn insert_download_playlist(&self, playlist: &DownloadPlaylist) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO download_playlist (playlist_id, title, description, thumbnail_path)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    playlist.playlist_id,
                    playlist.title,
                    playlist.description,
                    playlist.thumbnail_path,
                ],
            )?;
            Ok(())
        })
    }

    /// A downloaded playlist by ID.
    pub fn download_playlist(&self, playlist_id: &str) -> Result<Option<DownloadPlaylist>> {
        self.with_connection(|conn| {
            let playlist = conn
                .query_row(
                    "SELECT playlist_id, title, description, thumbnail_path
                     FROM download_playlist WHERE playlist_id = ?1",
                    params![playlist_id],
                    DownloadPlaylist::from_row,
                )
                .optional()?;
            Ok(playlist)
        })
    }

    /// Link a video to a downloaded playlist.
    pub fn insert_playlist_video_connection(&self, link: &DownloadPlaylistVideo) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO download_playlist_video (playlist_id, video_id)
                 VALUES (?1, ?2)",
                params![link.playlist_id, link.video_id],
            )?;
            Ok(())
        })
    }

    /// Video IDs linked to a downloaded playlist.
    pub fn playlist_video_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT video_id FROM download_playlist_video WHERE playlist_id = ?1 ORDER BY video_id",
            )?;
            let ids = stmt
                .query_map(params![playlist_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }
}
