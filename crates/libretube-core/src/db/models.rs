//! Entities persisted in the local database.
//!
//! The same types are embedded in structured backups, so field names
//! serialize as camelCase and every field tolerates being absent.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A single persisted setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSetting {
    /// Setting name.
    pub key: String,
    /// Setting value, always stored as a string.
    pub value: String,
}

impl AppSetting {
    /// Create a new setting row.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
        })
    }
}

/// A watched video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchHistoryItem {
    /// Video ID.
    pub video_id: String,
    /// Video title.
    pub title: Option<String>,
    /// Upload date as reported by the API.
    pub upload_date: Option<String>,
    /// Channel name.
    pub uploader: Option<String>,
    /// Channel URL.
    pub uploader_url: Option<String>,
    /// Channel avatar URL.
    pub uploader_avatar: Option<String>,
    /// Thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Duration in seconds.
    pub duration: Option<i64>,
}

impl WatchHistoryItem {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            video_id: row.get("video_id")?,
            title: row.get("title")?,
            upload_date: row.get("upload_date")?,
            uploader: row.get("uploader")?,
            uploader_url: row.get("uploader_url")?,
            uploader_avatar: row.get("uploader_avatar")?,
            thumbnail_url: row.get("thumbnail_url")?,
            duration: row.get("duration")?,
        })
    }
}

/// Last playback position of a video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchPosition {
    /// Video ID.
    pub video_id: String,
    /// Position in milliseconds.
    pub position: i64,
}

impl WatchPosition {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            video_id: row.get("video_id")?,
            position: row.get("position")?,
        })
    }
}

/// A past search query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHistoryItem {
    /// The query text.
    pub query: String,
}

/// A channel subscription kept locally (no account).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalSubscription {
    /// Channel ID.
    pub channel_id: String,
    /// Channel name.
    pub name: Option<String>,
    /// Channel avatar URL.
    pub avatar: Option<String>,
    /// Whether the channel is verified.
    pub verified: bool,
}

impl LocalSubscription {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            channel_id: row.get("channel_id")?,
            name: row.get("name")?,
            avatar: row.get("avatar")?,
            verified: row.get("verified")?,
        })
    }
}

/// A user-added Piped instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomInstance {
    /// Display name.
    pub name: String,
    /// API base URL.
    pub api_url: String,
    /// Frontend URL.
    pub frontend_url: String,
}

impl CustomInstance {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get("name")?,
            api_url: row.get("api_url")?,
            frontend_url: row.get("frontend_url")?,
        })
    }
}

/// A bookmarked remote playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistBookmark {
    /// Remote playlist ID.
    pub playlist_id: String,
    /// Playlist name.
    pub playlist_name: Option<String>,
    /// Thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Owner name.
    pub uploader_name: Option<String>,
    /// Owner URL.
    pub uploader_url: Option<String>,
    /// Owner avatar URL.
    pub uploader_avatar: Option<String>,
    /// Number of videos at bookmark time.
    pub video_count: i64,
}

impl PlaylistBookmark {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            playlist_id: row.get("playlist_id")?,
            playlist_name: row.get("playlist_name")?,
            thumbnail_url: row.get("thumbnail_url")?,
            uploader_name: row.get("uploader_name")?,
            uploader_url: row.get("uploader_url")?,
            uploader_avatar: row.get("uploader_avatar")?,
            video_count: row.get("video_count")?,
        })
    }
}

/// Header row of a local playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalPlaylist {
    /// Row ID. `0` lets the database assign one.
    pub id: i64,
    /// Playlist name.
    pub name: String,
    /// Thumbnail URL.
    pub thumbnail_url: String,
    /// Optional description.
    pub description: Option<String>,
}

impl LocalPlaylist {
    /// Create a playlist header that will receive a fresh ID on insert.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            thumbnail_url: row.get("thumbnail_url")?,
            description: row.get("description")?,
        })
    }
}

/// A video inside a local playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalPlaylistItem {
    /// Row ID. `0` lets the database assign one.
    pub id: i64,
    /// Owning playlist ID.
    pub playlist_id: i64,
    /// Video ID.
    pub video_id: String,
    /// Video title.
    pub title: Option<String>,
    /// Upload date.
    pub upload_date: Option<String>,
    /// Channel name.
    pub uploader: Option<String>,
    /// Channel URL.
    pub uploader_url: Option<String>,
    /// Channel avatar URL.
    pub uploader_avatar: Option<String>,
    /// Thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Duration in seconds.
    pub duration: Option<i64>,
}

impl LocalPlaylistItem {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            playlist_id: row.get("playlist_id")?,
            video_id: row.get("video_id")?,
            title: row.get("title")?,
            upload_date: row.get("upload_date")?,
            uploader: row.get("uploader")?,
            uploader_url: row.get("uploader_url")?,
            uploader_avatar: row.get("uploader_avatar")?,
            thumbnail_url: row.get("thumbnail_url")?,
            duration: row.get("duration")?,
        })
    }
}

/// A local playlist together with its ordered videos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalPlaylistWithVideos {
    /// Playlist header.
    pub playlist: LocalPlaylist,
    /// Videos in playlist order.
    pub videos: Vec<LocalPlaylistItem>,
}

/// A named group of subscribed channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionGroup {
    /// Group name.
    pub name: String,
    /// Channel IDs in the group.
    pub channels: Vec<String>,
    /// Sort position.
    pub index: i64,
}

/// A downloaded (or enqueued) video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Download {
    /// Video ID.
    pub video_id: String,
    /// Video title.
    pub title: String,
    /// Channel name.
    pub uploader: Option<String>,
    /// Duration in seconds.
    pub duration: Option<i64>,
    /// Local thumbnail path.
    pub thumbnail_path: Option<String>,
}

/// A downloaded public playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadPlaylist {
    /// Remote playlist ID.
    pub playlist_id: String,
    /// Playlist title.
    pub title: String,
    /// Playlist description.
    pub description: Option<String>,
    /// Local thumbnail path.
    pub thumbnail_path: Option<String>,
}

impl DownloadPlaylist {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            playlist_id: row.get("playlist_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            thumbnail_path: row.get("thumbnail_path")?,
        })
    }
}

/// Link between a downloaded playlist and one of its videos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPlaylistVideo {
    /// Playlist ID.
    pub playlist_id: String,
    /// Video ID.
    pub video_id: String,
}
