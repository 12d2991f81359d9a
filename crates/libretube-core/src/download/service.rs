//! Seams between the enqueuer and the outside world.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::{Playlist, PlaylistPage, StreamItem, Streams};
use crate::db::Database;
use crate::error::{DownloadError, Result};

/// Source of remote playlist and stream metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Fetch a playlist and its first page of videos.
    async fn playlist(&self, playlist_id: &str) -> Result<Playlist>;

    /// Fetch a continuation page.
    async fn playlist_next_page(&self, playlist_id: &str, nextpage: &str) -> Result<PlaylistPage>;

    /// Fetch the streams of a video.
    async fn streams(&self, video_id: &str) -> Result<Streams>;
}

/// A request to download one video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Video ID.
    pub video_id: String,
    /// Video title, for display.
    pub title: Option<String>,
    /// Format of the chosen video stream.
    pub video_format: Option<String>,
    /// Quality label of the chosen video stream.
    pub video_quality: Option<String>,
    /// Format of the chosen audio stream.
    pub audio_format: Option<String>,
    /// Quality label of the chosen audio stream.
    pub audio_quality: Option<String>,
    /// Audio track language, only set when the video offers it.
    pub audio_language: Option<String>,
    /// Subtitle language code, only set when the video offers it.
    pub subtitle_code: Option<String>,
    /// Playlist the video was enqueued from.
    pub playlist_id: Option<String>,
}

impl DownloadRequest {
    /// Request for `video_id` with nothing selected yet.
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            ..Default::default()
        }
    }
}

/// The component that actually performs downloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Accept a download request. Returns once it is queued, not downloaded.
    async fn submit(&self, request: DownloadRequest) -> Result<()>;
}

/// Load a local playlist in the same shape a remote one is fetched in.
///
/// Local playlists have a single page.
pub async fn load_local_playlist(db: Arc<Database>, playlist_id: &str) -> Result<Playlist> {
    let id: i64 = playlist_id
        .parse()
        .map_err(|_| DownloadError::PlaylistFetchFailed {
            playlist_id: playlist_id.to_string(),
            reason: "not a local playlist ID".to_string(),
        })?;

    let found = tokio::task::spawn_blocking(move || db.local_playlist(id)).await??;
    let local = found.ok_or_else(|| DownloadError::PlaylistFetchFailed {
        playlist_id: playlist_id.to_string(),
        reason: "playlist not found".to_string(),
    })?;

    let related_streams: Vec<StreamItem> = local
        .videos
        .iter()
        .map(|item| StreamItem {
            title: item.title.clone(),
            thumbnail: item.thumbnail_url.clone(),
            uploader_name: item.uploader.clone(),
            duration: item.duration,
            ..StreamItem::for_video(&item.video_id)
        })
        .collect();

    Ok(Playlist {
        name: Some(local.playlist.name),
        description: local.playlist.description,
        thumbnail_url: Some(local.playlist.thumbnail_url).filter(|url| !url.is_empty()),
        videos: related_streams.len(),
        related_streams,
        nextpage: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db::{LocalPlaylist, LocalPlaylistItem};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_local_playlist() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open_in(temp_dir.path()).unwrap());
        let id = db.create_local_playlist(&LocalPlaylist::new("Saved")).unwrap();
        for video_id in ["a", "b"] {
            db.add_local_playlist_item(&LocalPlaylistItem {
                playlist_id: id,
                video_id: video_id.to_string(),
                ..Default::default()
            })
            .unwrap();
        }

        let playlist = load_local_playlist(db, &id.to_string()).await.unwrap();
        assert_eq!(playlist.name.as_deref(), Some("Saved"));
        assert_eq!(playlist.videos, 2);
        assert_eq!(playlist.related_streams[1].url.as_deref(), Some("/watch?v=b"));
        assert!(playlist.nextpage.is_none());
        assert!(playlist.thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn test_unknown_local_playlist() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open_in(temp_dir.path()).unwrap());
        assert!(load_local_playlist(Arc::clone(&db), "42").await.is_err());
        assert!(load_local_playlist(db, "PLremote").await.is_err());
    }
}
