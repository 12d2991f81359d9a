//! Fetching playlist thumbnails for downloaded playlists.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::model::Playlist;
use crate::error::{Error, FileSystemError, Result};

/// Directory (below the download directory) holding playlist thumbnails.
pub const PLAYLIST_THUMBNAIL_DIR: &str = "playlist_thumbnail";

/// Where the thumbnail of `playlist_id` is stored.
#[must_use]
pub fn playlist_thumbnail_path(download_dir: &Path, playlist_id: &str) -> PathBuf {
    download_dir.join(PLAYLIST_THUMBNAIL_DIR).join(playlist_id)
}

/// Best thumbnail URL for a playlist: its own, else its first video's.
#[must_use]
pub fn playlist_thumbnail_url(playlist: &Playlist) -> Option<&str> {
    playlist
        .thumbnail_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .or_else(|| {
            playlist
                .related_streams
                .first()
                .and_then(|stream| stream.thumbnail.as_deref())
        })
}

/// Download the image at `url` into `dest` and return its size.
pub async fn fetch_thumbnail(client: &reqwest::Client, url: &str, dest: &Path) -> Result<usize> {
    debug!("Fetching thumbnail {} into {}", url, dest.display());

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::network_error(format!("Failed to fetch thumbnail: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::network_error(format!(
            "Thumbnail request returned {}",
            response.status()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("image/") {
        warn!("Unexpected content type for thumbnail: {}", content_type);
    }

    let data = response
        .bytes()
        .await
        .map_err(|e| Error::network_error(format!("Failed to read thumbnail data: {e}")))?;
    if data.is_empty() {
        return Err(Error::network_error("Empty thumbnail data"));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileSystemError::CreateDirFailed {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
    }
    tokio::fs::write(dest, &data)
        .await
        .map_err(|e| FileSystemError::WriteFailed {
            path: dest.to_path_buf(),
            reason: e.to_string(),
        })?;

    info!("Saved thumbnail {} ({} bytes)", dest.display(), data.len());
    Ok(data.len())
}
