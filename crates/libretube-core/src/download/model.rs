//! Piped API response types used by the download enqueuer.

use serde::{Deserialize, Serialize};

/// A playlist and its first page of videos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Playlist {
    /// Playlist name.
    pub name: Option<String>,
    /// Playlist description.
    pub description: Option<String>,
    /// Thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Total number of videos, across all pages.
    pub videos: usize,
    /// Videos on the first page.
    pub related_streams: Vec<StreamItem>,
    /// Token of the next page, if any.
    pub nextpage: Option<String>,
}

/// A continuation page of a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistPage {
    /// Videos on this page.
    pub related_streams: Vec<StreamItem>,
    /// Token of the next page, if any.
    pub nextpage: Option<String>,
}

/// A video entry in a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamItem {
    /// Watch URL, e.g. `/watch?v=<id>`.
    pub url: Option<String>,
    /// Video title.
    pub title: Option<String>,
    /// Thumbnail URL.
    pub thumbnail: Option<String>,
    /// Channel name.
    pub uploader_name: Option<String>,
    /// Duration in seconds.
    pub duration: Option<i64>,
}

impl StreamItem {
    /// Entry for a video ID.
    pub fn for_video(video_id: &str) -> Self {
        Self {
            url: Some(format!("/watch?v={video_id}")),
            ..Default::default()
        }
    }
}

/// Playable streams of a single video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Streams {
    /// Video title.
    pub title: String,
    /// Channel name.
    pub uploader: Option<String>,
    /// Thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Duration in seconds.
    pub duration: Option<i64>,
    /// Video-only and muxed streams.
    pub video_streams: Vec<PipedStream>,
    /// Audio streams.
    pub audio_streams: Vec<PipedStream>,
    /// Available subtitles.
    pub subtitles: Vec<Subtitle>,
}

/// One stream variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipedStream {
    /// Stream URL.
    pub url: Option<String>,
    /// Container format, e.g. `WEBM`.
    pub format: Option<String>,
    /// Quality label, e.g. `720p` or `128 kbps`.
    pub quality: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Codec name.
    pub codec: Option<String>,
    /// Bitrate in bits per second.
    pub bitrate: Option<i64>,
    /// Audio track locale for multi-language videos.
    pub audio_track_locale: Option<String>,
    /// Whether the stream has no audio.
    pub video_only: bool,
}

/// A subtitle track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subtitle {
    /// Subtitle URL.
    pub url: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Language code.
    pub code: Option<String>,
    /// Whether the track is auto-generated.
    pub auto_generated: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_decodes_piped_json() {
        let json = r#"{
            "name": "Mix",
            "thumbnailUrl": "https://example.com/t.jpg",
            "videos": 2,
            "relatedStreams": [{"url": "/watch?v=a", "title": "A"}],
            "nextpage": "token"
        }"#;
        let playlist: Playlist = serde_json::from_str(json).unwrap();
        assert_eq!(playlist.videos, 2);
        assert_eq!(playlist.related_streams[0].url.as_deref(), Some("/watch?v=a"));
        assert_eq!(playlist.nextpage.as_deref(), Some("token"));
    }

    #[test]
    fn test_streams_decode_audio_locale() {
        let json = r#"{
            "title": "T",
            "audioStreams": [{"quality": "128 kbps", "format": "M4A", "audioTrackLocale": "de"}],
            "subtitles": [{"code": "en", "autoGenerated": true}]
        }"#;
        let streams: Streams = serde_json::from_str(json).unwrap();
        assert_eq!(streams.audio_streams[0].audio_track_locale.as_deref(), Some("de"));
        assert!(streams.subtitles[0].auto_generated);
        assert!(streams.video_streams.is_empty());
    }
}
