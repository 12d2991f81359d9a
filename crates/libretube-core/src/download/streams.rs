//! Choosing stream variants and parsing watch URLs.

use super::model::PipedStream;
use crate::error::{DownloadError, Result};

/// Numeric prefix of a quality label (`"720p60"` is 720, `"128 kbps"` is 128).
#[must_use]
pub fn quality_value(label: &str) -> Option<u32> {
    let digits: String = label.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Pick the stream to download for a quality ceiling.
///
/// Without a ceiling nothing is picked. Otherwise the highest quality at or
/// below the ceiling wins, falling back to the lowest quality available.
/// Labels without a leading number rank below every numbered one.
#[must_use]
pub fn select_stream(streams: &[PipedStream], ceiling: Option<u32>) -> Option<&PipedStream> {
    let ceiling = ceiling?;

    let mut sorted: Vec<&PipedStream> = streams.iter().collect();
    sorted.sort_by_key(|stream| stream.quality.as_deref().and_then(quality_value));

    sorted
        .iter()
        .rev()
        .find(|stream| {
            stream
                .quality
                .as_deref()
                .and_then(quality_value)
                .is_some_and(|quality| quality <= ceiling)
        })
        .or_else(|| sorted.first())
        .copied()
}

/// Extract the video ID from a watch URL.
///
/// Accepts `/watch?v=<id>`, full `https://…/watch?v=<id>&…` URLs,
/// `https://youtu.be/<id>` and bare IDs.
pub fn video_id_from_url(url: &str) -> Result<String> {
    let id = if let Some((_, query)) = url.split_once("v=") {
        query.split('&').next().unwrap_or_default()
    } else {
        url.rsplit('/').next().unwrap_or_default()
    };
    let id = id.split(['?', '#']).next().unwrap_or_default().trim();

    if id.is_empty() {
        Err(DownloadError::InvalidStreamUrl(url.to_string()).into())
    } else {
        Ok(id.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn streams(qualities: &[&str]) -> Vec<PipedStream> {
        qualities
            .iter()
            .map(|q| PipedStream {
                quality: Some((*q).to_string()),
                ..Default::default()
            })
            .collect()
    }

    fn picked(streams: &[PipedStream], ceiling: Option<u32>) -> Option<&str> {
        select_stream(streams, ceiling).and_then(|s| s.quality.as_deref())
    }

    #[test]
    fn test_quality_value() {
        assert_eq!(quality_value("720p"), Some(720));
        assert_eq!(quality_value("1080p60"), Some(1080));
        assert_eq!(quality_value("128 kbps"), Some(128));
        assert_eq!(quality_value("auto"), None);
    }

    #[test]
    fn test_highest_at_or_below_ceiling() {
        let candidates = streams(&["720p", "144p", "480p", "240p", "360p"]);
        assert_eq!(picked(&candidates, Some(480)), Some("480p"));
        assert_eq!(picked(&candidates, Some(500)), Some("480p"));
        assert_eq!(picked(&candidates, Some(4320)), Some("720p"));
    }

    #[test]
    fn test_falls_back_to_lowest() {
        let candidates = streams(&["360p", "144p", "720p"]);
        assert_eq!(picked(&candidates, Some(100)), Some("144p"));
    }

    #[test]
    fn test_no_ceiling_or_no_streams() {
        let candidates = streams(&["360p"]);
        assert_eq!(picked(&candidates, None), None);
        assert_eq!(picked(&[], Some(720)), None);
    }

    #[test]
    fn test_video_id_from_url() {
        assert_eq!(video_id_from_url("/watch?v=abc123").unwrap(), "abc123");
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=abc123&list=PL1").unwrap(),
            "abc123"
        );
        assert_eq!(video_id_from_url("https://youtu.be/xyz?t=5").unwrap(), "xyz");
        assert_eq!(video_id_from_url("plainid").unwrap(), "plainid");
        assert!(video_id_from_url("/watch?v=").is_err());
    }
}
