//! Release metadata as returned by the release feed.

use serde::{Deserialize, Serialize};

/// A published release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    /// Release name, e.g. `Nightly Build 42`.
    pub name: String,
    /// Markdown changelog.
    #[serde(default)]
    pub body: String,
    /// Release page.
    #[serde(default)]
    pub html_url: String,
    /// Downloadable files.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl UpdateInfo {
    /// First asset whose name ends with `suffix`.
    #[must_use]
    pub fn asset_with_suffix(&self, suffix: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name.ends_with(suffix))
    }
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Direct download URL.
    pub browser_download_url: String,
    /// MIME type.
    #[serde(default)]
    pub content_type: String,
    /// File name.
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_release() {
        let json = r#"{
            "name": "Nightly Build 9",
            "body": "changes",
            "html_url": "https://example.com/releases/9",
            "assets": [
                {"browser_download_url": "https://example.com/a.txt", "content_type": "text/plain", "name": "a.txt"},
                {"browser_download_url": "https://example.com/app.apk", "content_type": "application/vnd.android.package-archive", "name": "app.apk"}
            ],
            "draft": false
        }"#;
        let info: UpdateInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.name, "Nightly Build 9");
        assert_eq!(
            info.asset_with_suffix(".apk").map(|a| a.browser_download_url.as_str()),
            Some("https://example.com/app.apk")
        );
        assert!(info.asset_with_suffix(".zip").is_none());
    }

    #[test]
    fn test_assets_default_to_empty() {
        let info: UpdateInfo = serde_json::from_str(r#"{"name": "Run 3"}"#).unwrap();
        assert!(info.assets.is_empty());
    }
}
