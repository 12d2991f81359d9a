//! Comparing the running build against the latest published release.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::info::{Asset, UpdateInfo};
use crate::error::{Error, Result, UpdateError};

/// Default release feed (a GitHub repository API URL).
pub const DEFAULT_UPDATE_FEED_URL: &str =
    "https://api.github.com/repos/akashsriramganapathy/LibreTube";

/// Release tag followed by experimental builds.
pub const EXPERIMENTAL_TAG: &str = "experimental";

/// Suffix of the asset that can be installed.
pub const DEFAULT_ASSET_SUFFIX: &str = ".apk";

static RUN_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:Run|Build)[\s-]*(\d+)").ok());

/// Which release line to follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateChannel {
    /// The latest release.
    #[default]
    Nightly,
    /// The release tagged `experimental`.
    Experimental,
}

impl std::fmt::Display for UpdateChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nightly => write!(f, "nightly"),
            Self::Experimental => write!(f, "experimental"),
        }
    }
}

/// Run number in a name like `Nightly Build 9`, `Run 10` or `build-123`.
#[must_use]
pub fn extract_run_number(name: &str) -> Option<u64> {
    RUN_PATTERN
        .as_ref()?
        .captures(name)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Run number of the running build.
///
/// Falls back to all digits of the version name concatenated, then to 0.
#[must_use]
pub fn local_run_number(version_name: &str) -> u64 {
    extract_run_number(version_name).unwrap_or_else(|| {
        version_name
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap_or(0)
    })
}

/// Run number of a release.
///
/// Without a `Run`/`Build` marker only a purely numeric name counts, so a
/// date in the name is never mistaken for a run number.
#[must_use]
pub fn remote_run_number(release_name: &str) -> u64 {
    extract_run_number(release_name).unwrap_or_else(|| {
        if release_name.chars().all(|c| c.is_ascii_digit()) {
            release_name.parse().unwrap_or(0)
        } else {
            0
        }
    })
}

/// Make a release body readable as plain text.
///
/// Drops the trailing "Full Changelog" link and pull request URLs, turns
/// `##` headings into upper-case labels, and bullets into `•`.
#[must_use]
pub fn sanitize_changelog(body: &str) -> String {
    let body = body
        .rfind("**Full Changelog**")
        .map_or(body, |index| &body[..index]);

    let body = match Regex::new(r"in https://github\.com/\S+") {
        Ok(links) => links.replace_all(body, "").into_owned(),
        Err(_) => body.to_string(),
    };

    body.lines()
        .map(|line| {
            if line.starts_with("##") {
                format!("{} :", line.to_uppercase())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .replace("## ", "")
        .replace('>', "")
        .replace('*', "•")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Source of release metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the current release of `channel`.
    async fn release(&self, channel: UpdateChannel) -> Result<UpdateInfo>;
}

/// [`ReleaseSource`] backed by the GitHub releases API.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: reqwest::Client,
    feed_url: String,
}

impl GithubReleases {
    /// Create a source for the repository API at `feed_url`.
    pub fn new(feed_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("libretube/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::network_error(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            feed_url: feed_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint serving the release of `channel`.
    #[must_use]
    pub fn endpoint(&self, channel: UpdateChannel) -> String {
        match channel {
            UpdateChannel::Nightly => format!("{}/releases/latest", self.feed_url),
            UpdateChannel::Experimental => {
                format!("{}/releases/tags/{}", self.feed_url, EXPERIMENTAL_TAG)
            }
        }
    }
}

#[async_trait]
impl ReleaseSource for GithubReleases {
    async fn release(&self, channel: UpdateChannel) -> Result<UpdateInfo> {
        let url = self.endpoint(channel);
        debug!("Fetching release metadata from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::BadStatus(status.as_u16()).into());
        }

        response
            .json()
            .await
            .map_err(|e| UpdateError::InvalidMetadata(e.to_string()).into())
    }
}

/// Result of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// A newer release with an installable asset exists.
    Available {
        /// The release.
        info: UpdateInfo,
        /// The asset to install.
        asset: Asset,
        /// Run number of the release.
        run_number: u64,
    },
    /// A newer release exists but carries nothing installable.
    NoInstallableAsset {
        /// The release.
        info: UpdateInfo,
    },
    /// The running build is current.
    UpToDate,
}

impl UpdateStatus {
    /// Whether a newer release was found.
    #[must_use]
    pub const fn is_newer(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Checks the release feed for a newer build.
pub struct UpdateChecker {
    source: Arc<dyn ReleaseSource>,
    channel: UpdateChannel,
    current_version: String,
    asset_suffix: String,
}

impl UpdateChecker {
    /// Create a checker for the build named `current_version`.
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        channel: UpdateChannel,
        current_version: impl Into<String>,
    ) -> Self {
        Self {
            source,
            channel,
            current_version: current_version.into(),
            asset_suffix: DEFAULT_ASSET_SUFFIX.to_string(),
        }
    }

    /// Look for assets ending in `suffix` instead of `.apk`.
    #[must_use]
    pub fn with_asset_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.asset_suffix = suffix.into();
        self
    }

    /// Followed channel.
    #[must_use]
    pub const fn channel(&self) -> UpdateChannel {
        self.channel
    }

    /// Compare the running build against the channel's release.
    ///
    /// `manual` only raises the log level of "nothing found" outcomes.
    pub async fn check(&self, manual: bool) -> Result<UpdateStatus> {
        let current = local_run_number(&self.current_version);
        let info = self.source.release(self.channel).await?;
        let remote = remote_run_number(&info.name);

        debug!(
            "Checking update: channel={}, local={}, remote={}",
            self.channel, current, remote
        );

        if remote <= current {
            if manual {
                info!("{} is up to date", self.current_version);
            }
            return Ok(UpdateStatus::UpToDate);
        }

        match info.asset_with_suffix(&self.asset_suffix).cloned() {
            Some(asset) => {
                info!(
                    "Update found: {}, URL: {}",
                    info.name, asset.browser_download_url
                );
                Ok(UpdateStatus::Available {
                    info,
                    asset,
                    run_number: remote,
                })
            }
            None => {
                if manual {
                    warn!("Update found but no installable asset: {}", info.name);
                } else {
                    debug!("Update found but no installable asset: {}", info.name);
                }
                Ok(UpdateStatus::NoInstallableAsset { info })
            }
        }
    }
}

impl std::fmt::Debug for UpdateChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateChecker")
            .field("channel", &self.channel)
            .field("current_version", &self.current_version)
            .field("asset_suffix", &self.asset_suffix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn release(name: &str, assets: &[&str]) -> UpdateInfo {
        UpdateInfo {
            name: name.to_string(),
            assets: assets
                .iter()
                .map(|name| Asset {
                    browser_download_url: format!("https://example.com/{name}"),
                    name: (*name).to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn checker(info: UpdateInfo, channel: UpdateChannel, current: &str) -> UpdateChecker {
        let mut source = MockReleaseSource::new();
        source
            .expect_release()
            .withf(move |c| *c == channel)
            .returning(move |_| Ok(info.clone()));
        UpdateChecker::new(Arc::new(source), channel, current)
    }

    #[test]
    fn test_extract_run_number() {
        assert_eq!(extract_run_number("Nightly Build 9"), Some(9));
        assert_eq!(extract_run_number("Experimental Build-123"), Some(123));
        assert_eq!(extract_run_number("Run10"), Some(10));
        assert_eq!(extract_run_number("run - 7"), Some(7));
        assert_eq!(extract_run_number("v0.25.1"), None);
    }

    #[test]
    fn test_local_run_number_falls_back_to_digits() {
        assert_eq!(local_run_number("Nightly Build 9"), 9);
        assert_eq!(local_run_number("0.25.1"), 251);
        assert_eq!(local_run_number("dev"), 0);
    }

    #[test]
    fn test_remote_run_number_ignores_dates() {
        assert_eq!(remote_run_number("Run 10"), 10);
        assert_eq!(remote_run_number("42"), 42);
        assert_eq!(remote_run_number("Release 2025-01-01"), 0);
    }

    #[test]
    fn test_sanitize_changelog() {
        let body = "## What's Changed\n* Fix crash by @dev in https://github.com/o/r/pull/1\n> note\n\n**Full Changelog**: https://github.com/o/r/compare";
        let sanitized = sanitize_changelog(body);
        assert_eq!(sanitized, "WHAT'S CHANGED :\n• Fix crash by @dev\nnote");
    }

    #[tokio::test]
    async fn test_newer_release_is_available() {
        let checker = checker(
            release("Nightly Build 10", &["notes.txt", "LibreTube.apk"]),
            UpdateChannel::Nightly,
            "Nightly Build 9",
        );
        match checker.check(false).await.unwrap() {
            UpdateStatus::Available {
                asset, run_number, ..
            } => {
                assert_eq!(asset.name, "LibreTube.apk");
                assert_eq!(run_number, 10);
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_equal_release_is_up_to_date() {
        let checker = checker(
            release("Nightly Build 9", &["LibreTube.apk"]),
            UpdateChannel::Nightly,
            "Nightly Build 9",
        );
        assert_eq!(checker.check(true).await.unwrap(), UpdateStatus::UpToDate);
    }

    #[tokio::test]
    async fn test_newer_release_without_asset() {
        let checker = checker(
            release("Experimental Build 12", &["source.zip"]),
            UpdateChannel::Experimental,
            "Experimental Build 11",
        );
        let status = checker.check(true).await.unwrap();
        assert!(matches!(status, UpdateStatus::NoInstallableAsset { .. }));
        assert!(status.is_newer());
    }

    #[tokio::test]
    async fn test_feed_error_propagates() {
        let mut source = MockReleaseSource::new();
        source
            .expect_release()
            .returning(|_| Err(UpdateError::BadStatus(404).into()));
        let checker = UpdateChecker::new(Arc::new(source), UpdateChannel::Nightly, "Run 1");
        assert!(matches!(
            checker.check(false).await,
            Err(Error::Update(UpdateError::BadStatus(404)))
        ));
    }

    #[test]
    fn test_endpoints() {
        let source = GithubReleases::new("https://api.github.com/repos/o/r/").unwrap();
        assert_eq!(
            source.endpoint(UpdateChannel::Nightly),
            "https://api.github.com/repos/o/r/releases/latest"
        );
        assert_eq!(
            source.endpoint(UpdateChannel::Experimental),
            "https://api.github.com/repos/o/r/releases/tags/experimental"
        );
    }
}
