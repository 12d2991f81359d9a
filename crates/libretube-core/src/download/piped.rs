//! [`MediaService`] backed by a Piped API instance.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::model::{Playlist, PlaylistPage, Streams};
use super::service::MediaService;
use crate::error::{Error, Result};

/// Default Piped API instance.
pub const DEFAULT_PIPED_API_URL: &str = "https://pipedapi.kavin.rocks";

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the Piped API.
#[derive(Debug, Clone)]
pub struct PipedClient {
    client: reqwest::Client,
    base_url: String,
}

impl PipedClient {
    /// Create a client for the instance at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::network_error(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// The instance base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::network_error(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network_error(format!("{url} returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::network_error(format!("Invalid response from {url}: {e}")))
    }
}

#[async_trait]
impl MediaService for PipedClient {
    async fn playlist(&self, playlist_id: &str) -> Result<Playlist> {
        self.get_json(&format!("/playlists/{playlist_id}"), &[]).await
    }

    async fn playlist_next_page(&self, playlist_id: &str, nextpage: &str) -> Result<PlaylistPage> {
        self.get_json(
            &format!("/nextpage/playlists/{playlist_id}"),
            &[("nextpage", nextpage)],
        )
        .await
    }

    async fn streams(&self, video_id: &str) -> Result<Streams> {
        self.get_json(&format!("/streams/{video_id}"), &[]).await
    }
}
