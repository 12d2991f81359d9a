//! Downloading release assets.

use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::{Error, FileSystemError, Result};

/// Downloads release assets to local files.
#[derive(Debug, Clone, Default)]
pub struct UpdateManager {
    client: reqwest::Client,
}

impl UpdateManager {
    /// Create a manager with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager reusing an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `url` into `dest`.
    ///
    /// The body is streamed into a temporary file next to `dest` and renamed
    /// over it once complete. Returns `Ok(false)` when the server answers with
    /// a non-success status; `dest` is left untouched in that case.
    pub async fn download_asset(&self, url: &str, dest: &Path) -> Result<bool> {
        info!("Downloading {} to {}", url, dest.display());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Download of {} returned {}", url, status);
            return Ok(false);
        }

        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileSystemError::CreateDirFailed {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;

        let temp = tempfile::Builder::new()
            .prefix(".libretube-update-")
            .suffix(".part")
            .tempfile_in(parent)?;
        let (std_file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                error!("Download of {} interrupted: {}", url, e);
                Error::network_error(format!("Download interrupted: {e}"))
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        drop(file);

        temp_path
            .persist(dest)
            .map_err(|e| FileSystemError::WriteFailed {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!("Downloaded {} bytes to {}", written, dest.display());
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unreachable_host_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("update.apk");

        let result = UpdateManager::new()
            .download_asset("http://127.0.0.1:1/update.apk", &dest)
            .await;
        assert!(result.is_err());
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
