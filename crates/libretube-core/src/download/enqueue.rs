//! Enqueueing every video of a playlist for download.
//!
//! Videos are processed in concurrent batches of [`BATCH_SIZE`]: each one is
//! linked to the playlist, skipped if it was downloaded before, and otherwise
//! resolved to concrete streams and handed to the [`DownloadSink`]. A failure
//! on one video is logged and counted; only failing to fetch the playlist
//! itself (or one of its pages, after retrying) aborts the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::model::{Playlist, StreamItem, Streams};
use super::service::{DownloadRequest, DownloadSink, MediaService, load_local_playlist};
use super::streams::{select_stream, video_id_from_url};
use super::thumbnail::{fetch_thumbnail, playlist_thumbnail_path, playlist_thumbnail_url};
use crate::db::{Database, DownloadPlaylist, DownloadPlaylistVideo};
use crate::error::{DownloadError, Error, Result};
use crate::retry::RetryPolicy;

/// Videos processed concurrently.
pub const BATCH_SIZE: usize = 5;

/// Minimum time between two progress updates.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Attempts made for each continuation page.
pub const PAGE_FETCH_ATTEMPTS: u32 = 2;

/// Upper bound for fetching a playlist thumbnail.
pub const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a playlist lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    /// Stored in the local database.
    Private,
    /// Fetched from the media service.
    Public,
}

/// What to enqueue and how to pick streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    /// Playlist ID (numeric for private playlists).
    pub playlist_id: String,
    /// Where the playlist lives.
    pub playlist_type: PlaylistType,
    /// Video quality ceiling, e.g. `720`. `None` downloads no video.
    pub max_video_quality: Option<u32>,
    /// Audio quality ceiling in kbps. `None` downloads no audio.
    pub max_audio_quality: Option<u32>,
    /// Preferred audio track language.
    pub audio_language: Option<String>,
    /// Preferred subtitle language.
    pub caption_language: Option<String>,
}

impl EnqueueRequest {
    /// Create a request with no quality ceilings or languages.
    pub fn new(playlist_id: impl Into<String>, playlist_type: PlaylistType) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            playlist_type,
            max_video_quality: None,
            max_audio_quality: None,
            audio_language: None,
            caption_language: None,
        }
    }

    /// Set the video quality ceiling.
    #[must_use]
    pub const fn with_max_video_quality(mut self, quality: u32) -> Self {
        self.max_video_quality = Some(quality);
        self
    }

    /// Set the audio quality ceiling.
    #[must_use]
    pub const fn with_max_audio_quality(mut self, quality: u32) -> Self {
        self.max_audio_quality = Some(quality);
        self
    }

    /// Set the preferred audio language.
    #[must_use]
    pub fn with_audio_language(mut self, language: impl Into<String>) -> Self {
        self.audio_language = Some(language.into());
        self
    }

    /// Set the preferred subtitle language.
    #[must_use]
    pub fn with_caption_language(mut self, language: impl Into<String>) -> Self {
        self.caption_language = Some(language.into());
        self
    }
}

/// Progress of an enqueue run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueProgress {
    /// Videos processed.
    pub done: usize,
    /// Videos in the playlist.
    pub total: usize,
}

/// What an enqueue run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueSummary {
    /// Playlist name.
    pub playlist_name: Option<String>,
    /// Videos processed.
    pub processed: usize,
    /// Videos handed to the download sink.
    pub submitted: usize,
    /// Videos skipped because they were downloaded before.
    pub already_downloaded: usize,
    /// Videos that could not be processed.
    pub failed: usize,
}

impl EnqueueSummary {
    fn record(&mut self, outcome: VideoOutcome) {
        self.processed += 1;
        match outcome {
            VideoOutcome::Submitted => self.submitted += 1,
            VideoOutcome::AlreadyDownloaded => self.already_downloaded += 1,
            VideoOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoOutcome {
    Submitted,
    AlreadyDownloaded,
    Failed,
}

struct ProgressTracker {
    done: usize,
    total: usize,
    interval: Duration,
    last_sent: Instant,
    tx: Option<mpsc::UnboundedSender<EnqueueProgress>>,
}

impl ProgressTracker {
    fn new(
        total: usize,
        interval: Duration,
        tx: Option<mpsc::UnboundedSender<EnqueueProgress>>,
    ) -> Self {
        Self {
            done: 0,
            total,
            interval,
            last_sent: Instant::now(),
            tx,
        }
    }

    fn advance(&mut self) {
        self.done += 1;
        self.total = self.total.max(self.done);
    }

    fn after_batch(&mut self) {
        if self.last_sent.elapsed() > self.interval || self.done == self.total {
            self.send();
        }
    }

    fn send(&mut self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(EnqueueProgress {
                done: self.done,
                total: self.total,
            });
        }
        self.last_sent = Instant::now();
    }
}

/// Enqueues the videos of a playlist for download.
#[derive(Clone)]
pub struct PlaylistDownloadEnqueuer {
    media: Arc<dyn MediaService>,
    sink: Arc<dyn DownloadSink>,
    db: Arc<Database>,
    http: reqwest::Client,
    download_dir: PathBuf,
    page_retry: RetryPolicy,
    progress_interval: Duration,
}

impl PlaylistDownloadEnqueuer {
    /// Create an enqueuer.
    ///
    /// Playlist thumbnails are stored below `download_dir`.
    pub fn new(
        media: Arc<dyn MediaService>,
        sink: Arc<dyn DownloadSink>,
        db: Arc<Database>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            media,
            sink,
            db,
            http: reqwest::Client::builder()
                .timeout(THUMBNAIL_TIMEOUT)
                .build()
                .unwrap_or_default(),
            download_dir: download_dir.into(),
            page_retry: RetryPolicy::immediate(PAGE_FETCH_ATTEMPTS),
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Use `policy` for continuation page fetches.
    #[must_use]
    pub const fn with_page_retry(mut self, policy: RetryPolicy) -> Self {
        self.page_retry = policy;
        self
    }

    /// Use `client` for thumbnail downloads.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Enqueue every video of the requested playlist.
    ///
    /// Progress updates are sent on `progress` (rate limited, plus a final
    /// one). A public playlist's thumbnail is fetched alongside the videos and
    /// is on disk (or its path cleared) by the time this returns. Returns an
    /// error only if the playlist or one of its pages could not be fetched;
    /// videos submitted before that stay submitted.
    pub async fn enqueue(
        &self,
        request: &EnqueueRequest,
        progress: Option<mpsc::UnboundedSender<EnqueueProgress>>,
    ) -> Result<EnqueueSummary> {
        let request = Arc::new(request.clone());
        let playlist_id = request.playlist_id.as_str();
        info!(
            "Enqueueing {:?} playlist {} for download",
            request.playlist_type, playlist_id
        );

        let playlist = self
            .fetch_playlist(&request)
            .await
            .map_err(|e| DownloadError::PlaylistFetchFailed {
                playlist_id: playlist_id.to_string(),
                reason: e.to_string(),
            })?;

        let thumbnail = match request.playlist_type {
            PlaylistType::Public => self.record_playlist(playlist_id, &playlist).await,
            PlaylistType::Private => None,
        };

        let total = playlist.videos.max(playlist.related_streams.len());
        let mut tracker = ProgressTracker::new(total, self.progress_interval, progress);
        tracker.send();

        let mut summary = EnqueueSummary {
            playlist_name: playlist.name.clone(),
            ..EnqueueSummary::default()
        };
        self.enqueue_streams(&request, playlist.related_streams, &mut tracker, &mut summary)
            .await;

        let paged = self
            .enqueue_pages(&request, playlist.nextpage, &mut tracker, &mut summary)
            .await;
        if let Some(handle) = thumbnail
            && let Err(e) = handle.await
        {
            warn!("Thumbnail task for playlist {} failed: {}", playlist_id, e);
        }
        paged?;

        tracker.send();
        info!(
            "Enqueued playlist {}: {} submitted, {} already downloaded, {} failed",
            playlist_id, summary.submitted, summary.already_downloaded, summary.failed
        );
        Ok(summary)
    }

    /// Follow continuation tokens until the playlist is exhausted.
    async fn enqueue_pages(
        &self,
        request: &Arc<EnqueueRequest>,
        mut nextpage: Option<String>,
        tracker: &mut ProgressTracker,
        summary: &mut EnqueueSummary,
    ) -> Result<()> {
        let playlist_id = request.playlist_id.as_str();
        while let Some(token) = nextpage {
            let page = self
                .page_retry
                .retry("fetch next playlist page", |_| {
                    self.media.playlist_next_page(playlist_id, &token)
                })
                .await
                .map_err(|(attempts, e)| {
                    warn!("Giving up on playlist {}: {}", playlist_id, e);
                    DownloadError::PageFetchFailed {
                        playlist_id: playlist_id.to_string(),
                        attempts,
                    }
                })?;

            self.enqueue_streams(request, page.related_streams, tracker, summary)
                .await;
            nextpage = page.nextpage;
        }
        Ok(())
    }

    async fn fetch_playlist(&self, request: &EnqueueRequest) -> Result<Playlist> {
        match request.playlist_type {
            PlaylistType::Private => {
                load_local_playlist(Arc::clone(&self.db), &request.playlist_id).await
            }
            PlaylistType::Public => self.media.playlist(&request.playlist_id).await,
        }
    }

    /// Store the playlist row and start fetching its thumbnail.
    ///
    /// The returned task clears the row's thumbnail path when the fetch fails.
    async fn record_playlist(
        &self,
        playlist_id: &str,
        playlist: &Playlist,
    ) -> Option<JoinHandle<()>> {
        let url = playlist_thumbnail_url(playlist).map(str::to_string);
        let thumbnail_path = playlist_thumbnail_path(&self.download_dir, playlist_id);
        let row = DownloadPlaylist {
            playlist_id: playlist_id.to_string(),
            title: playlist.name.clone().unwrap_or_default(),
            description: playlist.description.clone(),
            thumbnail_path: url
                .as_ref()
                .map(|_| thumbnail_path.to_string_lossy().into_owned()),
        };
        store_playlist_row(Arc::clone(&self.db), row.clone()).await;

        let url = url?;
        let client = self.http.clone();
        let db = Arc::clone(&self.db);
        Some(tokio::spawn(async move {
            if let Err(e) = fetch_thumbnail(&client, &url, &thumbnail_path).await {
                warn!("Failed to fetch playlist thumbnail {}: {}", url, e);
                let row = DownloadPlaylist {
                    thumbnail_path: None,
                    ..row
                };
                store_playlist_row(db, row).await;
            }
        }))
    }

    async fn enqueue_streams(
        &self,
        request: &Arc<EnqueueRequest>,
        streams: Vec<StreamItem>,
        tracker: &mut ProgressTracker,
        summary: &mut EnqueueSummary,
    ) {
        for batch in streams.chunks(BATCH_SIZE) {
            let mut tasks = JoinSet::new();
            for stream in batch {
                let this = self.clone();
                let request = Arc::clone(request);
                let stream = stream.clone();
                tasks.spawn(async move { this.process_video(&stream, &request).await });
            }

            while let Some(joined) = tasks.join_next().await {
                let outcome = joined.unwrap_or_else(|e| {
                    warn!("Video task failed: {}", e);
                    VideoOutcome::Failed
                });
                summary.record(outcome);
                tracker.advance();
            }
            tracker.after_batch();
        }
    }

    async fn process_video(&self, stream: &StreamItem, request: &EnqueueRequest) -> VideoOutcome {
        match self.try_process_video(stream, request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Skipping {} of playlist {}: {}",
                    stream.url.as_deref().unwrap_or("<no url>"),
                    request.playlist_id,
                    e
                );
                VideoOutcome::Failed
            }
        }
    }

    async fn try_process_video(
        &self,
        stream: &StreamItem,
        request: &EnqueueRequest,
    ) -> Result<VideoOutcome> {
        let url = stream.url.as_deref().unwrap_or_default();
        let video_id = video_id_from_url(url)?;

        let db = Arc::clone(&self.db);
        let link = DownloadPlaylistVideo {
            playlist_id: request.playlist_id.clone(),
            video_id: video_id.clone(),
        };
        let already_downloaded = tokio::task::spawn_blocking(move || {
            db.insert_playlist_video_connection(&link)?;
            db.download_exists(&link.video_id)
        })
        .await??;
        if already_downloaded {
            debug!("Video {} already downloaded", video_id);
            return Ok(VideoOutcome::AlreadyDownloaded);
        }

        let streams = self.media.streams(&video_id).await?;
        let download = build_download_request(&video_id, &streams, request);
        self.sink
            .submit(download)
            .await
            .map_err(|e| Error::from(DownloadError::SubmitFailed(e.to_string())))?;
        Ok(VideoOutcome::Submitted)
    }
}

impl std::fmt::Debug for PlaylistDownloadEnqueuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistDownloadEnqueuer")
            .field("download_dir", &self.download_dir)
            .field("page_retry", &self.page_retry)
            .finish_non_exhaustive()
    }
}

async fn store_playlist_row(db: Arc<Database>, row: DownloadPlaylist) {
    let playlist_id = row.playlist_id.clone();
    match tokio::task::spawn_blocking(move || db.insert_download_playlist(&row)).await {
        Ok(Ok(())) => debug!("Recorded download playlist {}", playlist_id),
        Ok(Err(e)) => warn!("Failed to record download playlist {}: {}", playlist_id, e),
        Err(e) => warn!("Failed to record download playlist {}: {}", playlist_id, e),
    }
}

/// Choose streams and languages for one video.
///
/// Languages are only kept when the video actually offers them.
#[must_use]
pub fn build_download_request(
    video_id: &str,
    streams: &Streams,
    request: &EnqueueRequest,
) -> DownloadRequest {
    let video = select_stream(&streams.video_streams, request.max_video_quality);
    let audio = select_stream(&streams.audio_streams, request.max_audio_quality);

    let audio_language = request.audio_language.clone().filter(|language| {
        streams
            .audio_streams
            .iter()
            .any(|s| s.audio_track_locale.as_deref() == Some(language.as_str()))
    });
    let subtitle_code = request.caption_language.clone().filter(|language| {
        streams
            .subtitles
            .iter()
            .any(|s| s.code.as_deref() == Some(language.as_str()))
    });

    DownloadRequest {
        video_id: video_id.to_string(),
        title: Some(streams.title.clone()).filter(|title| !title.is_empty()),
        video_format: video.and_then(|s| s.format.clone()),
        video_quality: video.and_then(|s| s.quality.clone()),
        audio_format: audio.and_then(|s| s.format.clone()),
        audio_quality: audio.and_then(|s| s.quality.clone()),
        audio_language,
        subtitle_code,
        playlist_id: Some(request.playlist_id.clone()),
    }
}
