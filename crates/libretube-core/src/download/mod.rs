//! Enqueueing playlists for download.
//!
//! [`PlaylistDownloadEnqueuer`] walks a playlist page by page, picks the
//! best streams under the requested quality ceilings, and hands one
//! [`DownloadRequest`] per video to a [`DownloadSink`]. [`DownloadQueue`] is
//! the in-process sink; [`PipedClient`] is the default [`MediaService`].

mod enqueue;
mod model;
mod piped;
mod queue;
mod service;
mod streams;
mod thumbnail;

pub use enqueue::{
    BATCH_SIZE, EnqueueProgress, EnqueueRequest, EnqueueSummary, PAGE_FETCH_ATTEMPTS,
    PROGRESS_INTERVAL, PlaylistDownloadEnqueuer, PlaylistType, THUMBNAIL_TIMEOUT,
    build_download_request,
};
pub use model::{PipedStream, Playlist, PlaylistPage, StreamItem, Streams, Subtitle};
pub use piped::{DEFAULT_PIPED_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS, PipedClient};
pub use queue::{
    DEFAULT_MAX_RETRIES, DownloadQueue, QueueEvent, QueueItem, QueueItemId, QueueItemStatus,
    QueueStats,
};
pub use service::{DownloadRequest, DownloadSink, MediaService, load_local_playlist};
pub use streams::{quality_value, select_stream, video_id_from_url};
pub use thumbnail::{
    PLAYLIST_THUMBNAIL_DIR, fetch_thumbnail, playlist_thumbnail_path, playlist_thumbnail_url,
};
