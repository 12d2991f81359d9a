//! In-process download queue.
//!
//! [`DownloadQueue`] is the [`DownloadSink`] the CLI hands to the enqueuer.
//! It tracks per-video requests through their lifecycle (pending,
//! downloading, completed, failed, cancelled). A queue built with
//! [`DownloadQueue::with_events`] emits a [`QueueEvent`] for every change so a
//! download worker or UI can follow along; without it no events are kept.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use super::service::{DownloadRequest, DownloadSink};
use crate::error::Result;

/// Unique identifier for a queue item.
pub type QueueItemId = u64;

/// Default number of retries for a failed download.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Status of a queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    /// Waiting to be downloaded.
    Pending,
    /// Being downloaded.
    Downloading,
    /// Downloaded.
    Completed,
    /// Download failed with an error.
    Failed(String),
    /// Cancelled before finishing.
    Cancelled,
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Downloading => write!(f, "Downloading"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed(msg) => write!(f, "Failed: {msg}"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A queued video download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue item ID.
    pub id: QueueItemId,
    /// What to download.
    pub request: DownloadRequest,
    /// Current status.
    pub status: QueueItemStatus,
    /// Number of retries so far.
    pub retry_count: u32,
    /// When the item was added (Unix millis).
    pub added_at: u64,
    /// When the download started (Unix millis).
    pub started_at: Option<u64>,
    /// When the download finished (Unix millis).
    pub finished_at: Option<u64>,
}

impl QueueItem {
    fn new(id: QueueItemId, request: DownloadRequest) -> Self {
        Self {
            id,
            request,
            status: QueueItemStatus::Pending,
            retry_count: 0,
            added_at: now_millis(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether the item reached a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(
            self.status,
            QueueItemStatus::Completed | QueueItemStatus::Failed(_) | QueueItemStatus::Cancelled
        )
    }

    /// Whether the item is waiting or downloading.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.is_finished()
    }
}

/// Changes emitted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum QueueEvent {
    /// An item was added.
    ItemAdded(QueueItem),
    /// An item started downloading.
    ItemStarted {
        /// The queue item ID.
        item_id: QueueItemId,
    },
    /// An item finished downloading.
    ItemCompleted {
        /// The queue item ID.
        item_id: QueueItemId,
    },
    /// An item failed.
    ItemFailed {
        /// The queue item ID.
        item_id: QueueItemId,
        /// Error message.
        error: String,
    },
    /// An item was cancelled.
    ItemCancelled {
        /// The queue item ID.
        item_id: QueueItemId,
    },
    /// An item was removed.
    ItemRemoved {
        /// The queue item ID.
        item_id: QueueItemId,
    },
}

/// Item counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// All items.
    pub total_items: usize,
    /// Pending items.
    pub pending_count: usize,
    /// Downloading items.
    pub downloading_count: usize,
    /// Completed items.
    pub completed_count: usize,
    /// Failed items.
    pub failed_count: usize,
    /// Cancelled items.
    pub cancelled_count: usize,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    next_id: QueueItemId,
    max_retries: u32,
}

impl QueueState {
    const fn new(max_retries: u32) -> Self {
        Self {
            items: VecDeque::new(),
            next_id: 0,
            max_retries,
        }
    }

    const fn next_item_id(&mut self) -> QueueItemId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn find_item_mut(&mut self, id: QueueItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_items: self.items.len(),
            ..QueueStats::default()
        };
        for item in &self.items {
            match &item.status {
                QueueItemStatus::Pending => stats.pending_count += 1,
                QueueItemStatus::Downloading => stats.downloading_count += 1,
                QueueItemStatus::Completed => stats.completed_count += 1,
                QueueItemStatus::Failed(_) => stats.failed_count += 1,
                QueueItemStatus::Cancelled => stats.cancelled_count += 1,
            }
        }
        stats
    }
}

/// FIFO queue of video downloads.
pub struct DownloadQueue {
    state: Arc<RwLock<QueueState>>,
    event_tx: Option<mpsc::UnboundedSender<QueueEvent>>,
}

impl DownloadQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }

    /// Create an empty queue allowing `max_retries` retries per item.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(QueueState::new(max_retries))),
            event_tx: None,
        }
    }

    /// Create an empty queue that reports every change on the returned
    /// receiver. Events stop being sent once the receiver is dropped.
    #[must_use]
    pub fn with_events(max_retries: u32) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let queue = Self {
            event_tx: Some(event_tx),
            ..Self::with_max_retries(max_retries)
        };
        (queue, event_rx)
    }

    fn emit(&self, event: QueueEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Add a request and return its item ID.
    ///
    /// A video that is already pending or downloading is not added twice;
    /// the existing item ID is returned instead.
    pub async fn add(&self, request: DownloadRequest) -> QueueItemId {
        let mut state = self.state.write().await;

        if let Some(existing) = state
            .items
            .iter()
            .find(|item| item.is_active() && item.request.video_id == request.video_id)
        {
            debug!(
                "Video {} already queued as item {}",
                request.video_id, existing.id
            );
            return existing.id;
        }

        let id = state.next_item_id();
        let item = QueueItem::new(id, request);
        info!("Queued download {}: video {}", id, item.request.video_id);
        self.emit(QueueEvent::ItemAdded(item.clone()));
        state.items.push_back(item);
        id
    }

    /// Remove a pending or finished item.
    pub async fn remove(&self, id: QueueItemId) -> bool {
        let mut state = self.state.write().await;
        let Some(pos) = state.items.iter().position(|item| item.id == id) else {
            warn!("Cannot remove item {} - not found", id);
            return false;
        };
        if state.items[pos].status == QueueItemStatus::Downloading {
            warn!("Cannot remove item {} - currently downloading", id);
            return false;
        }
        state.items.remove(pos);
        self.emit(QueueEvent::ItemRemoved { item_id: id });
        true
    }

    /// Cancel a pending or downloading item.
    pub async fn cancel(&self, id: QueueItemId) -> bool {
        let mut state = self.state.write().await;
        let Some(item) = state.find_item_mut(id) else {
            warn!("Cannot cancel item {} - not found", id);
            return false;
        };
        if item.is_finished() {
            warn!("Cannot cancel item {} - already finished", id);
            return false;
        }
        item.status = QueueItemStatus::Cancelled;
        item.finished_at = Some(now_millis());
        self.emit(QueueEvent::ItemCancelled { item_id: id });
        info!("Cancelled item {}", id);
        true
    }

    /// A snapshot of one item.
    pub async fn get_item(&self, id: QueueItemId) -> Option<QueueItem> {
        let state = self.state.read().await;
        state.items.iter().find(|item| item.id == id).cloned()
    }

    /// A snapshot of every item, oldest first.
    pub async fn get_all_items(&self) -> Vec<QueueItem> {
        let state = self.state.read().await;
        state.items.iter().cloned().collect()
    }

    /// Mark the oldest pending item as downloading and return it.
    pub async fn start_next(&self) -> Option<QueueItem> {
        let mut state = self.state.write().await;
        let item = state
            .items
            .iter_mut()
            .find(|item| item.status == QueueItemStatus::Pending)?;
        item.status = QueueItemStatus::Downloading;
        item.started_at = Some(now_millis());
        self.emit(QueueEvent::ItemStarted { item_id: item.id });
        Some(item.clone())
    }

    /// Mark an item as downloaded.
    pub async fn mark_completed(&self, id: QueueItemId) {
        let mut state = self.state.write().await;
        if let Some(item) = state.find_item_mut(id) {
            item.status = QueueItemStatus::Completed;
            item.finished_at = Some(now_millis());
            self.emit(QueueEvent::ItemCompleted { item_id: id });
            info!("Item {} completed", id);
        }
    }

    /// Mark an item as failed.
    pub async fn mark_failed(&self, id: QueueItemId, error: String) {
        let mut state = self.state.write().await;
        if let Some(item) = state.find_item_mut(id) {
            item.status = QueueItemStatus::Failed(error.clone());
            item.finished_at = Some(now_millis());
            error!("Item {} failed: {}", id, error);
            self.emit(QueueEvent::ItemFailed { item_id: id, error });
        }
    }

    /// Put a failed item back into the queue, if it has retries left.
    pub async fn retry(&self, id: QueueItemId) -> bool {
        let mut state = self.state.write().await;
        let max_retries = state.max_retries;
        let Some(item) = state.find_item_mut(id) else {
            warn!("Cannot retry item {} - not found", id);
            return false;
        };
        if !matches!(item.status, QueueItemStatus::Failed(_)) || item.retry_count >= max_retries {
            warn!("Cannot retry item {} - not failed or out of retries", id);
            return false;
        }
        item.status = QueueItemStatus::Pending;
        item.retry_count += 1;
        item.started_at = None;
        item.finished_at = None;
        info!("Retrying item {} (attempt {})", id, item.retry_count);
        true
    }

    /// Drop every finished item and return how many were removed.
    pub async fn clear_finished(&self) -> usize {
        let mut state = self.state.write().await;
        let before = state.items.len();
        state.items.retain(QueueItem::is_active);
        before - state.items.len()
    }

    /// Item counts by status.
    pub async fn stats(&self) -> QueueStats {
        self.state.read().await.stats()
    }
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DownloadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadQueue").finish_non_exhaustive()
    }
}

#[async_trait]
impl DownloadSink for DownloadQueue {
    async fn submit(&self, request: DownloadRequest) -> Result<()> {
        self.add(request).await;
        Ok(())
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_start() {
        let queue = DownloadQueue::new();
        let first = queue.add(DownloadRequest::new("a")).await;
        let second = queue.add(DownloadRequest::new("b")).await;
        assert_ne!(first, second);

        let started = queue.start_next().await.unwrap();
        assert_eq!(started.id, first);
        assert_eq!(started.status, QueueItemStatus::Downloading);

        let stats = queue.stats().await;
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.downloading_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_active_video_is_not_requeued() {
        let queue = DownloadQueue::new();
        let first = queue.add(DownloadRequest::new("a")).await;
        let again = queue.add(DownloadRequest::new("a")).await;
        assert_eq!(first, again);
        assert_eq!(queue.stats().await.total_items, 1);

        queue.mark_completed(first).await;
        let later = queue.add(DownloadRequest::new("a")).await;
        assert_ne!(first, later);
    }

    #[tokio::test]
    async fn test_fail_and_retry() {
        let queue = DownloadQueue::with_max_retries(1);
        let id = queue.add(DownloadRequest::new("a")).await;
        queue.start_next().await;
        queue.mark_failed(id, "network".to_string()).await;
        assert!(queue.retry(id).await);
        assert_eq!(queue.get_item(id).await.unwrap().status, QueueItemStatus::Pending);

        queue.start_next().await;
        queue.mark_failed(id, "network".to_string()).await;
        assert!(!queue.retry(id).await);
    }

    #[tokio::test]
    async fn test_cannot_remove_downloading() {
        let queue = DownloadQueue::new();
        let id = queue.add(DownloadRequest::new("a")).await;
        queue.start_next().await;
        assert!(!queue.remove(id).await);
        assert!(queue.cancel(id).await);
        assert!(queue.remove(id).await);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (queue, mut events) = DownloadQueue::with_events(DEFAULT_MAX_RETRIES);
        queue.submit(DownloadRequest::new("a")).await.unwrap();
        assert!(matches!(
            events.try_recv(),
            Ok(QueueEvent::ItemAdded(item)) if item.request.video_id == "a"
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_events_stop_after_receiver_dropped() {
        let (queue, events) = DownloadQueue::with_events(DEFAULT_MAX_RETRIES);
        drop(events);
        let id = queue.add(DownloadRequest::new("a")).await;
        queue.start_next().await;
        queue.mark_completed(id).await;
        assert_eq!(queue.stats().await.completed_count, 1);
    }

    #[tokio::test]
    async fn test_plain_queue_keeps_no_events() {
        let queue = DownloadQueue::new();
        assert!(queue.event_tx.is_none());
        queue.add(DownloadRequest::new("a")).await;
        assert_eq!(queue.stats().await.pending_count, 1);
    }
}
