//! Integration tests for LibreTube core workflows.
//!
//! These tests verify end-to-end workflows including:
//! - Structured backup export and restore between two installations
//! - Routing a picked file to the database import or the JSON restore
//! - Auto backup runs with retention
//! - Enqueueing a local playlist in bounded batches
//!
//! All tests use temporary directories as fixtures.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use libretube_core::autobackup::list_auto_backups;
use libretube_core::db::{LocalPlaylist, LocalPlaylistItem, SearchHistoryItem, WatchHistoryItem};
use libretube_core::download::{PipedStream, Playlist, PlaylistPage, Streams};
use libretube_core::{
    AutoBackupWorker, BackupError, BackupManager, BackupOption, Database, DownloadQueue,
    EnqueueRequest, Error, JobOutcome, MediaService, PlaylistDownloadEnqueuer, PlaylistType,
    PreferenceDataStore, RestoreOutcome, RestorePolicy, Result, SqliteSettingsStore, keys,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

// =============================================================================
// Test Fixtures and Utilities
// =============================================================================

/// One installation: a database, its preferences and a backup manager.
struct TestFixture {
    data_dir: TempDir,
    db: Arc<Database>,
    prefs: Arc<PreferenceDataStore>,
    backups: Arc<BackupManager>,
}

impl TestFixture {
    async fn new() -> Self {
        let data_dir = TempDir::new().expect("Should create temp dir");
        let db = Arc::new(Database::open_in(data_dir.path()).expect("Should open database"));
        let store = Arc::new(SqliteSettingsStore::new(Arc::clone(&db)));
        let prefs = Arc::new(PreferenceDataStore::new(store));
        prefs.initialize().await.expect("Should load preferences");
        let backups = Arc::new(BackupManager::new(Arc::clone(&db), Arc::clone(&prefs)));
        Self {
            data_dir,
            db,
            prefs,
            backups,
        }
    }

    /// Fill every table the backup covers with a little data.
    fn populate(&self) {
        self.db
            .insert_watch_history(&[
                WatchHistoryItem {
                    video_id: "w1".to_string(),
                    title: Some("First".to_string()),
                    ..Default::default()
                },
                WatchHistoryItem {
                    video_id: "w2".to_string(),
                    ..Default::default()
                },
            ])
            .unwrap();
        self.db
            .insert_search_history(&[SearchHistoryItem {
                query: "rust".to_string(),
            }])
            .unwrap();

        let id = self
            .db
            .create_local_playlist(&LocalPlaylist::new("Favourites"))
            .unwrap();
        for video_id in ["f1", "f2"] {
            self.db
                .add_local_playlist_item(&LocalPlaylistItem {
                    playlist_id: id,
                    video_id: video_id.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }

        self.prefs.put_int(keys::START_FRAGMENT, 3);
        self.prefs
            .put_string_set(keys::HOME_TAB_CONTENT, Some(["trending", "bookmarks"]));
        self.prefs.put_boolean("sb_enabled", true);
        self.prefs.put_long("buffering_goal", 50_000);
        self.prefs
            .put_string(keys::AUTO_BACKUP_PATH, Some("/source/backups"));
    }
}

fn local_time(hour: u32) -> chrono::DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 3, 1, hour, 0, 0)
        .single()
        .expect("unambiguous local time")
}

// =============================================================================
// Backup and restore
// =============================================================================

#[tokio::test]
async fn test_backup_moves_data_between_installations() {
    let source = TestFixture::new().await;
    source.populate();

    let backup_dir = TempDir::new().unwrap();
    let path = source
        .backups
        .export_to_dir(&BackupOption::ALL, backup_dir.path())
        .await
        .unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("libretube-backup-"));
    assert!(name.ends_with(".json"));

    let target = TestFixture::new().await;
    target
        .prefs
        .put_string(keys::AUTO_BACKUP_PATH, Some("/target/backups"));
    target.prefs.put_string("stale", Some("value"));

    let outcome = target
        .backups
        .restore_any(&path, &RestorePolicy::default())
        .await
        .unwrap();
    let RestoreOutcome::Structured(summary) = outcome else {
        panic!("JSON backup was treated as a database");
    };
    assert_eq!(summary.watch_history, 2);
    assert_eq!(summary.search_history, 1);
    assert_eq!(summary.local_playlists, 1);
    assert_eq!(summary.local_playlist_videos, 2);

    assert_eq!(target.db.watch_history().unwrap().len(), 2);
    let playlists = target.db.local_playlists_with_videos().unwrap();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0].playlist.name, "Favourites");
    assert_eq!(playlists[0].videos.len(), 2);

    assert_eq!(target.prefs.get_int(keys::START_FRAGMENT, 0), 3);
    assert!(target.prefs.get_boolean("sb_enabled", false));
    assert_eq!(target.prefs.get_long("buffering_goal", 0), 50_000);
    assert_eq!(
        target
            .prefs
            .get_string_set(keys::HOME_TAB_CONTENT, BTreeSet::new()),
        BTreeSet::from(["bookmarks".to_string(), "trending".to_string()])
    );
    // The destination of this installation survives the restore.
    assert_eq!(
        target.prefs.get_optional_string(keys::AUTO_BACKUP_PATH),
        Some("/target/backups".to_string())
    );
    assert!(!target.prefs.contains("stale"));
}

#[tokio::test]
async fn test_restore_any_imports_database_files() {
    let source = TestFixture::new().await;
    source.populate();
    source.prefs.flush().await.unwrap();

    let export_dir = TempDir::new().unwrap();
    let export_path = export_dir.path().join("libretube.db");
    assert!(source.backups.export_database(&export_path).await);

    let target = TestFixture::new().await;
    let outcome = target
        .backups
        .restore_any(&export_path, &RestorePolicy::default())
        .await
        .unwrap();
    assert!(matches!(outcome, RestoreOutcome::Database));

    assert_eq!(target.db.watch_history().unwrap().len(), 2);
    assert_eq!(target.db.search_history().unwrap().len(), 1);
    // The preference cache reflects the imported file.
    assert_eq!(target.prefs.get_int(keys::START_FRAGMENT, 0), 3);
    assert!(target.data_dir.path().exists());
}

#[tokio::test]
async fn test_corrupted_backup_changes_nothing() {
    let target = TestFixture::new().await;
    target.prefs.put_string("keep", Some("me"));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"watchHistory\": [").unwrap();

    let err = target
        .backups
        .restore_any(&path, &RestorePolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backup(BackupError::Corrupted(_))));
    assert_eq!(target.prefs.get_optional_string("keep").as_deref(), Some("me"));
    assert!(target.db.watch_history().unwrap().is_empty());
}

// =============================================================================
// Auto backup
// =============================================================================

#[tokio::test]
async fn test_auto_backup_keeps_newest_files() {
    let fixture = TestFixture::new().await;
    fixture.populate();
    let backup_dir = TempDir::new().unwrap();
    fixture.prefs.put_boolean(keys::AUTO_BACKUP_ENABLED, true);
    fixture.prefs.put_string(
        keys::AUTO_BACKUP_PATH,
        Some(backup_dir.path().to_str().unwrap()),
    );
    fixture.prefs.put_long(keys::AUTO_BACKUP_MAX_KEEP, 2);

    let worker = AutoBackupWorker::new(Arc::clone(&fixture.backups));
    for hour in [8, 9, 10] {
        assert_eq!(worker.run_at(local_time(hour)).await, JobOutcome::Success);
    }

    let remaining = list_auto_backups(backup_dir.path()).unwrap();
    assert_eq!(remaining.len(), 2);
    let newest = remaining[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(newest.starts_with("libretube-autobackup-2024-03-01-10"));
}

#[tokio::test]
async fn test_auto_backup_outcomes() {
    let fixture = TestFixture::new().await;
    let worker = AutoBackupWorker::new(Arc::clone(&fixture.backups));

    // Disabled: nothing to do.
    assert_eq!(worker.run_at(local_time(8)).await, JobOutcome::Success);

    // Enabled without a destination.
    fixture.prefs.put_boolean(keys::AUTO_BACKUP_ENABLED, true);
    assert_eq!(worker.run_at(local_time(8)).await, JobOutcome::Failure);

    // Destination that does not exist.
    fixture
        .prefs
        .put_string(keys::AUTO_BACKUP_PATH, Some("/nonexistent/libretube/backups"));
    assert_eq!(worker.run_at(local_time(8)).await, JobOutcome::Failure);
}

// =============================================================================
// Playlist download enqueueing
// =============================================================================

/// Media service that serves streams and records how many requests overlap.
#[derive(Default)]
struct FakeMedia {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl MediaService for FakeMedia {
    async fn playlist(&self, _playlist_id: &str) -> Result<Playlist> {
        Err(Error::network_error("only local playlists in this test"))
    }

    async fn playlist_next_page(&self, _playlist_id: &str, _nextpage: &str) -> Result<PlaylistPage> {
        Err(Error::network_error("only local playlists in this test"))
    }

    async fn streams(&self, video_id: &str) -> Result<Streams> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(Streams {
            title: format!("Video {video_id}"),
            video_streams: ["360p", "720p", "1080p"]
                .iter()
                .map(|quality| PipedStream {
                    quality: Some((*quality).to_string()),
                    format: Some("WEBM".to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn test_enqueue_local_playlist_in_batches() {
    let fixture = TestFixture::new().await;
    let id = fixture
        .db
        .create_local_playlist(&LocalPlaylist::new("Long"))
        .unwrap();
    for i in 0..12 {
        fixture
            .db
            .add_local_playlist_item(&LocalPlaylistItem {
                playlist_id: id,
                video_id: format!("vid{i}"),
                ..Default::default()
            })
            .unwrap();
    }

    let media = Arc::new(FakeMedia::default());
    let queue = Arc::new(DownloadQueue::new());
    let download_dir = TempDir::new().unwrap();
    let enqueuer = PlaylistDownloadEnqueuer::new(
        media.clone(),
        queue.clone(),
        Arc::clone(&fixture.db),
        download_dir.path(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let request = EnqueueRequest::new(id.to_string(), PlaylistType::Private)
        .with_max_video_quality(720);
    let summary = enqueuer.enqueue(&request, Some(tx)).await.unwrap();

    assert_eq!(summary.submitted, 12);
    assert!(media.max_in_flight.load(Ordering::SeqCst) <= 5);

    let items = queue.get_all_items().await;
    assert_eq!(items.len(), 12);
    assert!(items.iter().all(|item| {
        item.request.video_quality.as_deref() == Some("720p")
            && item.request.playlist_id.as_deref() == Some(id.to_string().as_str())
    }));
    assert_eq!(
        fixture.db.playlist_video_ids(&id.to_string()).unwrap().len(),
        12
    );

    let mut last = None;
    while let Ok(progress) = rx.try_recv() {
        last = Some(progress);
    }
    let last = last.unwrap();
    assert_eq!((last.done, last.total), (12, 12));
}

#[tokio::test]
async fn test_enqueue_unknown_local_playlist_fails() {
    let fixture = TestFixture::new().await;
    let enqueuer = PlaylistDownloadEnqueuer::new(
        Arc::new(FakeMedia::default()),
        Arc::new(DownloadQueue::new()),
        Arc::clone(&fixture.db),
        Path::new("/tmp"),
    );

    let err = enqueuer
        .enqueue(&EnqueueRequest::new("999", PlaylistType::Private), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Download(_)));
}
