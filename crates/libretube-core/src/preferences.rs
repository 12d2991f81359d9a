//! Preference storage with an in-memory cache over the settings table.
//!
//! [`PreferenceDataStore`] answers every read synchronously from a concurrent
//! map that is filled once from a [`SettingsStore`]. Writes update the map
//! immediately and hand a persist command to a single background worker, so
//! callers never wait on the database. Commands are applied in the order they
//! were issued; [`PreferenceDataStore::flush`] waits for the queue to drain.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use libretube_core::{Database, PreferenceDataStore, SqliteSettingsStore};
//!
//! let db = Arc::new(Database::open_in(&data_dir)?);
//! let prefs = PreferenceDataStore::new(Arc::new(SqliteSettingsStore::new(db)));
//! prefs.initialize().await?;
//!
//! prefs.put_boolean("auto_backup_enabled", true);
//! assert!(prefs.get_boolean("auto_backup_enabled", false));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::db::{AppSetting, Database};
use crate::error::{Error, Result};

/// Durable backing store for settings rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load every persisted setting.
    async fn load_all(&self) -> Result<Vec<AppSetting>>;

    /// Insert or replace a setting.
    async fn upsert(&self, setting: AppSetting) -> Result<()>;

    /// Delete a setting by key.
    async fn delete(&self, key: String) -> Result<()>;

    /// Delete every setting.
    async fn delete_all(&self) -> Result<()>;
}

/// [`SettingsStore`] backed by the `app_setting` table.
#[derive(Debug, Clone)]
pub struct SqliteSettingsStore {
    db: Arc<Database>,
}

impl SqliteSettingsStore {
    /// Create a store over the given database.
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load_all(&self) -> Result<Vec<AppSetting>> {
        self.blocking(Database::all_settings).await
    }

    async fn upsert(&self, setting: AppSetting) -> Result<()> {
        self.blocking(move |db| db.upsert_setting(&setting)).await
    }

    async fn delete(&self, key: String) -> Result<()> {
        self.blocking(move |db| db.delete_setting(&key)).await
    }

    async fn delete_all(&self) -> Result<()> {
        self.blocking(Database::delete_all_settings).await
    }
}

/// Work handed to the persistence worker.
#[derive(Debug)]
enum PersistCommand {
    Upsert(AppSetting),
    Delete(String),
    DeleteAll,
    Flush(oneshot::Sender<()>),
}

/// Typed settings served from memory and persisted in the background.
pub struct PreferenceDataStore {
    cache: DashMap<String, String>,
    initialized: AtomicBool,
    store: Arc<dyn SettingsStore>,
    persist_tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PreferenceDataStore {
    /// Create a preference store over `store` and start its persistence worker.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persist_worker(Arc::clone(&store), persist_rx));

        Self {
            cache: DashMap::new(),
            initialized: AtomicBool::new(false),
            store,
            persist_tx,
        }
    }

    /// Load every persisted setting into memory. Subsequent calls do nothing.
    pub async fn initialize(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let settings = self.store.load_all().await?;
        let count = settings.len();
        for setting in settings {
            self.cache.insert(setting.key, setting.value);
        }
        self.initialized.store(true, Ordering::Release);

        info!("Loaded {} preferences", count);
        Ok(())
    }

    /// Replace the cache with the store's current rows.
    ///
    /// Used after the database file has been swapped underneath the store.
    /// Pending writes are flushed first.
    pub async fn reload(&self) -> Result<()> {
        self.flush().await?;
        let settings = self.store.load_all().await?;
        self.cache.clear();
        for setting in settings {
            self.cache.insert(setting.key, setting.value);
        }
        self.initialized.store(true, Ordering::Release);
        debug!("Reloaded {} preferences", self.cache.len());
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Snapshot of every cached setting, sorted by key.
    pub fn get_all(&self) -> BTreeMap<String, String> {
        self.cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Whether a value is set for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Raw string value, or `default` when unset.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.cache
            .get(key)
            .map_or_else(|| default.to_string(), |v| v.value().clone())
    }

    /// Raw string value, if set.
    pub fn get_optional_string(&self, key: &str) -> Option<String> {
        self.cache.get(key).map(|v| v.value().clone())
    }

    /// Comma-separated set value, or `default` when unset.
    pub fn get_string_set(&self, key: &str, default: BTreeSet<String>) -> BTreeSet<String> {
        self.cache.get(key).map_or(default, |v| split_set(v.value()))
    }

    /// Integer value, or `default` when unset or unparsable.
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.parsed(key).unwrap_or(default)
    }

    /// Long value, or `default` when unset or unparsable.
    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        self.parsed(key).unwrap_or(default)
    }

    /// Float value, or `default` when unset or unparsable.
    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        self.parsed(key).unwrap_or(default)
    }

    /// Boolean value (`"true"` / `"false"` only), or `default`.
    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.cache.get(key).as_deref().map(String::as_str) {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    /// Set a string value. `None` removes the key.
    pub fn put_string(&self, key: &str, value: Option<&str>) {
        self.update(key, value.map(str::to_string));
    }

    /// Set a string set, stored comma-joined. `None` removes the key.
    pub fn put_string_set<I, S>(&self, key: &str, values: Option<I>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values.map(|values| {
            values
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .collect::<Vec<_>>()
                .join(",")
        });
        self.update(key, joined);
    }

    /// Set an integer value.
    pub fn put_int(&self, key: &str, value: i32) {
        self.update(key, Some(value.to_string()));
    }

    /// Set a long value.
    pub fn put_long(&self, key: &str, value: i64) {
        self.update(key, Some(value.to_string()));
    }

    /// Set a float value.
    pub fn put_float(&self, key: &str, value: f32) {
        self.update(key, Some(value.to_string()));
    }

    /// Set a boolean value.
    pub fn put_boolean(&self, key: &str, value: bool) {
        self.update(key, Some(value.to_string()));
    }

    /// Remove a key.
    pub fn remove(&self, key: &str) {
        self.update(key, None);
    }

    /// Remove every key from memory and from the store.
    pub fn clear(&self) {
        self.cache.clear();
        self.enqueue(PersistCommand::DeleteAll);
    }

    /// Remove every key except those in `keep`.
    pub fn clear_except(&self, keep: &HashSet<String>) {
        let doomed: Vec<String> = self
            .cache
            .iter()
            .filter(|entry| !keep.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        debug!(
            "Clearing {} preferences, keeping {}",
            doomed.len(),
            keep.len()
        );
        for key in doomed {
            self.update(&key, None);
        }
    }

    /// Wait until every queued persist has been applied.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.persist_tx.send(PersistCommand::Flush(tx)).is_err() {
            return Err(Error::Task("preference persistence worker stopped".to_string()));
        }
        rx.await
            .map_err(|_| Error::Task("preference persistence worker stopped".to_string()))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.cache.get(key).and_then(|v| v.value().parse().ok())
    }

    fn update(&self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.cache.insert(key.to_string(), value.clone());
                self.enqueue(PersistCommand::Upsert(AppSetting::new(key, value)));
            }
            None => {
                self.cache.remove(key);
                self.enqueue(PersistCommand::Delete(key.to_string()));
            }
        }
    }

    fn enqueue(&self, command: PersistCommand) {
        if self.persist_tx.send(command).is_err() {
            warn!("Preference persistence worker stopped, change kept in memory only");
        }
    }
}

impl std::fmt::Debug for PreferenceDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceDataStore")
            .field("entries", &self.cache.len())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

fn split_set(value: &str) -> BTreeSet<String> {
    value.split(',').map(str::to_string).collect()
}

async fn run_persist_worker(
    store: Arc<dyn SettingsStore>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(command) = rx.recv().await {
        let result = match command {
            PersistCommand::Upsert(setting) => {
                let key = setting.key.clone();
                store.upsert(setting).await.map_err(|e| (key, e))
            }
            PersistCommand::Delete(key) => store.delete(key.clone()).await.map_err(|e| (key, e)),
            PersistCommand::DeleteAll => store
                .delete_all()
                .await
                .map_err(|e| ("<all>".to_string(), e)),
            PersistCommand::Flush(done) => {
                let _ = done.send(());
                Ok(())
            }
        };

        if let Err((key, e)) = result {
            warn!("Failed to persist preference {}: {}", key, e);
        }
    }
    debug!("Preference persistence worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    /// In-memory store whose writes can be held back until released.
    #[derive(Default)]
    struct GatedStore {
        rows: Mutex<BTreeMap<String, String>>,
        gate: Notify,
        gated: AtomicBool,
    }

    impl GatedStore {
        fn gated() -> Self {
            let store = Self::default();
            store.gated.store(true, Ordering::SeqCst);
            store
        }

        fn release(&self) {
            self.gated.store(false, Ordering::SeqCst);
            self.gate.notify_waiters();
        }

        async fn wait_for_gate(&self) {
            while self.gated.load(Ordering::SeqCst) {
                let notified = self.gate.notified();
                if !self.gated.load(Ordering::SeqCst) {
                    break;
                }
                notified.await;
            }
        }

        fn rows(&self) -> BTreeMap<String, String> {
            self.rows.lock().clone()
        }
    }

    #[async_trait]
    impl SettingsStore for GatedStore {
        async fn load_all(&self) -> Result<Vec<AppSetting>> {
            Ok(self
                .rows()
                .into_iter()
                .map(|(k, v)| AppSetting::new(k, v))
                .collect())
        }

        async fn upsert(&self, setting: AppSetting) -> Result<()> {
            self.wait_for_gate().await;
            self.rows.lock().insert(setting.key, setting.value);
            Ok(())
        }

        async fn delete(&self, key: String) -> Result<()> {
            self.wait_for_gate().await;
            self.rows.lock().remove(&key);
            Ok(())
        }

        async fn delete_all(&self) -> Result<()> {
            self.wait_for_gate().await;
            self.rows.lock().clear();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_read_after_write_before_persist() {
        let store = Arc::new(GatedStore::gated());
        let prefs = PreferenceDataStore::new(store.clone());

        prefs.put_string("region", Some("DE"));
        prefs.put_boolean("sb_enabled", true);

        assert_eq!(prefs.get_string("region", ""), "DE");
        assert!(prefs.get_boolean("sb_enabled", false));
        assert!(store.rows().is_empty());

        store.release();
        prefs.flush().await.unwrap();

        let rows = store.rows();
        assert_eq!(rows.get("region").map(String::as_str), Some("DE"));
        assert_eq!(rows.get("sb_enabled").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_persist_order_is_preserved() {
        let store = Arc::new(GatedStore::default());
        let prefs = PreferenceDataStore::new(store.clone());

        prefs.put_long("counter", 1);
        prefs.put_long("counter", 2);
        prefs.remove("counter");
        prefs.put_int("start_fragment", 3);
        prefs.flush().await.unwrap();

        let rows = store.rows();
        assert!(!rows.contains_key("counter"));
        assert_eq!(rows.get("start_fragment").map(String::as_str), Some("3"));
    }

    #[tokio::test]
    async fn test_typed_getters_and_defaults() {
        let prefs = PreferenceDataStore::new(Arc::new(GatedStore::default()));

        prefs.put_int("int", 42);
        prefs.put_long("long", 9_000_000_000);
        prefs.put_float("float", 1.5);
        prefs.put_string("not_a_number", Some("abc"));
        prefs.put_string_set("tabs", Some(["trending", "feed"]));

        assert_eq!(prefs.get_int("int", 0), 42);
        assert_eq!(prefs.get_long("long", 0), 9_000_000_000);
        assert_eq!(prefs.get_float("float", 0.0), 1.5);
        assert_eq!(prefs.get_int("not_a_number", 7), 7);
        assert!(prefs.get_boolean("not_a_number", true));
        assert_eq!(prefs.get_string("missing", "fallback"), "fallback");

        let tabs = prefs.get_string_set("tabs", BTreeSet::new());
        assert!(tabs.contains("trending"));
        assert!(tabs.contains("feed"));
        assert_eq!(tabs.len(), 2);
    }

    #[tokio::test]
    async fn test_put_none_removes() {
        let prefs = PreferenceDataStore::new(Arc::new(GatedStore::default()));

        prefs.put_string("key", Some("value"));
        assert!(prefs.contains("key"));

        prefs.put_string("key", None);
        assert!(!prefs.contains("key"));

        prefs.put_string_set::<Vec<String>, String>("set", None);
        assert!(!prefs.contains("set"));
    }

    #[tokio::test]
    async fn test_clear_and_clear_except() {
        let store = Arc::new(GatedStore::default());
        let prefs = PreferenceDataStore::new(store.clone());

        prefs.put_string("a", Some("1"));
        prefs.put_string("b", Some("2"));
        prefs.put_string("c", Some("3"));

        let keep: HashSet<String> = std::iter::once("b".to_string()).collect();
        prefs.clear_except(&keep);
        prefs.flush().await.unwrap();
        assert_eq!(prefs.get_all().keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(store.rows().len(), 1);

        prefs.clear();
        prefs.flush().await.unwrap();
        assert!(prefs.get_all().is_empty());
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_loads_once() {
        let mut mock = MockSettingsStore::new();
        mock.expect_load_all()
            .times(1)
            .returning(|| Ok(vec![AppSetting::new("theme", "dark")]));

        let prefs = PreferenceDataStore::new(Arc::new(mock));
        prefs.initialize().await.unwrap();
        prefs.initialize().await.unwrap();

        assert!(prefs.is_initialized());
        assert_eq!(prefs.get_string("theme", "light"), "dark");
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_cache() {
        let mut mock = MockSettingsStore::new();
        mock.expect_upsert()
            .returning(|_| Err(Error::config_error("disk full")));

        let prefs = PreferenceDataStore::new(Arc::new(mock));
        prefs.put_string("key", Some("value"));
        prefs.flush().await.unwrap();

        assert_eq!(prefs.get_string("key", ""), "value");
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db = Arc::new(Database::open_in(temp_dir.path()).unwrap());

        let prefs = PreferenceDataStore::new(Arc::new(SqliteSettingsStore::new(Arc::clone(&db))));
        prefs.put_boolean("auto_backup_enabled", true);
        prefs.flush().await.unwrap();

        let reloaded = PreferenceDataStore::new(Arc::new(SqliteSettingsStore::new(db)));
        reloaded.initialize().await.unwrap();
        assert!(reloaded.get_boolean("auto_backup_enabled", false));
    }
}
