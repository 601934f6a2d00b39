//! Shared, locally cached and lazily persisted user settings.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time;

use crate::cache::{keys, CacheStorage, CacheStorageExt};
use crate::error::Result;
use crate::models::{Settings, UserId, MAX_THRESHOLD};

/// Default quiet period before a change is written to the server.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Server-side settings storage.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    async fn fetch_settings(&self) -> Result<Settings>;
    async fn save_settings(&self, settings: &Settings) -> Result<Settings>;
}

#[async_trait]
impl SettingsBackend for crate::KatokClient {
    async fn fetch_settings(&self) -> Result<Settings> {
        self.users().settings().await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        self.users().update_settings(&settings.to_update()).await
    }
}

struct Inner {
    current: RwLock<Settings>,
    cache: Option<(Arc<dyn CacheStorage>, String)>,
    persist: Option<mpsc::UnboundedSender<()>>,
}

/// Process-wide settings.
///
/// Reads are synchronous snapshots. Every mutation goes through
/// [`SettingsStore::update`], which writes the local cache immediately and
/// schedules a debounced save to the server.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("current", &self.get())
            .finish()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore {
    /// In-memory store with no persistence.
    pub fn new(initial: Settings) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(clamp(initial)),
                cache: None,
                persist: None,
            }),
        }
    }

    /// Store seeded from the local cache for `user`, falling back to defaults.
    pub async fn load(cache: Arc<dyn CacheStorage>, user: UserId) -> Self {
        let key = keys::settings(user);
        let initial = cache.get_json::<Settings>(&key).await.unwrap_or_default();
        Self::build(initial, Some((cache, key)), None)
    }

    /// Attach debounced server persistence. Must be called inside a runtime.
    pub fn with_persistence(self, backend: Arc<dyn SettingsBackend>, debounce: Duration) -> Self {
        let initial = self.get();
        let cache = self.inner.cache.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self::build(initial, cache, Some(tx));
        tokio::spawn(persist_loop(Arc::downgrade(&store.inner), backend, rx, debounce));
        store
    }

    fn build(
        initial: Settings,
        cache: Option<(Arc<dyn CacheStorage>, String)>,
        persist: Option<mpsc::UnboundedSender<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(clamp(initial)),
                cache,
                persist,
            }),
        }
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> Settings {
        self.inner
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Apply a change. Returns the resulting settings.
    pub async fn update<F>(&self, f: F) -> Settings
    where
        F: FnOnce(&mut Settings) + Send,
    {
        let updated = {
            let mut current = self.inner.current.write().unwrap_or_else(|e| e.into_inner());
            let before = current.clone();
            f(&mut *current);
            *current = clamp(current.clone());
            if *current == before {
                return before;
            }
            current.clone()
        };

        self.write_cache(&updated).await;
        if let Some(tx) = &self.inner.persist {
            let _ = tx.send(());
        }
        updated
    }

    /// Replace local settings with the server's copy, e.g. right after login.
    pub async fn sync(&self, backend: &dyn SettingsBackend) -> Result<Settings> {
        let remote = clamp(backend.fetch_settings().await?);
        *self.inner.current.write().unwrap_or_else(|e| e.into_inner()) = remote.clone();
        self.write_cache(&remote).await;
        log::debug!("Settings synced from server: {:?}", remote);
        Ok(remote)
    }

    async fn write_cache(&self, settings: &Settings) {
        if let Some((cache, key)) = &self.inner.cache {
            if let Err(e) = cache.set_json(key, settings, None).await {
                log::warn!("Failed to cache settings: {}", e);
            }
        }
    }
}

fn clamp(mut settings: Settings) -> Settings {
    settings.auto_reply_threshold = settings.auto_reply_threshold.min(MAX_THRESHOLD);
    settings
}

async fn persist_loop(
    inner: std::sync::Weak<Inner>,
    backend: Arc<dyn SettingsBackend>,
    mut changes: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) {
    while changes.recv().await.is_some() {
        // Restart the quiet period on every further change.
        loop {
            match time::timeout(debounce, changes.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => break,
                Err(_) => break,
            }
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let snapshot = inner.current.read().unwrap_or_else(|e| e.into_inner()).clone();
        drop(inner);

        match backend.save_settings(&snapshot).await {
            Ok(_) => log::debug!("Settings saved"),
            Err(e) => log::error!("Failed to save settings: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::models::{ReplyMode, Tone};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        saved: Mutex<Vec<Settings>>,
        remote: Settings,
    }

    #[async_trait]
    impl SettingsBackend for Recording {
        async fn fetch_settings(&self) -> Result<Settings> {
            Ok(self.remote.clone())
        }

        async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
            self.saved.lock().unwrap().push(settings.clone());
            Ok(settings.clone())
        }
    }

    #[tokio::test]
    async fn test_update_clamps_threshold() {
        let store = SettingsStore::default();
        let s = store.update(|s| s.auto_reply_threshold = 250).await;
        assert_eq!(s.auto_reply_threshold, MAX_THRESHOLD);
        assert_eq!(store.get().auto_reply_threshold, MAX_THRESHOLD);
    }

    #[tokio::test]
    async fn test_burst_of_updates_saves_once() {
        let backend = Arc::new(Recording::default());
        let store = SettingsStore::default().with_persistence(backend.clone(), Duration::from_millis(50));

        store.update(|s| s.reply_mode = ReplyMode::Auto).await;
        store.update(|s| s.default_tone = Tone::Formal).await;
        store.update(|s| s.auto_reply_threshold = 40).await;

        time::sleep(Duration::from_millis(200)).await;
        let saved = backend.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].reply_mode, ReplyMode::Auto);
        assert_eq!(saved[0].default_tone, Tone::Formal);
        assert_eq!(saved[0].auto_reply_threshold, 40);
    }

    #[tokio::test]
    async fn test_noop_update_is_not_saved() {
        let backend = Arc::new(Recording::default());
        let store = SettingsStore::default().with_persistence(backend.clone(), Duration::from_millis(20));
        store.update(|_| {}).await;
        time::sleep(Duration::from_millis(80)).await;
        assert!(backend.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_and_sync() {
        let dir = std::env::temp_dir().join(format!("katok-settings-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let cache: Arc<dyn CacheStorage> = Arc::new(FileCache::new(dir));
        let store = SettingsStore::load(cache.clone(), UserId(5)).await;
        assert_eq!(store.get(), Settings::default());

        store.update(|s| s.default_tone = Tone::Friendly).await;
        let reloaded = SettingsStore::load(cache.clone(), UserId(5)).await;
        assert_eq!(reloaded.get().default_tone, Tone::Friendly);

        let backend = Recording {
            remote: Settings {
                reply_mode: ReplyMode::Auto,
                ..Default::default()
            },
            ..Default::default()
        };
        let synced = reloaded.sync(&backend).await.unwrap();
        assert_eq!(synced.reply_mode, ReplyMode::Auto);
        assert_eq!(reloaded.get().default_tone, Tone::Polite);
    }
}
