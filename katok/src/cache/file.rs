//! Directory-backed cache that survives process restarts.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::traits::CacheStorage;

/// One file per key under a directory.
///
/// Each file starts with an expiry line (unix millis, or `-` for none),
/// followed by the raw value.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(encode_key(key))
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn encode_key(key: &str) -> String {
    key.replace('%', "%25").replace('/', "%2F")
}

fn decode_key(name: &str) -> String {
    name.replace("%2F", "/").replace("%25", "%")
}

fn split_entry(raw: &[u8]) -> Option<(Option<u128>, &[u8])> {
    let newline = raw.iter().position(|b| *b == b'\n')?;
    let header = std::str::from_utf8(&raw[..newline]).ok()?;
    let expires = match header {
        "-" => None,
        millis => Some(millis.parse().ok()?),
    };
    Some((expires, &raw[newline + 1..]))
}

#[async_trait]
impl CacheStorage for FileCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let raw = tokio::fs::read(self.path_for(key)).await.ok()?;
        let (expires, data) = split_entry(&raw)?;
        if expires.is_some_and(|e| now_millis() > e) {
            let _ = tokio::fs::remove_file(self.path_for(key)).await;
            return None;
        }
        Some(data.to_vec())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            log::warn!("Cannot create cache dir {}: {}", self.dir.display(), e);
            return;
        }

        let header = match ttl {
            Some(ttl) => (now_millis() + ttl.as_millis()).to_string(),
            None => "-".to_owned(),
        };
        let mut raw = Vec::with_capacity(header.len() + 1 + value.len());
        raw.extend_from_slice(header.as_bytes());
        raw.push(b'\n');
        raw.extend_from_slice(value);

        if let Err(e) = tokio::fs::write(self.path_for(key), raw).await {
            log::warn!("Cannot write cache entry {}: {}", key, e);
        }
    }

    async fn remove(&self, key: &str) {
        let _ = tokio::fs::remove_file(self.path_for(key)).await;
    }

    async fn clear(&self) {
        for key in self.scan_prefix("").await {
            self.remove(&key).await;
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Vec<String> {
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return Vec::new();
        };

        let mut keys = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let key = decode_key(&entry.file_name().to_string_lossy());
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorageExt;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("katok-cache-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_key_encoding() {
        assert_eq!(encode_key("settings/5"), "settings%2F5");
        assert_eq!(decode_key(&encode_key("a%2F/b")), "a%2F/b");
    }

    #[tokio::test]
    async fn test_round_trip_and_scan() {
        let cache = FileCache::new(temp_dir("rt"));
        cache.clear().await;

        cache.set_json("settings/5", &vec![1, 2, 3], None).await.unwrap();
        cache.set("session", b"x", None).await;

        let value: Option<Vec<i32>> = cache.get_json("settings/5").await;
        assert_eq!(value, Some(vec![1, 2, 3]));
        assert_eq!(cache.scan_prefix("settings/").await, vec!["settings/5".to_owned()]);

        cache.clear().await;
        assert!(cache.get("session").await.is_none());
        let _ = tokio::fs::remove_dir_all(cache.dir()).await;
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped() {
        let cache = FileCache::new(temp_dir("ttl"));
        cache.set("k", b"v", Some(Duration::from_millis(20))).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("k").await.is_none());
        let _ = tokio::fs::remove_dir_all(cache.dir()).await;
    }
}
