use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs;

/// Lifetime of a resolved identifier set
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86400 * 7); // 7 days

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache directory: {0}")]
    CreateDir(std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Shared string key/value store with per-entry expiry
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    key: String,
    value: String,
    /// Unix seconds
    expires_at: u64,
}

/// One JSON file per key under a cache directory
pub struct FileCache {
    cache_dir: PathBuf,
    enabled: bool,
}

impl FileCache {
    /// Cache under the user's cache directory
    pub fn new(enabled: bool) -> Result<Self, CacheError> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("isbnres");
        Self::in_dir(cache_dir, enabled)
    }

    pub fn in_dir(cache_dir: impl Into<PathBuf>, enabled: bool) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();

        if enabled {
            std::fs::create_dir_all(&cache_dir).map_err(CacheError::CreateDir)?;
        }

        Ok(Self { cache_dir, enabled })
    }

    fn record_path(&self, key: &str) -> PathBuf {
        // Keys contain ':' and spaces, so hash them into a safe file name
        self.cache_dir.join(format!("{:x}.json", key_digest(key)))
    }

    /// Remove every cached record
    pub async fn clear(&self) -> Result<(), CacheError> {
        if !fs::try_exists(&self.cache_dir).await? {
            return Ok(());
        }

        let mut entries = fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|e| e == "json") {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResolutionCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.record_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CacheRecord = serde_json::from_str(&content)?;

        if record.expires_at <= unix_now() {
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }

        // Digest collision
        if record.key != key {
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }

        let record = CacheRecord {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: unix_now().saturating_add(ttl.as_secs()),
        };
        let content = serde_json::to_string(&record)?;
        fs::write(self.record_path(key), content).await?;
        Ok(())
    }
}

/// Process-local cache, mainly for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryCache {
    // `None` never expires
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(_, expires)| is_live(*expires, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResolutionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        match entries.get(key) {
            Some((value, expires)) if is_live(*expires, Instant::now()) => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }
}

fn is_live(expires: Option<Instant>, now: Instant) -> bool {
    expires.map_or(true, |at| at > now)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 64-bit FNV-1a, stable across builds so records outlive toolchain upgrades
fn key_digest(s: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    s.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KEY: &str = "isbn:title:clean code:mode:any:providers:google-books+openlibrary";

    #[tokio::test]
    async fn test_file_cache_round_trip() {
        let dir = tempdir().unwrap();
        let cache = FileCache::in_dir(dir.path(), true).unwrap();

        cache
            .set(KEY, "9780306406157,0306406152", DEFAULT_CACHE_TTL)
            .await
            .unwrap();

        assert_eq!(
            cache.get(KEY).await.unwrap().as_deref(),
            Some("9780306406157,0306406152")
        );
        assert_eq!(cache.get("isbn:title:other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_cache_expired_record_is_removed() {
        let dir = tempdir().unwrap();
        let cache = FileCache::in_dir(dir.path(), true).unwrap();

        cache.set(KEY, "9780306406157", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get(KEY).await.unwrap(), None);
        assert!(!cache.record_path(KEY).exists());
    }

    #[tokio::test]
    async fn test_disabled_file_cache_is_a_no_op() {
        let dir = tempdir().unwrap();
        let cache = FileCache::in_dir(dir.path().join("unused"), false).unwrap();

        cache.set(KEY, "9780306406157", DEFAULT_CACHE_TTL).await.unwrap();

        assert_eq!(cache.get(KEY).await.unwrap(), None);
        assert!(!dir.path().join("unused").exists());
    }

    #[tokio::test]
    async fn test_file_cache_clear() {
        let dir = tempdir().unwrap();
        let cache = FileCache::in_dir(dir.path(), true).unwrap();

        cache.set(KEY, "9780306406157", DEFAULT_CACHE_TTL).await.unwrap();
        cache.clear().await.unwrap();

        assert_eq!(cache.get(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let dir = tempdir().unwrap();
        let cache = FileCache::in_dir(dir.path(), true).unwrap();
        std::fs::write(cache.record_path(KEY), "not json").unwrap();

        assert!(matches!(
            cache.get(KEY).await,
            Err(CacheError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();

        cache.set(KEY, "9780306406157", DEFAULT_CACHE_TTL).await.unwrap();
        cache.set("stale", "0306406152", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get(KEY).await.unwrap().as_deref(), Some("9780306406157"));
        assert_eq!(cache.get("stale").await.unwrap(), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_cache_unbounded_ttl_never_expires() {
        let cache = MemoryCache::new();

        cache.set(KEY, "9780306406157", Duration::MAX).await.unwrap();

        assert_eq!(cache.get(KEY).await.unwrap().as_deref(), Some("9780306406157"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_digest_is_fixed() {
        assert_eq!(key_digest(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(key_digest("a"), 0xaf63_dc4c_8601_ec8c);
        assert_ne!(key_digest(KEY), key_digest("isbn:title:other"));
    }
}
