//! In-process store backed by a bounded LRU map.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{CacheError, CacheStore};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// Bounded in-memory store with per-entry expiry.
///
/// Expiry is checked on read; an entry at or past its deadline is evicted and
/// reported as absent. When full, the least recently used entry is dropped.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<LruCache<String, StoredValue>>,
}

impl MemoryStore {
    /// Creates a store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries currently held, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.value.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .put(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let store = MemoryStore::new(8);
        store
            .set("episodes:1", "[1,2]".to_string(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(
            store.get("episodes:1").await.unwrap().as_deref(),
            Some("[1,2]")
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("episodes:1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_without_ttl_persists() {
        let store = MemoryStore::new(8);
        store
            .set("session:1", "\"abc\"".to_string(), None)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert_eq!(
            store.get("session:1").await.unwrap().as_deref(),
            Some("\"abc\"")
        );
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let store = MemoryStore::new(8);
        store.set("k", "1".to_string(), None).await.unwrap();
        store.set("k", "2".to_string(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_least_recently_used_entry_is_evicted() {
        let store = MemoryStore::new(2);
        store.set("a", "1".to_string(), None).await.unwrap();
        store.set("b", "2".to_string(), None).await.unwrap();
        store.get("a").await.unwrap();
        store.set("c", "3".to_string(), None).await.unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = MemoryStore::new(0);
        assert!(store.is_empty());
    }
}
