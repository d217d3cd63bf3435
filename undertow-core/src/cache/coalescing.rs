//! Cache-aside with per-key request coalescing.
//!
//! Concurrent misses for one key share a single in-flight computation. The
//! pending computation is tracked in a map from storage key to a
//! [`OnceCell`]; the entry is removed as soon as the computation settles, so a
//! later miss (for example after a failure) starts a fresh one.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{CacheError, CacheStore};
use crate::error::LookupError;

/// Key types stored through a [`CoalescingCache`].
///
/// The returned string is appended to the cache namespace to form the
/// durable storage key.
pub trait CacheKey {
    fn cache_key(&self) -> String;
}

impl CacheKey for u64 {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl CacheKey for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

/// Counters for monitoring cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
}

type Pending<V> = Arc<OnceCell<Result<V, LookupError>>>;

/// Pending computation for one key and the number of callers attached to it.
struct Inflight<V> {
    cell: Pending<V>,
    participants: usize,
}

/// Typed cache over a shared durable store.
///
/// Every value written through one instance gets the same `ttl`; `None` keeps
/// entries until they are invalidated.
pub struct CoalescingCache<K, V> {
    store: Arc<dyn CacheStore>,
    namespace: String,
    ttl: Option<Duration>,
    inflight: Mutex<HashMap<String, Inflight<V>>>,
    counters: Counters,
    _key: PhantomData<fn(&K)>,
}

impl<K, V> std::fmt::Debug for CoalescingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingCache")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .field("inflight", &self.inflight.lock().len())
            .finish()
    }
}

impl<K, V> CoalescingCache<K, V>
where
    K: CacheKey,
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Creates a cache writing under `namespace` with a fixed `ttl`.
    pub fn new(store: Arc<dyn CacheStore>, namespace: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
            inflight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            _key: PhantomData,
        }
    }

    /// Returns the TTL applied to computed values.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn storage_key(&self, key: &K) -> String {
        format!("{}:{}", self.namespace, key.cache_key())
    }

    /// Reads `key` from durable storage.
    ///
    /// # Errors
    ///
    /// - `CacheError::Backend` - The store could not be reached
    /// - `CacheError::Encoding` - The stored document does not decode as `V`
    pub async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        self.read(&self.storage_key(key)).await
    }

    /// Unconditionally overwrites `key` with `value`.
    ///
    /// # Errors
    ///
    /// - `CacheError::Backend` - The store could not be reached
    /// - `CacheError::Encoding` - `value` could not be serialized
    pub async fn set(&self, key: &K, value: &V, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.write(&self.storage_key(key), value, ttl).await
    }

    /// Removes `key` from durable storage.
    ///
    /// # Errors
    ///
    /// - `CacheError::Backend` - The store could not be reached
    pub async fn invalidate(&self, key: &K) -> Result<(), CacheError> {
        self.store.delete(&self.storage_key(key)).await
    }

    /// Returns the live cached value for `key`, computing it on a miss.
    ///
    /// Concurrent callers for the same key share one invocation of `compute`
    /// and all receive its outcome. A successful result is written to durable
    /// storage before any caller sees it; errors are never cached.
    ///
    /// # Errors
    ///
    /// - Whatever `compute` fails with, cloned to every waiting caller
    pub async fn get_or_compute<F, Fut>(&self, key: &K, compute: F) -> Result<V, LookupError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, LookupError>>,
    {
        let storage_key = self.storage_key(key);

        if let Some(value) = self.lookup(&storage_key).await {
            return Ok(value);
        }

        let guard = {
            let mut inflight = self.inflight.lock();
            let entry = inflight
                .entry(storage_key.clone())
                .or_insert_with(|| Inflight {
                    cell: Arc::new(OnceCell::new()),
                    participants: 0,
                });
            entry.participants += 1;
            InflightGuard {
                inflight: &self.inflight,
                storage_key: storage_key.clone(),
                pending: Arc::clone(&entry.cell),
            }
        };

        // If the caller running `compute` is dropped, one of the remaining
        // waiters re-runs the initialisation with its own closure.
        guard
            .pending
            .get_or_init(|| async {
                // A computation that settled between our miss and joining the
                // map has already written its value.
                if let Some(value) = self.lookup(&storage_key).await {
                    return Ok(value);
                }

                self.counters.computations.fetch_add(1, Ordering::Relaxed);
                let result = compute().await;
                if let Ok(value) = &result
                    && let Err(e) = self.write(&storage_key, value, self.ttl).await
                {
                    warn!("Failed to cache {}: {}", storage_key, e);
                }
                result
            })
            .await
            .clone()
    }

    /// Returns a snapshot of the hit, miss and computation counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
        }
    }

    /// Number of keys with a computation currently in flight.
    pub fn inflight_len(&self) -> usize {
        self.inflight.lock().len()
    }

    async fn lookup(&self, storage_key: &str) -> Option<V> {
        match self.read(storage_key).await {
            Ok(Some(value)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", storage_key);
                Some(value)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", storage_key);
                None
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                warn!("Cache read failed for {}, treating as miss: {}", storage_key, e);
                None
            }
        }
    }

    async fn read(&self, storage_key: &str) -> Result<Option<V>, CacheError> {
        let Some(document) = self.store.get(storage_key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&document)
            .map(Some)
            .map_err(|e| CacheError::Encoding {
                reason: format!("{storage_key}: {e}"),
            })
    }

    async fn write(&self, storage_key: &str, value: &V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let document = serde_json::to_string(value).map_err(|e| CacheError::Encoding {
            reason: format!("{storage_key}: {e}"),
        })?;
        self.store.set(storage_key, document, ttl).await
    }
}

/// One caller's attachment to a pending computation.
///
/// Dropping the guard, on return or on cancellation, detaches the caller and
/// removes the map entry once the cell is settled or nobody is attached.
struct InflightGuard<'a, V> {
    inflight: &'a Mutex<HashMap<String, Inflight<V>>>,
    storage_key: String,
    pending: Pending<V>,
}

impl<V> Drop for InflightGuard<'_, V> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        let Some(entry) = inflight.get_mut(&self.storage_key) else {
            return;
        };
        if !Arc::ptr_eq(&entry.cell, &self.pending) {
            return;
        }

        entry.participants = entry.participants.saturating_sub(1);
        if entry.participants == 0 || entry.cell.initialized() {
            inflight.remove(&self.storage_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn cache(ttl: Option<Duration>) -> CoalescingCache<u64, Vec<String>> {
        CoalescingCache::new(Arc::new(MemoryStore::new(16)), "test", ttl)
    }

    #[tokio::test]
    async fn test_miss_computes_and_stores() {
        let cache = cache(None);

        let value = cache
            .get_or_compute(&1, || async { Ok(vec!["a".to_string()]) })
            .await
            .unwrap();

        assert_eq!(value, vec!["a".to_string()]);
        assert_eq!(cache.get(&1).await.unwrap(), Some(vec!["a".to_string()]));
        assert_eq!(cache.stats().computations, 1);
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_hit_skips_computation() {
        let cache = cache(None);
        cache.set(&7, &vec!["cached".to_string()], None).await.unwrap();

        let value = cache
            .get_or_compute(&7, || async {
                Err(LookupError::internal("compute must not run on a hit"))
            })
            .await
            .unwrap();

        assert_eq!(value, vec!["cached".to_string()]);
        assert_eq!(cache.stats().computations, 0);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache(None);

        let first = cache
            .get_or_compute(&3, || async { Err(LookupError::not_found("anime")) })
            .await;
        assert_eq!(first, Err(LookupError::not_found("anime")));
        assert_eq!(cache.get(&3).await.unwrap(), None);

        let second = cache
            .get_or_compute(&3, || async { Ok(vec!["retry".to_string()]) })
            .await;
        assert_eq!(second, Ok(vec!["retry".to_string()]));
        assert_eq!(cache.stats().computations, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache = cache(None);
        cache.set(&9, &vec!["old".to_string()], None).await.unwrap();
        cache.invalidate(&9).await.unwrap();

        let value = cache
            .get_or_compute(&9, || async { Ok(vec!["new".to_string()]) })
            .await
            .unwrap();
        assert_eq!(value, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_undecodable_document_is_a_miss() {
        let store = Arc::new(MemoryStore::new(4));
        store.set("test:5", "not json".to_string(), None).await.unwrap();
        let cache: CoalescingCache<u64, Vec<String>> = CoalescingCache::new(store, "test", None);

        assert!(matches!(
            cache.get(&5).await,
            Err(CacheError::Encoding { .. })
        ));

        let value = cache
            .get_or_compute(&5, || async { Ok(vec!["fresh".to_string()]) })
            .await
            .unwrap();
        assert_eq!(value, vec!["fresh".to_string()]);
    }
}
