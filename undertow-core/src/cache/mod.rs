//! Cache-aside storage with in-process request coalescing.
//!
//! Values are JSON-serialized into a durable [`CacheStore`] (Redis in
//! production, an LRU map otherwise). [`CoalescingCache`] sits on top and
//! guarantees at most one origin computation per key per process.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::error::LookupError;

pub mod coalescing;
pub mod memory;
pub mod redis_store;

pub use coalescing::{CacheKey, CacheStats, CoalescingCache};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Errors that can occur while talking to a durable store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Backend { reason: String },

    #[error("Cached value could not be encoded: {reason}")]
    Encoding { reason: String },
}

impl From<CacheError> for LookupError {
    fn from(error: CacheError) -> Self {
        LookupError::upstream("cache", error.to_string())
    }
}

/// Durable key/value storage for JSON documents.
///
/// Writes are last-write-wins; no cross-process locking is offered.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Returns the stored document, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// - `CacheError::Backend` - The store could not be reached
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value`, replacing any previous document.
    ///
    /// Value and expiry are applied together; `None` means no expiry.
    ///
    /// # Errors
    ///
    /// - `CacheError::Backend` - The store could not be reached
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Removes the document at `key` if present.
    ///
    /// # Errors
    ///
    /// - `CacheError::Backend` - The store could not be reached
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Opens the store selected by `config`.
///
/// # Errors
///
/// - `CacheError::Backend` - The Redis URL is invalid or the server is unreachable
pub async fn open_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("Using Redis cache store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!(
                "Using in-memory cache store (capacity {})",
                config.memory_capacity
            );
            Ok(Arc::new(MemoryStore::new(config.memory_capacity)))
        }
    }
}
