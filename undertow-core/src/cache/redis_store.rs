//! Redis-backed durable store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{CacheError, CacheStore};

/// Durable store shared between processes through Redis.
///
/// The connection manager reconnects transparently and is cheap to clone, so
/// every call works on its own handle without locking.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

fn backend(error: redis::RedisError) -> CacheError {
    CacheError::Backend {
        reason: error.to_string(),
    }
}

impl RedisStore {
    /// Connects to the server at `url` (e.g. `redis://127.0.0.1:6379/0`).
    ///
    /// # Errors
    ///
    /// - `CacheError::Backend` - The URL is malformed or the server is unreachable
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let connection = ConnectionManager::new(client).await.map_err(backend)?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await.map_err(backend)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();

        match ttl {
            Some(ttl) => {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                let _: () = redis::pipe()
                    .atomic()
                    .cmd("SET")
                    .arg(key)
                    .arg(&value)
                    .ignore()
                    .cmd("PEXPIRE")
                    .arg(key)
                    .arg(millis)
                    .ignore()
                    .query_async(&mut connection)
                    .await
                    .map_err(backend)?;
            }
            None => {
                let _: () = redis::cmd("SET")
                    .arg(key)
                    .arg(&value)
                    .query_async(&mut connection)
                    .await
                    .map_err(backend)?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
