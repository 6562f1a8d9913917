//! The authoritative tier's storage collaborator.
//!
//! `AuthoritativeBackend` is the seam the two-tier composer is built
//! against; `InMemoryBackend` is the default, always-available
//! implementation, and `RedisBackend` is available behind the
//! `redis-backend` feature for durable deployments.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheError;

/// Byte-oriented backend trait for the authoritative tier, extended with
/// TTL introspection (needed for A→F promotion with accurate remaining TTL).
#[async_trait]
pub trait AuthoritativeBackend: Send + Sync {
    /// Returns the stored bytes and remaining TTL, if present.
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn health_check(&self) -> bool;

    fn name(&self) -> &'static str {
        "unknown"
    }
}

struct InMemoryEntry {
    value: Vec<u8>,
    expires_at: std::time::Instant,
}

/// A process-local authoritative backend, grounded on `backends/dashmap_cache.rs`.
/// Suitable for tests and single-process deployments with no external store.
#[derive(Default)]
pub struct InMemoryBackend {
    map: DashMap<String, InMemoryEntry>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthoritativeBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>, CacheError> {
        let now = std::time::Instant::now();
        let hit = self.map.get(key).and_then(|entry| {
            (entry.expires_at > now).then(|| (entry.value.clone(), entry.expires_at.duration_since(now)))
        });
        match hit {
            Some((value, remaining)) => Ok(Some((value, Some(remaining)))),
            None => {
                self.map.remove(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.map.insert(
            key.to_string(),
            InMemoryEntry {
                value,
                expires_at: std::time::Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.map.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.map.clear();
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(feature = "redis-backend")]
pub mod redis_backend {
    use super::{AuthoritativeBackend, CacheError};
    use async_trait::async_trait;
    use redis::aio::ConnectionManager;
    use redis::{AsyncCommands, Client};
    use std::time::Duration;

    /// A Redis-backed authoritative store using `ConnectionManager` for
    /// automatic reconnection.
    pub struct RedisBackend {
        conn: ConnectionManager,
    }

    impl RedisBackend {
        pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
            let client = Client::open(redis_url)
                .map_err(|e| CacheError::StorageError(format!("invalid redis url: {e}")))?;
            let conn = ConnectionManager::new(client)
                .await
                .map_err(|e| CacheError::StorageError(format!("redis connect failed: {e}")))?;
            Ok(Self { conn })
        }
    }

    #[async_trait]
    impl AuthoritativeBackend for RedisBackend {
        async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>, CacheError> {
            let mut conn = self.conn.clone();
            let bytes: Option<Vec<u8>> = conn
                .get(key)
                .await
                .map_err(|e| CacheError::StorageError(e.to_string()))?;
            let Some(bytes) = bytes else {
                return Ok(None);
            };
            let ttl_secs: i64 = redis::cmd("TTL")
                .arg(key)
                .query_async(&mut conn)
                .await
                .unwrap_or(-1);
            let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs as u64));
            Ok(Some((bytes, ttl)))
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
            let mut conn = self.conn.clone();
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| CacheError::StorageError(e.to_string()))
        }

        async fn remove(&self, key: &str) -> Result<(), CacheError> {
            let mut conn = self.conn.clone();
            conn.del::<_, ()>(key)
                .await
                .map_err(|e| CacheError::StorageError(e.to_string()))
        }

        async fn clear(&self) -> Result<(), CacheError> {
            let mut conn = self.conn.clone();
            redis::cmd("FLUSHDB")
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| CacheError::StorageError(e.to_string()))
        }

        async fn health_check(&self) -> bool {
            let mut conn = self.conn.clone();
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .is_ok()
        }

        fn name(&self) -> &'static str {
            "redis"
        }
    }
}

#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisBackend;
