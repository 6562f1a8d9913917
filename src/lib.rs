//! Secure Tiered Cache
//!
//! A pluggable key-value caching subsystem combining:
//! - **Storage engine (S)**: TTL-aware, capacity-bounded, with LRU/LFU/adaptive eviction
//! - **Codec pipeline (C)**: compress-then-encrypt with AES-256-GCM and Argon2id key derivation
//! - **Two-tier composer (T)**: a fast in-process tier (F) backed by an authoritative,
//!   durable tier (A), with read-through promotion and write-through rollback
//! - **Subscription bus (Σ)**: in-process change notifications per (store, identifier)
//!
//! # Quick start
//!
//! ```rust,no_run
//! use secure_tiered_cache::{CacheEngine, Configuration, Value};
//! use std::time::{Duration, SystemTime};
//!
//! #[tokio::main]
//! async fn main() -> secure_tiered_cache::error::Result<()> {
//!     let engine = CacheEngine::new(Configuration::default()).await?;
//!
//!     let expiration = SystemTime::now() + Duration::from_secs(3600);
//!     engine
//!         .set("user:1", "sessions", Value::String("alice".to_string()), "two-layer", expiration)
//!         .await?;
//!
//!     let result = engine.get("user:1", "sessions", "two-layer").await?;
//!     println!("hit: {}", result.is_hit());
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::SystemTime;

pub mod authoritative_tier;
pub mod backend;
pub mod batch;
pub mod codec;
pub mod composer;
pub mod config;
pub mod error;
pub mod fast_tier;
pub mod storage;
pub mod subscription;
pub mod value;

pub use backend::{AuthoritativeBackend, InMemoryBackend};
#[cfg(feature = "redis-backend")]
pub use backend::RedisBackend;
pub use config::{CacheMode, Configuration, Deployment, Environment, EvictionPolicy};
pub use error::{CacheError, Result};
pub use storage::{CacheResult, StorageStats};
pub use subscription::SubscriptionHandle;
pub use value::Value;

use composer::CacheComposer;

/// The engine's public facade: the operation surface exposed to an external
/// dispatcher (mode selection, request routing) per §6.
pub struct CacheEngine {
    composer: CacheComposer,
}

impl CacheEngine {
    /// Builds the engine against an in-memory authoritative backend.
    /// `config.force_reset` clears any persisted state before returning.
    pub async fn new(config: Configuration) -> Result<Self> {
        Self::with_backend(config, Arc::new(InMemoryBackend::new())).await
    }

    /// Builds the engine against a caller-supplied authoritative backend
    /// (e.g. `RedisBackend` behind the `redis-backend` feature).
    pub async fn with_backend(config: Configuration, backend: Arc<dyn AuthoritativeBackend>) -> Result<Self> {
        config.validate()?;
        let force_reset = config.force_reset;
        let composer = CacheComposer::new(&config, backend);
        if force_reset {
            composer.clear().await?;
        }
        Ok(Self { composer })
    }

    /// Creates or replaces `identifier` in `store` under `mode`.
    pub async fn set(
        &self,
        identifier: &str,
        store: &str,
        value: Value,
        mode: &str,
        expiration: SystemTime,
    ) -> Result<()> {
        match CacheMode::parse(mode)? {
            CacheMode::TwoLayer => self.composer.set(store, identifier, value, expiration).await,
            CacheMode::Server => {
                self.composer
                    .set_authoritative_only(store, identifier, value, expiration)
                    .await
            }
            CacheMode::Client => {
                let size_hint = estimate_size(&value);
                self.composer
                    .set_fast_only(store, identifier, value, expiration, size_hint)
            }
            CacheMode::Cookie => Err(CacheError::InvalidCacheMode("cookie".to_string())),
        }
    }

    /// Reads `identifier` from `store` under `mode`.
    pub async fn get(&self, identifier: &str, store: &str, mode: &str) -> Result<CacheResult<Value>> {
        match CacheMode::parse(mode)? {
            CacheMode::TwoLayer => self.composer.get(store, identifier).await,
            CacheMode::Server => self.composer.get_authoritative_only(store, identifier).await,
            CacheMode::Client => self.composer.get_fast_only(store, identifier),
            CacheMode::Cookie => Err(CacheError::InvalidCacheMode("cookie".to_string())),
        }
    }

    /// Removes `identifier` from `store` under `mode`.
    pub async fn remove(&self, identifier: &str, store: &str, mode: &str) -> Result<()> {
        match CacheMode::parse(mode)? {
            CacheMode::TwoLayer => self.composer.remove(store, identifier).await,
            CacheMode::Server => self.composer.remove_authoritative_only(store, identifier).await,
            CacheMode::Client => self.composer.remove_fast_only(store, identifier),
            CacheMode::Cookie => Err(CacheError::InvalidCacheMode("cookie".to_string())),
        }
    }

    /// Registers `listener` for change notifications on (store, identifier).
    /// Cookie mode never supports subscriptions.
    pub fn subscribe_to_updates(
        &self,
        identifier: &str,
        store: &str,
        mode: &str,
        listener: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        match CacheMode::parse(mode)? {
            CacheMode::Cookie => Err(CacheError::SubscriptionError),
            _ => self.composer.subscribe(store, identifier, listener),
        }
    }

    /// Clears every store in the fast and authoritative tiers, notifying
    /// any live subscribers of the resulting absence.
    pub async fn clear(&self) -> Result<()> {
        self.composer.clear().await
    }

    /// `true` when the authoritative backend responds to a liveness probe.
    pub async fn health_check(&self) -> bool {
        self.composer.health_check().await
    }

    /// Forces any pending batched authoritative writes to persist now,
    /// bypassing the batch timer. Mainly useful in "server" mode, where
    /// there is no fast-tier copy to serve a read-your-writes guarantee.
    pub async fn flush_authoritative(&self) -> Result<()> {
        self.composer.flush_authoritative().await
    }

    pub fn fast_tier_stats(&self) -> StorageStats {
        self.composer.fast_stats()
    }

    pub fn is_client_side(&self) -> bool {
        self.composer.is_client_side()
    }
}

fn estimate_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}
