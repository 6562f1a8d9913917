//! Two-tier composer (T): unifies F and A behind one get/set/remove/clear
//! surface, with per-key stampede protection.
//!
//! Concurrent misses on the same key are serialized through a per-key
//! async lock so only one request reads through to the authoritative tier;
//! siblings re-check the fast tier once they acquire it. Cross-instance
//! invalidation is deliberately out of scope — Σ is in-process only (see
//! DESIGN.md).

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::authoritative_tier::AuthoritativeTier;
use crate::backend::AuthoritativeBackend;
use crate::codec::kdf::KdfCost;
use crate::codec::SecureCodec;
use crate::config::{Configuration, Environment};
use crate::error::CacheError;
use crate::fast_tier::FastTier;
use crate::storage::CacheResult;
use crate::subscription::{SubscriptionBus, SubscriptionHandle};
use crate::value::{validate_identifier, validate_store_name, Value};

type KeyLockMap = DashMap<(String, String), Arc<AsyncMutex<()>>>;

/// Removes the in-flight lock entry for `key` when dropped, regardless of
/// how the holding scope exits.
struct CleanupGuard<'a> {
    map: &'a KeyLockMap,
    key: (String, String),
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// Orchestrates reads (F-miss → A-read → decode → F-populate), writes
/// (encode → A via B → F decoded → publish), removes, and clears.
pub struct CacheComposer {
    fast: FastTier,
    authoritative: AuthoritativeTier,
    codec: SecureCodec,
    subscriptions: SubscriptionBus,
    in_flight: KeyLockMap,
    environment: Environment,
}

impl CacheComposer {
    pub fn new(config: &Configuration, backend: Arc<dyn AuthoritativeBackend>) -> Self {
        let fast = FastTier::new(
            config.cache_size,
            config.max_memory_usage,
            config.eviction_policy,
            config.prefetch_threshold,
        );
        let authoritative = AuthoritativeTier::new(
            backend,
            config.cache_size,
            config.max_memory_usage,
            config.eviction_policy,
            config.prefetch_threshold,
            config.batch_size,
            config.persistence_interval,
            config.cache_max_age,
            config.authoritative_timeout,
            config.batch_timeout,
        );
        let codec = SecureCodec::new(
            config.encryption_password.clone(),
            config.compression_level,
            KdfCost::default(),
            config.kdf_timeout,
        );

        Self {
            fast,
            authoritative,
            codec,
            subscriptions: SubscriptionBus::new(),
            in_flight: DashMap::new(),
            environment: config.environment,
        }
    }

    /// Stable for the engine's lifetime; used by the dispatcher to refuse
    /// two-tier behaviour in non-client contexts.
    pub fn is_client_side(&self) -> bool {
        matches!(self.environment, Environment::Client)
    }

    /// 1. Query F. 2. On miss, query A, decode, populate F. 3. Otherwise miss.
    pub async fn get(&self, store: &str, identifier: &str) -> Result<CacheResult<Value>, CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;

        let hit = self.fast.get(store, identifier);
        if hit.is_hit() {
            return Ok(hit);
        }

        let key = (store.to_string(), identifier.to_string());
        let lock = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _permit = lock.lock().await;
        let _cleanup = CleanupGuard {
            map: &self.in_flight,
            key: key.clone(),
        };

        // Re-check: a sibling request may have already populated F while we
        // waited for the per-key lock.
        let hit = self.fast.get(store, identifier);
        if hit.is_hit() {
            return Ok(hit);
        }

        let a_result = self.authoritative.get(store, identifier).await?;
        match a_result.value {
            Some(payload) => {
                let value = self.codec.decode(&payload).await?;
                let size = payload.ciphertext.len();
                self.fast.set(store, identifier, value, a_result.expiration, size)?;
                Ok(self.fast.get(store, identifier))
            }
            None => Ok(CacheResult::miss()),
        }
    }

    /// 1. Encode via C. 2. Submit to B for A. 3. Place decoded value in F.
    /// 4. Publish to Σ. If step 2 fails, F is rolled back.
    pub async fn set(
        &self,
        store: &str,
        identifier: &str,
        value: Value,
        expiration: SystemTime,
    ) -> Result<(), CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;

        let payload = self.codec.encode(&value).await?;
        let size = payload.ciphertext.len();

        if let Err(e) = self.authoritative.set(store, identifier, payload, expiration).await {
            self.fast.remove(store, identifier);
            return Err(e);
        }

        if let Err(e) = self.fast.set(store, identifier, value.clone(), expiration, size) {
            self.fast.remove(store, identifier);
            return Err(e);
        }

        self.subscriptions.publish(store, identifier, Some(value));
        Ok(())
    }

    /// Removes from both tiers, then publishes `absent`.
    pub async fn remove(&self, store: &str, identifier: &str) -> Result<(), CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;

        self.fast.remove(store, identifier);
        self.authoritative.remove(store, identifier).await?;
        self.subscriptions.publish(store, identifier, None);
        Ok(())
    }

    /// Clears both tiers, then publishes `absent` for every previously
    /// subscribed (store, id).
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.fast.clear();
        self.authoritative.clear().await?;
        for (store, identifier) in self.subscriptions.subscribed_keys() {
            self.subscriptions.publish(&store, &identifier, None);
        }
        Ok(())
    }

    pub fn subscribe(
        &self,
        store: &str,
        identifier: &str,
        listener: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;
        Ok(self.subscriptions.subscribe(store, identifier, listener))
    }

    /// Bypasses A entirely: reads/writes go straight to F. Backs the
    /// dispatcher's "client" (fast-tier-only) mode.
    pub fn get_fast_only(&self, store: &str, identifier: &str) -> Result<CacheResult<Value>, CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;
        Ok(self.fast.get(store, identifier))
    }

    pub fn set_fast_only(
        &self,
        store: &str,
        identifier: &str,
        value: Value,
        expiration: SystemTime,
        size_hint: usize,
    ) -> Result<(), CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;
        self.fast.set(store, identifier, value, expiration, size_hint)
    }

    pub fn remove_fast_only(&self, store: &str, identifier: &str) -> Result<(), CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;
        self.fast.remove(store, identifier);
        Ok(())
    }

    /// Bypasses F entirely: reads/writes go straight to A via the codec.
    /// Backs the dispatcher's "server" (authoritative-only) mode.
    pub async fn get_authoritative_only(&self, store: &str, identifier: &str) -> Result<CacheResult<Value>, CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;
        let result = self.authoritative.get(store, identifier).await?;
        match result.value {
            Some(payload) => {
                let value = self.codec.decode(&payload).await?;
                Ok(CacheResult {
                    value: Some(value),
                    expiration: result.expiration,
                    last_updated: result.last_updated,
                    last_accessed: result.last_accessed,
                    get_hit_count: result.get_hit_count,
                    set_hit_count: result.set_hit_count,
                })
            }
            None => Ok(CacheResult::miss()),
        }
    }

    pub async fn set_authoritative_only(
        &self,
        store: &str,
        identifier: &str,
        value: Value,
        expiration: SystemTime,
    ) -> Result<(), CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;
        let payload = self.codec.encode(&value).await?;
        self.authoritative.set(store, identifier, payload, expiration).await
    }

    pub async fn remove_authoritative_only(&self, store: &str, identifier: &str) -> Result<(), CacheError> {
        validate_store_name(store)?;
        validate_identifier(identifier)?;
        self.authoritative.remove(store, identifier).await
    }

    pub async fn health_check(&self) -> bool {
        self.authoritative.health_check().await
    }

    /// Forces any pending batched authoritative writes to persist now,
    /// bypassing the timer. Exposed for the server-only mode's callers who
    /// need a read-your-writes guarantee without waiting on B's interval.
    pub async fn flush_authoritative(&self) -> Result<(), CacheError> {
        self.authoritative.flush().await
    }

    pub fn fast_stats(&self) -> crate::storage::StorageStats {
        self.fast.stats()
    }
}
