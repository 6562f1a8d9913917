//! Authoritative tier (A): always stores codec-transformed payloads and
//! owns the batch writer that amortizes writes to the durable backend.
//!
//! Per-entry metadata — last-updated, last-accessed, get/set hit counts
//! (§3, §6) — is tracked by an in-process `StorageEngine<EncryptedPayload>`,
//! the same machinery the fast tier uses. The durable backend underneath it
//! (in-memory or Redis) remains the source of truth for bytes across
//! process restarts and cross-instance reads; the local engine is populated
//! on every set and on every backend-fallback read.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::backend::AuthoritativeBackend;
use crate::batch::BatchWriter;
use crate::codec::EncryptedPayload;
use crate::config::EvictionPolicy;
use crate::error::CacheError;
use crate::storage::{CacheResult, StorageEngine};

fn compose_key(store: &str, identifier: &str) -> String {
    format!("{store}:{identifier}")
}

pub struct AuthoritativeTier {
    entries: StorageEngine<EncryptedPayload>,
    backend: Arc<dyn AuthoritativeBackend>,
    batch_writer: BatchWriter,
    default_ttl: Duration,
    authoritative_timeout: Duration,
}

impl AuthoritativeTier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<dyn AuthoritativeBackend>,
        capacity: usize,
        max_entry_size: usize,
        eviction_policy: EvictionPolicy,
        prefetch_threshold: f64,
        batch_size: usize,
        persistence_interval: Duration,
        default_ttl: Duration,
        authoritative_timeout: Duration,
        batch_timeout: Duration,
    ) -> Self {
        let batch_writer = BatchWriter::new(backend.clone(), batch_size, persistence_interval, batch_timeout);
        Self {
            entries: StorageEngine::new(capacity, max_entry_size, eviction_policy, prefetch_threshold, true),
            backend,
            batch_writer,
            default_ttl,
            authoritative_timeout,
        }
    }

    /// Checks the local metadata cache first. On miss, reads through to the
    /// durable backend, decodes, populates the local cache (so counters
    /// start accumulating from here on), and returns the freshly-populated
    /// entry.
    pub async fn get(&self, store: &str, identifier: &str) -> Result<CacheResult<EncryptedPayload>, CacheError> {
        let local = self.entries.get(store, identifier);
        if local.is_hit() {
            return Ok(local);
        }

        let key = compose_key(store, identifier);
        let fetched = tokio::time::timeout(self.authoritative_timeout, self.backend.get(&key))
            .await
            .map_err(|_| CacheError::Timeout(self.authoritative_timeout))??;

        match fetched {
            Some((bytes, ttl)) => {
                let payload = EncryptedPayload::from_bytes(&bytes)?;
                let expiration = SystemTime::now() + ttl.unwrap_or(self.default_ttl);
                self.entries.set(store, identifier, payload, expiration, bytes.len())?;
                Ok(self.entries.get(store, identifier))
            }
            None => Ok(CacheResult::miss()),
        }
    }

    /// Populates the local metadata cache immediately (so an in-process
    /// read-after-write observes real counters without waiting on B), then
    /// submits the payload to the batch writer for durable persistence.
    /// Rejects past expirations (authoritative-tier-only rule, §4.1) and
    /// oversized payloads — both enforced by the local engine itself.
    pub async fn set(
        &self,
        store: &str,
        identifier: &str,
        payload: EncryptedPayload,
        expiration: SystemTime,
    ) -> Result<(), CacheError> {
        let bytes = payload.to_bytes();
        self.entries.set(store, identifier, payload, expiration, bytes.len())?;

        let now = SystemTime::now();
        let ttl = expiration.duration_since(now).unwrap_or(Duration::from_secs(1));
        let key = compose_key(store, identifier);
        self.batch_writer.add(key, bytes, ttl).await
    }

    pub async fn remove(&self, store: &str, identifier: &str) -> Result<(), CacheError> {
        self.entries.remove(store, identifier);
        let key = compose_key(store, identifier);
        tokio::time::timeout(self.authoritative_timeout, self.backend.remove(&key))
            .await
            .map_err(|_| CacheError::Timeout(self.authoritative_timeout))?
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        tokio::time::timeout(self.authoritative_timeout, self.backend.clear())
            .await
            .map_err(|_| CacheError::Timeout(self.authoritative_timeout))?
    }

    pub async fn health_check(&self) -> bool {
        tokio::time::timeout(self.authoritative_timeout, self.backend.health_check())
            .await
            .unwrap_or(false)
    }

    /// Flushes any pending batched writes immediately.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.batch_writer.flush().await
    }

    /// Stops the batch writer: final flush, then `WriterStopped` for any
    /// further writes.
    pub async fn stop(&self) -> Result<(), CacheError> {
        self.batch_writer.stop().await
    }
}
