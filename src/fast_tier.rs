//! Fast tier (F): an in-process store of decoded, ready-to-serve entries.

use std::time::SystemTime;

use crate::config::EvictionPolicy;
use crate::storage::{CacheResult, StorageEngine};
use crate::value::Value;

/// Wraps a `StorageEngine<Value>` configured to accept past expirations —
/// the composer is responsible for interpreting those (§4.1).
pub struct FastTier {
    engine: StorageEngine<Value>,
}

impl FastTier {
    pub fn new(capacity: usize, max_entry_size: usize, eviction_policy: EvictionPolicy, prefetch_threshold: f64) -> Self {
        Self {
            engine: StorageEngine::new(capacity, max_entry_size, eviction_policy, prefetch_threshold, false),
        }
    }

    pub fn get(&self, store: &str, identifier: &str) -> CacheResult<Value> {
        self.engine.get(store, identifier)
    }

    pub fn set(
        &self,
        store: &str,
        identifier: &str,
        value: Value,
        expiration: SystemTime,
        size_bytes: usize,
    ) -> Result<(), crate::error::CacheError> {
        self.engine.set(store, identifier, value, expiration, size_bytes)
    }

    pub fn remove(&self, store: &str, identifier: &str) {
        self.engine.remove(store, identifier);
    }

    pub fn clear(&self) {
        self.engine.clear();
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    pub fn stats(&self) -> crate::storage::StorageStats {
        self.engine.stats()
    }

    pub fn iterate(&self) -> Vec<crate::storage::CacheEntry<Value>> {
        self.engine.iterate()
    }
}
