//! The bounded, TTL-aware, eviction-enforcing storage engine (S).
//!
//! One `StorageEngine<V>` instance backs each tier. The fast tier holds
//! decoded `Value`s; the authoritative tier holds `EncryptedPayload` bytes.
//! Both share this module's eviction and TTL machinery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::EvictionPolicy;
use crate::error::CacheError;

/// A key uniquely identifying an entry within one tier: (store, identifier).
pub type EntryKey = (String, String);

/// A record owned by a storage engine.
#[derive(Debug, Clone)]
pub struct CacheEntry<V: Clone> {
    pub identifier: String,
    pub store: String,
    pub value: V,
    pub expiration: SystemTime,
    pub last_updated: SystemTime,
    pub last_accessed: SystemTime,
    pub get_hit_count: u64,
    pub set_hit_count: u64,
    pub size_bytes: usize,
}

impl<V: Clone> CacheEntry<V> {
    fn is_live(&self, now: SystemTime) -> bool {
        self.expiration > now
    }
}

/// The read-side projection returned to callers. A miss is the sentinel with
/// `value: None` and all counters/instants zeroed to the Unix epoch.
#[derive(Debug, Clone)]
pub struct CacheResult<V: Clone> {
    pub value: Option<V>,
    pub expiration: SystemTime,
    pub last_updated: SystemTime,
    pub last_accessed: SystemTime,
    pub get_hit_count: u64,
    pub set_hit_count: u64,
}

impl<V: Clone> CacheResult<V> {
    pub fn miss() -> Self {
        Self {
            value: None,
            expiration: SystemTime::UNIX_EPOCH,
            last_updated: SystemTime::UNIX_EPOCH,
            last_accessed: SystemTime::UNIX_EPOCH,
            get_hit_count: 0,
            set_hit_count: 0,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.value.is_some()
    }
}

impl<V: Clone> From<&CacheEntry<V>> for CacheResult<V> {
    fn from(entry: &CacheEntry<V>) -> Self {
        Self {
            value: Some(entry.value.clone()),
            expiration: entry.expiration,
            last_updated: entry.last_updated,
            last_accessed: entry.last_accessed,
            get_hit_count: entry.get_hit_count,
            set_hit_count: entry.set_hit_count,
        }
    }
}

/// Point-in-time counters, read without locking the entry map.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Default)]
struct AtomicStorageStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
}

/// A bounded, TTL-aware associative store for one tier.
///
/// `enforce_future_expiration` distinguishes the authoritative tier (rejects
/// past expirations with `InvalidExpiration`) from the fast tier (accepts
/// them — the composer owns that interpretation, per §4.1).
pub struct StorageEngine<V: Clone + Send + Sync + 'static> {
    entries: DashMap<EntryKey, CacheEntry<V>>,
    capacity: usize,
    max_entry_size: usize,
    eviction_policy: EvictionPolicy,
    prefetch_threshold: f64,
    enforce_future_expiration: bool,
    structural_lock: Mutex<()>,
    stats: AtomicStorageStats,
}

impl<V: Clone + Send + Sync + 'static> StorageEngine<V> {
    pub fn new(
        capacity: usize,
        max_entry_size: usize,
        eviction_policy: EvictionPolicy,
        prefetch_threshold: f64,
        enforce_future_expiration: bool,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            max_entry_size,
            eviction_policy,
            prefetch_threshold,
            enforce_future_expiration,
            structural_lock: Mutex::new(()),
            stats: AtomicStorageStats::default(),
        }
    }

    /// Creates or replaces an entry. Evicts one entry first if the engine is
    /// at capacity and the key is new. set-hit-count resets to 1 on replace
    /// (see DESIGN.md for the Open Question this resolves).
    pub fn set(
        &self,
        store: &str,
        identifier: &str,
        value: V,
        expiration: SystemTime,
        size_bytes: usize,
    ) -> Result<(), CacheError> {
        if size_bytes > self.max_entry_size {
            return Err(CacheError::ValueTooLarge {
                size: size_bytes,
                max: self.max_entry_size,
            });
        }
        if self.enforce_future_expiration && expiration <= SystemTime::now() {
            return Err(CacheError::InvalidExpiration(
                "expiration must be in the future".to_string(),
            ));
        }

        let key = (store.to_string(), identifier.to_string());
        let now = SystemTime::now();

        let _guard = self.structural_lock.lock();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_one();
        }

        let get_hit_count = self
            .entries
            .get(&key)
            .map(|existing| existing.get_hit_count)
            .unwrap_or(0);

        self.entries.insert(
            key.clone(),
            CacheEntry {
                identifier: identifier.to_string(),
                store: store.to_string(),
                value,
                expiration,
                last_updated: now,
                last_accessed: now,
                get_hit_count,
                set_hit_count: 1,
                size_bytes,
            },
        );
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Returns a hit with incremented get-hit-count/updated last-accessed,
    /// or the miss sentinel. An expired entry is removed in place and never
    /// increments counters.
    pub fn get(&self, store: &str, identifier: &str) -> CacheResult<V> {
        let key = (store.to_string(), identifier.to_string());
        let now = SystemTime::now();

        if let Some(mut entry) = self.entries.get_mut(&key) {
            if entry.is_live(now) {
                entry.get_hit_count += 1;
                entry.last_accessed = now;
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return CacheResult::from(&*entry);
            }
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return CacheResult::miss();
        }

        // Entry existed but was expired: drop the borrow before removing.
        self.entries.remove(&key);
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        CacheResult::miss()
    }

    /// Deletes the entry if present. Idempotent.
    pub fn remove(&self, store: &str, identifier: &str) {
        let key = (store.to_string(), identifier.to_string());
        self.entries.remove(&key);
    }

    /// Deletes every entry in every store.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Snapshot of all live entries, for eviction diagnostics and
    /// subscription fan-out on `clear()`. Order is unspecified.
    pub fn iterate(&self) -> Vec<CacheEntry<V>> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            sets: self.stats.sets.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Must be called with `structural_lock` held. Removes exactly one
    /// entry chosen by the configured eviction policy, tie-broken by oldest
    /// `last_updated` then lexicographic (store, identifier).
    fn evict_one(&self) {
        let policy = self.resolve_adaptive_policy();

        let mut candidates: Vec<(EntryKey, SystemTime, u64, SystemTime)> = self
            .entries
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    e.last_accessed,
                    e.get_hit_count,
                    e.last_updated,
                )
            })
            .collect();

        if candidates.is_empty() {
            return;
        }

        candidates.sort_by(|a, b| {
            let primary = match policy {
                EvictionPolicy::Lru => a.1.cmp(&b.1),
                EvictionPolicy::Lfu => a.2.cmp(&b.2),
                EvictionPolicy::Adaptive => unreachable!("resolved above"),
            };
            primary.then_with(|| a.3.cmp(&b.3)).then_with(|| a.0.cmp(&b.0))
        });

        if let Some((victim, ..)) = candidates.into_iter().next() {
            self.entries.remove(&victim);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn resolve_adaptive_policy(&self) -> EvictionPolicy {
        match self.eviction_policy {
            EvictionPolicy::Adaptive => {
                let hits = self.stats.hits.load(Ordering::Relaxed);
                let misses = self.stats.misses.load(Ordering::Relaxed);
                let total = hits + misses;
                let hit_rate = if total == 0 {
                    0.0
                } else {
                    hits as f64 / total as f64
                };
                if hit_rate >= self.prefetch_threshold {
                    EvictionPolicy::Lfu
                } else {
                    EvictionPolicy::Lru
                }
            }
            other => other,
        }
    }
}
