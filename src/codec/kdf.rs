//! Password-based key derivation (Argon2id) with a bounded, zeroizing cache.

use std::collections::VecDeque;

use argon2::{Algorithm, Argon2, Params, Version};
use parking_lot::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CacheError;

/// Cost parameters fixed at `SecureCodec` construction, per spec §4.2.
#[derive(Debug, Clone, Copy)]
pub struct KdfCost {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        Self {
            memory_cost_kib: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// A derived 256-bit key. Zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; 32],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey").field("bytes", &"[REDACTED]").finish()
    }
}

/// Derives a 256-bit key from (password, salt) via Argon2id.
pub fn derive_argon2id(password: &[u8], salt: &[u8], cost: KdfCost) -> Result<DerivedKey, CacheError> {
    let params = Params::new(cost.memory_cost_kib, cost.time_cost, cost.parallelism, Some(32))
        .map_err(|_| CacheError::EncryptionError)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut bytes = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut bytes)
        .map_err(|_| CacheError::EncryptionError)?;

    Ok(DerivedKey { bytes })
}

/// A small LRU cache over `salt -> DerivedKey`, bounded by entry count per
/// spec §5 ("the derivation cache uses an LRU bound by entry count").
/// Reuses the storage engine's tie-break-free eviction shape: plain
/// recency-ordered eviction, no ties to break since salts are unique.
pub struct DerivationCache {
    capacity: usize,
    inner: Mutex<VecDeque<(Vec<u8>, DerivedKey)>>,
}

impl DerivationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn get(&self, salt: &[u8]) -> Option<DerivedKey> {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.iter().position(|(s, _)| s == salt) {
            let (s, key) = inner.remove(pos).expect("position just found");
            inner.push_back((s, key.clone()));
            return Some(key);
        }
        None
    }

    pub fn insert(&self, salt: Vec<u8>, key: DerivedKey) {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            inner.pop_front();
        }
        inner.push_back((salt, key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_derive_the_same_key() {
        let cost = KdfCost {
            memory_cost_kib: 8 * 1024,
            time_cost: 1,
            parallelism: 1,
        };
        let salt = b"0123456789abcdef";
        let k1 = derive_argon2id(b"password", salt, cost).unwrap();
        let k2 = derive_argon2id(b"password", salt, cost).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn different_passwords_derive_different_keys() {
        let cost = KdfCost {
            memory_cost_kib: 8 * 1024,
            time_cost: 1,
            parallelism: 1,
        };
        let salt = b"0123456789abcdef";
        let k1 = derive_argon2id(b"password1", salt, cost).unwrap();
        let k2 = derive_argon2id(b"password2", salt, cost).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn derived_key_debug_redacts_bytes() {
        let key = DerivedKey { bytes: [7u8; 32] };
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn cache_evicts_oldest_beyond_capacity() {
        let cache = DerivationCache::new(2);
        let k = DerivedKey { bytes: [1u8; 32] };
        cache.insert(b"a".to_vec(), k.clone());
        cache.insert(b"b".to_vec(), k.clone());
        cache.insert(b"c".to_vec(), k.clone());
        assert!(cache.get(b"a").is_none());
        assert!(cache.get(b"b").is_some());
        assert!(cache.get(b"c").is_some());
    }
}
