//! Codec pipeline (C): serialize → compress → encrypt, and back.
//!
//! Pure transform plus a key-derivation cache; no other state.

pub mod aead;
pub mod compression;
pub mod kdf;

use std::time::Duration;

use crate::error::CacheError;
use crate::value::Value;
use kdf::{DerivationCache, KdfCost};

/// The opaque on-wire form produced by the codec. Every successful encrypt
/// yields a fresh random `iv` and `salt`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; aead::NONCE_SIZE],
    pub salt: [u8; aead::SALT_SIZE],
    pub auth_tag: [u8; 16],
}

impl EncryptedPayload {
    /// Layout: salt(16) | iv(12) | auth_tag(16) | ciphertext(rest). Used for
    /// the authoritative tier's persisted state (§6).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + 12 + 16 + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.auth_tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.len() < 16 + 12 + 16 {
            return Err(CacheError::DecryptionError);
        }
        let (salt, rest) = bytes.split_at(16);
        let (iv, rest) = rest.split_at(12);
        let (auth_tag, ciphertext) = rest.split_at(16);
        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            iv: iv.try_into().map_err(|_| CacheError::DecryptionError)?,
            salt: salt.try_into().map_err(|_| CacheError::DecryptionError)?,
            auth_tag: auth_tag.try_into().map_err(|_| CacheError::DecryptionError)?,
        })
    }
}

/// Encode/decode pipeline bound to a single password and fixed KDF cost.
pub struct SecureCodec {
    password: String,
    compression_level: u32,
    cost: KdfCost,
    derivation_cache: DerivationCache,
    kdf_timeout: Duration,
}

const DERIVATION_CACHE_CAPACITY: usize = 256;

impl SecureCodec {
    pub fn new(password: String, compression_level: u32, cost: KdfCost, kdf_timeout: Duration) -> Self {
        Self {
            password,
            compression_level,
            cost,
            derivation_cache: DerivationCache::new(DERIVATION_CACHE_CAPACITY),
            kdf_timeout,
        }
    }

    /// Argon2id is CPU-bound and can take tens of milliseconds at production
    /// cost parameters, so derivation runs on the blocking pool, bounded by
    /// `kdf_timeout` (§5).
    async fn derive_key(&self, salt: &[u8; aead::SALT_SIZE]) -> Result<kdf::DerivedKey, CacheError> {
        if let Some(key) = self.derivation_cache.get(salt) {
            return Ok(key);
        }

        let password = self.password.clone();
        let salt_owned = *salt;
        let cost = self.cost;
        let derived = tokio::time::timeout(
            self.kdf_timeout,
            tokio::task::spawn_blocking(move || kdf::derive_argon2id(password.as_bytes(), &salt_owned, cost)),
        )
        .await
        .map_err(|_| CacheError::Timeout(self.kdf_timeout))?
        .map_err(|_| CacheError::StorageError("kdf worker task panicked".to_string()))??;

        self.derivation_cache.insert(salt.to_vec(), derived.clone());
        Ok(derived)
    }

    /// serialize(Value) → JSON → compress → encrypt.
    pub async fn encode(&self, value: &Value) -> Result<EncryptedPayload, CacheError> {
        let json = serde_json::to_vec(value)
            .map_err(|e| CacheError::InvalidValue(format!("serialization failed: {e}")))?;
        let compressed = compression::compress(&json, self.compression_level)?;

        let salt = aead::generate_salt();
        let key = self.derive_key(&salt).await?;
        let nonce = aead::generate_nonce();

        let ciphertext_with_tag = aead::encrypt(key.as_bytes(), &nonce, &compressed)?;
        if ciphertext_with_tag.len() < 16 {
            return Err(CacheError::EncryptionError);
        }
        let split_at = ciphertext_with_tag.len() - 16;
        let (ciphertext, auth_tag) = ciphertext_with_tag.split_at(split_at);

        Ok(EncryptedPayload {
            ciphertext: ciphertext.to_vec(),
            iv: nonce,
            salt,
            auth_tag: auth_tag.try_into().map_err(|_| CacheError::EncryptionError)?,
        })
    }

    /// decrypt (verifying auth-tag) → decompress → deserialize.
    ///
    /// A wrong password, or any integrity failure, returns `DecryptionError`
    /// rather than garbage data.
    pub async fn decode(&self, payload: &EncryptedPayload) -> Result<Value, CacheError> {
        let key = self.derive_key(&payload.salt).await?;

        let mut ciphertext_with_tag = payload.ciphertext.clone();
        ciphertext_with_tag.extend_from_slice(&payload.auth_tag);

        let compressed = aead::decrypt(key.as_bytes(), &payload.iv, &ciphertext_with_tag)?;
        let json = compression::decompress(&compressed)?;

        serde_json::from_slice(&json).map_err(|_| CacheError::DecryptionError)
    }
}
