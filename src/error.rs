//! Error taxonomy for the cache core.
//!
//! Construction-time errors (bad configuration options) and operational
//! errors (storage, codec, timeout) are both represented here so callers see
//! a single `Result` type across the public surface.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// All error kinds surfaced by the cache core.
///
/// Codec errors never include plaintext or key material in their message.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid store name: {0}")]
    InvalidStoreName(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid value type: {0}")]
    InvalidValueType(String),

    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),

    #[error("invalid cache mode: {0}")]
    InvalidCacheMode(String),

    #[error("invalid algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("invalid key size: {0}")]
    InvalidKeySize(String),

    #[error("invalid eviction policy: {0}")]
    InvalidEvictionPolicy(String),

    #[error("invalid compression level: {0}")]
    InvalidCompressionLevel(String),

    #[error("invalid cache size: {0}")]
    InvalidCacheSize(String),

    #[error("invalid cache max age: {0}")]
    InvalidCacheMaxAge(String),

    #[error("invalid persistence interval: {0}")]
    InvalidPersistenceInterval(String),

    #[error("invalid max memory usage: {0}")]
    InvalidMaxMemoryUsage(String),

    #[error("invalid prefetch threshold: {0}")]
    InvalidPrefetchThreshold(String),

    #[error("invalid batch size: {0}")]
    InvalidBatchSize(String),

    #[error("invalid auto-tune interval: {0}")]
    InvalidAutoTuneInterval(String),

    #[error("invalid key-check interval: {0}")]
    InvalidKeyCheckInterval(String),

    #[error("invalid key-rotation interval: {0}")]
    InvalidKeyRotationInterval(String),

    #[error("invalid server storage: {0}")]
    InvalidServerStorage(String),

    #[error("invalid authoritative-tier timeout: {0}")]
    InvalidAuthoritativeTimeout(String),

    #[error("invalid batch-flush timeout: {0}")]
    InvalidBatchTimeout(String),

    #[error("invalid kdf timeout: {0}")]
    InvalidKdfTimeout(String),

    #[error("value too large: {size} bytes exceeds max of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("batch writer has been stopped")]
    WriterStopped,

    #[error("encryption failed")]
    EncryptionError,

    #[error("decryption failed: integrity check did not pass")]
    DecryptionError,

    #[error("subscriptions are not supported for this cache mode")]
    SubscriptionError,
}
