//! Frozen engine configuration, validated eagerly at construction.

use std::time::Duration;

use crate::error::CacheError;

/// Eviction policy selectable in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    Lru,
    Lfu,
    Adaptive,
}

impl EvictionPolicy {
    pub fn parse(s: &str) -> Result<Self, CacheError> {
        match s {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(CacheError::InvalidEvictionPolicy(other.to_string())),
        }
    }
}

/// The mode the dispatcher selects among; the composer only implements
/// `TwoLayer`. The other variants exist so `InvalidCacheMode`/
/// `SubscriptionError` can be reported consistently from inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Server,
    Client,
    Cookie,
    TwoLayer,
}

impl CacheMode {
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        match raw {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            "cookie" => Ok(Self::Cookie),
            "two-layer" => Ok(Self::TwoLayer),
            other => Err(CacheError::InvalidCacheMode(other.to_string())),
        }
    }
}

/// Capability flag supplied at construction, replacing a `window`-probe
/// style environment detection (see Design Notes). Heuristics for choosing
/// this value belong to the external dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Client,
    Server,
}

/// Non-production fallback marker for `encryption-password` resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Production,
    NonProduction,
}

const DEV_ONLY_PASSWORD: &str = "dev-only-insecure-password";

/// Options recognized by the engine constructor (§6).
#[derive(Debug, Clone)]
pub struct Configuration {
    pub cache_size: usize,
    pub cache_max_age: Duration,
    pub persistence_interval: Duration,
    pub max_memory_usage: usize,
    pub eviction_policy: EvictionPolicy,
    pub prefetch_threshold: f64,
    pub compression_level: u32,
    pub algorithm: String,
    pub key_size: u32,
    pub batch_size: usize,
    pub auto_tune_interval: Duration,
    pub key_check_interval: Duration,
    pub key_rotation_interval: Duration,
    pub force_reset: bool,
    pub encryption_password: String,
    pub environment: Environment,
    /// Deadline for a single authoritative-backend round trip (get/remove/
    /// clear/health_check), independent of the batch-flush deadline (§5).
    pub authoritative_timeout: Duration,
    /// Deadline for persisting one pending entry during a batch flush.
    pub batch_timeout: Duration,
    /// Deadline for one Argon2id derivation.
    pub kdf_timeout: Duration,
}

impl Configuration {
    /// Builds a configuration, reading `ENCRYPTION_PASSWORD` from the
    /// process environment when `encryption_password` is omitted, and
    /// validates it eagerly, reporting the first offending option.
    pub fn new(
        cache_size: usize,
        cache_max_age: Duration,
        persistence_interval: Duration,
        max_memory_usage: usize,
        eviction_policy: EvictionPolicy,
        prefetch_threshold: f64,
        compression_level: u32,
        algorithm: impl Into<String>,
        key_size: u32,
        batch_size: usize,
        auto_tune_interval: Duration,
        key_check_interval: Duration,
        key_rotation_interval: Duration,
        force_reset: bool,
        encryption_password: Option<String>,
        environment: Environment,
        deployment: Deployment,
        authoritative_timeout: Duration,
        batch_timeout: Duration,
        kdf_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let encryption_password = encryption_password
            .or_else(|| std::env::var("ENCRYPTION_PASSWORD").ok())
            .unwrap_or_else(|| match deployment {
                Deployment::NonProduction => DEV_ONLY_PASSWORD.to_string(),
                Deployment::Production => String::new(),
            });

        let config = Self {
            cache_size,
            cache_max_age,
            persistence_interval,
            max_memory_usage,
            eviction_policy,
            prefetch_threshold,
            compression_level,
            algorithm: algorithm.into(),
            key_size,
            batch_size,
            auto_tune_interval,
            key_check_interval,
            key_rotation_interval,
            force_reset,
            encryption_password,
            environment,
            authoritative_timeout,
            batch_timeout,
            kdf_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates every option, returning the first offending one.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.cache_size == 0 {
            return Err(CacheError::InvalidCacheSize(
                "must be greater than 0".to_string(),
            ));
        }
        if self.cache_max_age.is_zero() {
            return Err(CacheError::InvalidCacheMaxAge(
                "must be greater than 0".to_string(),
            ));
        }
        if self.persistence_interval.is_zero() {
            return Err(CacheError::InvalidPersistenceInterval(
                "must be greater than 0".to_string(),
            ));
        }
        if self.max_memory_usage == 0 {
            return Err(CacheError::InvalidMaxMemoryUsage(
                "must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.prefetch_threshold) {
            return Err(CacheError::InvalidPrefetchThreshold(format!(
                "{} is not in [0,1]",
                self.prefetch_threshold
            )));
        }
        if self.compression_level > 9 {
            return Err(CacheError::InvalidCompressionLevel(format!(
                "{} is not in 0..=9",
                self.compression_level
            )));
        }
        if self.algorithm != "aes-256-gcm" {
            return Err(CacheError::InvalidAlgorithm(self.algorithm.clone()));
        }
        if self.key_size != 256 {
            return Err(CacheError::InvalidKeySize(self.key_size.to_string()));
        }
        if self.batch_size == 0 {
            return Err(CacheError::InvalidBatchSize(
                "must be greater than 0".to_string(),
            ));
        }
        if self.auto_tune_interval.is_zero() {
            return Err(CacheError::InvalidAutoTuneInterval(
                "must be greater than 0".to_string(),
            ));
        }
        if self.key_check_interval.is_zero() {
            return Err(CacheError::InvalidKeyCheckInterval(
                "must be greater than 0".to_string(),
            ));
        }
        if self.key_rotation_interval.is_zero() {
            return Err(CacheError::InvalidKeyRotationInterval(
                "must be greater than 0".to_string(),
            ));
        }
        if self.authoritative_timeout.is_zero() {
            return Err(CacheError::InvalidAuthoritativeTimeout(
                "must be greater than 0".to_string(),
            ));
        }
        if self.batch_timeout.is_zero() {
            return Err(CacheError::InvalidBatchTimeout(
                "must be greater than 0".to_string(),
            ));
        }
        if self.kdf_timeout.is_zero() {
            return Err(CacheError::InvalidKdfTimeout(
                "must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(
            10_000,
            Duration::from_secs(3600),
            Duration::from_secs(5),
            10 * 1024 * 1024,
            EvictionPolicy::Lru,
            0.5,
            6,
            "aes-256-gcm",
            256,
            100,
            Duration::from_secs(60),
            Duration::from_secs(300),
            Duration::from_secs(86400),
            false,
            None,
            Environment::Server,
            Deployment::NonProduction,
            Duration::from_secs(2),
            Duration::from_secs(5),
            Duration::from_millis(500),
        )
        .expect("default configuration must be valid")
    }
}
