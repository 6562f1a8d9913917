//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Engine construction with a fixed password and an in-memory backend
//! - Test data generators
//! - A polling helper for timer-driven behaviour (the batch writer)

use secure_tiered_cache::{CacheEngine, Configuration, Deployment, Environment, EvictionPolicy};
use std::time::Duration;

/// Create a unique test key to avoid collisions between tests sharing the
/// same process.
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Builds an engine with a small cache size, a short batch interval, and a
/// fixed password, suitable for deterministic tests.
pub async fn build_engine(cache_size: usize) -> CacheEngine {
    build_engine_with_password(cache_size, "integration-test-password").await
}

pub async fn build_engine_with_password(cache_size: usize, password: &str) -> CacheEngine {
    let config = Configuration::new(
        cache_size,
        Duration::from_secs(3600),
        Duration::from_secs(3600),
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
        Some(password.to_string()),
        Environment::Server,
        Deployment::NonProduction,
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .expect("valid configuration");
    CacheEngine::new(config).await.expect("engine builds")
}

/// Generate test data of various shapes.
pub mod test_data {
    use secure_tiered_cache::Value;
    use std::collections::HashMap;

    pub fn small_string() -> Value {
        Value::String("hello".to_string())
    }

    pub fn large_string(size: usize) -> Value {
        Value::String("a".repeat(size))
    }

    pub fn user_hash(id: u64) -> Value {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), Value::Number(id as f64));
        fields.insert("name".to_string(), Value::String(format!("User {id}")));
        Value::Hash(fields)
    }
}

/// Wait for a condition with timeout, polling every 10ms. Used for the
/// batch writer's background flush, which runs on its own timer.
pub async fn wait_for<F>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    use tokio::time::{sleep, Duration as TokioDuration};

    let start = std::time::Instant::now();
    let timeout = TokioDuration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(TokioDuration::from_millis(10)).await;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation_is_unique() {
        let k1 = test_key("user");
        let k2 = test_key("user");
        assert_ne!(k1, k2);
        assert!(k1.starts_with("test_user_"));
    }
}
