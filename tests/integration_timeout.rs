//! Integration tests for the authoritative-tier deadline (§5): a backend
//! call that exceeds `authoritative_timeout` fails with `CacheError::Timeout`
//! and, on a two-layer write, rolls back the fast-tier entry it would have
//! populated (§4.4).

mod common;

use secure_tiered_cache::backend::InMemoryBackend;
use secure_tiered_cache::{CacheEngine, CacheError, Configuration, Deployment, Environment, EvictionPolicy, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn future() -> SystemTime {
    SystemTime::now() + Duration::from_secs(3600)
}

/// A backend whose `set` never returns in time, used to force the
/// authoritative-tier deadline to expire deterministically.
struct HangingBackend {
    inner: InMemoryBackend,
}

#[async_trait::async_trait]
impl secure_tiered_cache::AuthoritativeBackend for HangingBackend {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.inner.remove(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear().await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

fn config() -> Configuration {
    Configuration::new(
        100,
        Duration::from_secs(3600),
        Duration::from_secs(3600),
        10 * 1024 * 1024,
        EvictionPolicy::Lru,
        0.5,
        6,
        "aes-256-gcm",
        256,
        // batch_size=1 so `set` triggers an immediate flush, reaching the
        // hanging backend synchronously inside the call instead of waiting
        // on the background timer.
        1,
        Duration::from_secs(60),
        Duration::from_secs(300),
        Duration::from_secs(86400),
        false,
        Some("timeout-password".to_string()),
        Environment::Server,
        Deployment::NonProduction,
        Duration::from_secs(3600),
        // batch_timeout is the deadline that actually bounds the hanging
        // `set` call inside the immediate flush.
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn a_slow_authoritative_write_times_out_and_rolls_back_the_fast_tier() {
    let backend = Arc::new(HangingBackend {
        inner: InMemoryBackend::new(),
    });
    let engine = CacheEngine::with_backend(config(), backend).await.unwrap();

    let err = engine
        .set("k", "s", Value::String("v".to_string()), "two-layer", future())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Timeout(_)));

    assert!(engine.get("k", "s", "client").await.unwrap().value.is_none());
}
