//! Batch writer (B): amortizes authoritative-tier write cost.
//!
//! Background timer loop grounded on `invalidation.rs`'s
//! `InvalidationSubscriber::start` — a spawned task selecting between a
//! timer tick and a broadcast shutdown signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::backend::AuthoritativeBackend;
use crate::error::CacheError;

struct PendingEntry {
    payload: Vec<u8>,
    ttl: Duration,
}

struct Inner {
    backend: Arc<dyn AuthoritativeBackend>,
    pending: dashmap::DashMap<String, PendingEntry>,
    batch_size: usize,
    stopped: AtomicBool,
    flush_lock: Mutex<()>,
    shutdown_tx: broadcast::Sender<()>,
    operation_timeout: Duration,
}

/// Accumulates authoritative-tier writes and flushes them by size or timer.
pub struct BatchWriter {
    inner: Arc<Inner>,
}

impl BatchWriter {
    pub fn new(
        backend: Arc<dyn AuthoritativeBackend>,
        batch_size: usize,
        flush_interval: Duration,
        operation_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let inner = Arc::new(Inner {
            backend,
            pending: dashmap::DashMap::new(),
            batch_size,
            stopped: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
            shutdown_tx,
            operation_timeout,
        });

        let task_inner = inner.clone();
        let mut shutdown_rx = task_inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_interval);
            interval.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = Self::flush_inner(&task_inner).await {
                            tracing::warn!(error = %e, "scheduled batch flush reported an error");
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self { inner }
    }

    /// Appends to the pending map (key-collapsing). Flushes immediately if
    /// the pending map has reached the configured batch size.
    pub async fn add(&self, key: String, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return Err(CacheError::WriterStopped);
        }
        self.inner.pending.insert(key, PendingEntry { payload, ttl });
        if self.inner.pending.len() >= self.inner.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Persists the whole pending map. Successfully persisted keys are
    /// removed regardless of sibling failures; the first failure is
    /// returned to the caller.
    pub async fn flush(&self) -> Result<(), CacheError> {
        Self::flush_inner(&self.inner).await
    }

    /// Subscribes to the shutdown broadcast before doing any work, so a
    /// `stop()` call that sends its shutdown signal *after* this subscribe
    /// cancels this flush, while `stop()`'s own final flush — which
    /// subscribes only after sending — never observes its own signal.
    async fn flush_inner(inner: &Arc<Inner>) -> Result<(), CacheError> {
        let mut cancel_rx = inner.shutdown_tx.subscribe();
        if cancel_rx.try_recv().is_ok() {
            return Err(CacheError::Cancelled);
        }

        let _guard = inner.flush_lock.lock().await;

        let keys: Vec<String> = inner.pending.iter().map(|e| e.key().clone()).collect();
        let mut first_err = None;

        for key in keys {
            let entry = inner.pending.get(&key).map(|e| (e.payload.clone(), e.ttl));
            let Some((payload, ttl)) = entry else {
                continue;
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel_rx.recv() => Err(CacheError::Cancelled),
                r = tokio::time::timeout(inner.operation_timeout, inner.backend.set(&key, payload, ttl)) => {
                    r.map_err(|_| CacheError::Timeout(inner.operation_timeout)).and_then(|inner_result| inner_result)
                }
            };

            match outcome {
                Ok(()) => {
                    inner.pending.remove(&key);
                }
                Err(CacheError::Cancelled) => return Err(CacheError::Cancelled),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Cancels the timer and performs a final flush. Adds after this fail
    /// with `WriterStopped`.
    pub async fn stop(&self) -> Result<(), CacheError> {
        self.inner.stopped.store(true, Ordering::Release);
        let _ = self.inner.shutdown_tx.send(());
        Self::flush_inner(&self.inner).await
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    #[tokio::test]
    async fn add_below_batch_size_does_not_flush_immediately() {
        let backend = Arc::new(InMemoryBackend::new());
        let writer = BatchWriter::new(backend.clone(), 10, Duration::from_secs(3600), Duration::from_secs(5));
        writer.add("k".to_string(), b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(writer.pending_len(), 1);
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reaching_batch_size_flushes() {
        let backend = Arc::new(InMemoryBackend::new());
        let writer = BatchWriter::new(backend.clone(), 2, Duration::from_secs(3600), Duration::from_secs(5));
        writer.add("a".to_string(), b"1".to_vec(), Duration::from_secs(60)).await.unwrap();
        writer.add("b".to_string(), b"2".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(writer.pending_len(), 0);
        assert!(backend.get("a").await.unwrap().is_some());
        assert!(backend.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn key_collapsing_keeps_latest_add() {
        let backend = Arc::new(InMemoryBackend::new());
        let writer = BatchWriter::new(backend.clone(), 10, Duration::from_secs(3600), Duration::from_secs(5));
        writer.add("k".to_string(), b"first".to_vec(), Duration::from_secs(60)).await.unwrap();
        writer.add("k".to_string(), b"second".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(writer.pending_len(), 1);
        writer.flush().await.unwrap();
        let (value, _) = backend.get("k").await.unwrap().unwrap();
        assert_eq!(value, b"second");
    }

    #[tokio::test]
    async fn stop_flushes_and_rejects_further_adds() {
        let backend = Arc::new(InMemoryBackend::new());
        let writer = BatchWriter::new(backend.clone(), 10, Duration::from_secs(3600), Duration::from_secs(5));
        writer.add("k".to_string(), b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        writer.stop().await.unwrap();
        assert!(backend.get("k").await.unwrap().is_some());
        assert!(matches!(
            writer.add("k2".to_string(), b"v".to_vec(), Duration::from_secs(60)).await,
            Err(CacheError::WriterStopped)
        ));
    }

    struct SlowBackend {
        inner: InMemoryBackend,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl AuthoritativeBackend for SlowBackend {
        async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, Option<Duration>)>, CacheError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
            tokio::time::sleep(self.delay).await;
            self.inner.set(key, value, ttl).await
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

    #[tokio::test]
    async fn slow_set_exceeding_operation_timeout_is_reported() {
        let backend = Arc::new(SlowBackend {
            inner: InMemoryBackend::new(),
            delay: Duration::from_millis(50),
        });
        let writer = BatchWriter::new(backend, 1, Duration::from_secs(3600), Duration::from_millis(5));
        let err = writer
            .add("k".to_string(), b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Timeout(_)));
    }

    #[tokio::test]
    async fn concurrent_stop_cancels_an_in_flight_flush() {
        let backend = Arc::new(SlowBackend {
            inner: InMemoryBackend::new(),
            delay: Duration::from_millis(50),
        });
        let writer = Arc::new(BatchWriter::new(
            backend.clone(),
            1,
            Duration::from_secs(3600),
            Duration::from_secs(5),
        ));

        let writer_clone = writer.clone();
        let in_flight = tokio::spawn(async move {
            writer_clone
                .add("k".to_string(), b"v".to_vec(), Duration::from_secs(60))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        writer.stop().await.unwrap();

        let result = in_flight.await.unwrap();
        assert!(matches!(result, Err(CacheError::Cancelled)));
        assert!(backend.get("k").await.unwrap().is_some());
    }
}
