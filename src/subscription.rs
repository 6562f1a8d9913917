//! Subscription bus (Σ): per-(store, id) listener fan-out.
//!
//! The listener table is copy-on-write (cloned under a read, swapped under
//! a write) so `publish` never holds a lock across listener invocation,
//! per §5's shared-resource policy.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::value::Value;

type Listener = Arc<dyn Fn(Option<Value>) + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    id: u64,
    listener: Listener,
}

struct Inner {
    registry: RwLock<HashMap<(String, String), Arc<Vec<ListenerEntry>>>>,
    next_id: AtomicU64,
}

/// Delivers state-change notifications to registered listeners.
#[derive(Clone)]
pub struct SubscriptionBus {
    inner: Arc<Inner>,
}

impl Default for SubscriptionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `listener` for (store, id). Returns a handle that
    /// unregisters on drop, or when `unsubscribe()` is called explicitly
    /// (safe to call more than once).
    pub fn subscribe(
        &self,
        store: &str,
        identifier: &str,
        listener: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let entry_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let key = (store.to_string(), identifier.to_string());

        {
            let mut registry = self.inner.registry.write();
            let mut entries = registry
                .get(&key)
                .map(|existing| (**existing).clone())
                .unwrap_or_default();
            entries.push(ListenerEntry {
                id: entry_id,
                listener: Arc::new(listener),
            });
            registry.insert(key.clone(), Arc::new(entries));
        }

        SubscriptionHandle {
            inner: Arc::downgrade(&self.inner),
            key,
            entry_id,
            unsubscribed: AtomicBool::new(false),
        }
    }

    /// Invokes every live listener for (store, id) in registration order
    /// with the new value, or `None` on remove/clear. Listener panics are
    /// caught per-listener and never interrupt fan-out.
    pub fn publish(&self, store: &str, identifier: &str, value: Option<Value>) {
        let key = (store.to_string(), identifier.to_string());
        let entries = {
            let registry = self.inner.registry.read();
            registry.get(&key).cloned()
        };
        let Some(entries) = entries else {
            return;
        };

        for entry in entries.iter() {
            let listener = entry.listener.clone();
            let value = value.clone();
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                tracing::warn!(store, identifier, "subscription listener panicked; continuing fan-out");
            }
        }
    }

    /// All (store, id) pairs with at least one live subscriber, used by the
    /// composer's `clear()` to publish `absent` to every previously
    /// subscribed key.
    pub fn subscribed_keys(&self) -> Vec<(String, String)> {
        self.inner.registry.read().keys().cloned().collect()
    }

    fn unregister(inner: &Inner, key: &(String, String), entry_id: u64) {
        let mut registry = inner.registry.write();
        if let Some(existing) = registry.get(key) {
            let filtered: Vec<ListenerEntry> =
                existing.iter().filter(|e| e.id != entry_id).cloned().collect();
            if filtered.is_empty() {
                registry.remove(key);
            } else {
                registry.insert(key.clone(), Arc::new(filtered));
            }
        }
    }
}

/// An unsubscribe handle. Dropping it unregisters the listener; calling
/// `unsubscribe()` explicitly is equivalent and idempotent.
pub struct SubscriptionHandle {
    inner: Weak<Inner>,
    key: (String, String),
    entry_id: u64,
    unsubscribed: AtomicBool,
}

impl SubscriptionHandle {
    pub fn unsubscribe(&self) {
        if self.unsubscribed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            SubscriptionBus::unregister(&inner, &self.key, self.entry_id);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
