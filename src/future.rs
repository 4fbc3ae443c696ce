//! Asynchronous cache surface (spec.md §4.5, component C5's async
//! operation contracts). Compiled only behind the `async` feature.
//!
//! The synchronous engine in `engine.rs` already gives every write
//! linearizable, lock-held-briefly semantics; the one thing it cannot do
//! without an executor is suspend a caller around a user-supplied loader.
//! `get_or_load_async` adds exactly that, coalescing concurrent callers
//! racing on the same key behind one shared [`LoadSlot`] so at most one
//! loader future actually runs (spec.md §4.5 "At-most-one loader: a
//! dedicated concurrent map from key to a shared pending-load handle").
//!
//! Cancellation (spec.md §5 "async loaders honor caller-provided
//! cancellation by dropping the pending handle; waiters observe a
//! cancelled error") falls out of normal async-Rust cancellation: if the
//! task driving the winning loader is dropped before the loader finishes
//! (e.g. wrapped in `tokio::time::timeout` or aborted), [`LoadGuard`]'s
//! `Drop` impl notices the slot was never resolved and resolves it to
//! [`crate::error::LoadError::Cancelled`] for every other waiter instead of
//! leaving them parked forever.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::engine::Cache;
use crate::error::LoadError;
use crate::stats::{notify, Event};

/// What a [`LoadSlot`] eventually resolves to, for every waiter.
#[derive(Clone)]
enum LoadOutcome<V> {
    Loaded(V),
    Failed(Arc<dyn std::error::Error + Send + Sync>),
    Cancelled,
}

/// The shared, racing-caller-visible state of one in-flight load.
struct LoadSlot<V> {
    result: Mutex<Option<LoadOutcome<V>>>,
    notify: Notify,
}

impl<V> LoadSlot<V> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    fn resolve(&self, outcome: LoadOutcome<V>) {
        *self.result.lock() = Some(outcome);
        self.notify.notify_waiters();
    }
}

/// A shared handle to one in-flight (or completed) async load.
pub(crate) type PendingLoad<V> = Arc<LoadSlot<V>>;

/// Held by the single caller that won the race to run `loader`. If dropped
/// without the slot having been resolved — the winning task was cancelled
/// mid-load — resolves the slot to `Cancelled` so parked waiters don't
/// hang, and always evicts the slot from the pending-load map once nobody
/// can still be racing to create it.
struct LoadGuard<'a, K, V>
where
    K: Eq + Hash,
{
    pending: &'a Mutex<HashMap<K, PendingLoad<V>>>,
    key: K,
    slot: PendingLoad<V>,
    resolved: bool,
}

impl<K, V> Drop for LoadGuard<'_, K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if !self.resolved {
            self.slot.resolve(LoadOutcome::Cancelled);
        }
        let mut pending = self.pending.lock();
        if let Some(current) = pending.get(&self.key) {
            if Arc::ptr_eq(current, &self.slot) {
                pending.remove(&self.key);
            }
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Reads `key`, loading it asynchronously via `loader` on a miss.
    ///
    /// Concurrent callers racing on the same key share one in-flight
    /// `loader` future — only the first caller's `loader` actually runs;
    /// every other racing caller awaits the same result. If the winning
    /// caller's future is dropped before the loader finishes, every other
    /// waiter observes [`LoadError::Cancelled`] instead of hanging. On
    /// completion (success, failure, or cancellation) the pending handle is
    /// dropped, so a later call for the same key starts a fresh load rather
    /// than reusing a stale result.
    pub async fn get_or_load_async<E, F, Fut>(
        &self,
        key: K,
        loader: F,
    ) -> Result<V, LoadError<Arc<dyn std::error::Error + Send + Sync>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let (slot, is_initiator) = {
            let mut pending = self.pending_loads.lock();
            match pending.get(&key) {
                Some(slot) => (slot.clone(), false),
                None => {
                    let slot: PendingLoad<V> = Arc::new(LoadSlot::new());
                    pending.insert(key.clone(), slot.clone());
                    (slot, true)
                }
            }
        };

        let start = self.now();

        let outcome = if is_initiator {
            let mut guard = LoadGuard {
                pending: &self.pending_loads,
                key: key.clone(),
                slot: slot.clone(),
                resolved: false,
            };
            let result = loader().await;
            let outcome = match result {
                Ok(value) => LoadOutcome::Loaded(value),
                Err(e) => LoadOutcome::Failed(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>),
            };
            slot.resolve(outcome.clone());
            guard.resolved = true;
            outcome
        } else {
            loop {
                if let Some(outcome) = slot.result.lock().clone() {
                    break outcome;
                }
                slot.notify.notified().await;
            }
        };

        match outcome {
            LoadOutcome::Loaded(value) => {
                let elapsed = self.now().saturating_sub(start);
                if self.record_stats {
                    self.stats.record_load(elapsed);
                }
                let written = self.write_through(key.clone(), value.clone());
                notify(
                    &self.listeners,
                    Event::Load {
                        key: &key,
                        value: written.current.value(),
                    },
                    &self.stats,
                );
                self.notify_evictions(written.evicted);
                Ok(value)
            }
            LoadOutcome::Failed(err) => {
                if self.record_stats {
                    self.stats.record_load_failure();
                }
                notify(
                    &self.listeners,
                    Event::LoadError {
                        key: &key,
                        error: err.as_ref(),
                    },
                    &self.stats,
                );
                Err(LoadError::Failed(err))
            }
            LoadOutcome::Cancelled => Err(LoadError::Cancelled),
        }
    }
}
