//! Cache Engine (spec.md §4.5, component C5).
//!
//! `Cache<K, V>` orchestrates the other five components: it looks up and
//! writes through the [`crate::index::EntryIndex`], computes weights and
//! applies expiration via the entries' own [`crate::entry::ExpirationPolicy`],
//! and dispatches stats/listener events (C6) for everything that crosses its
//! public API. Shaped after the teacher's `ConcurrentLruCache` (`get`/`put`/
//! `remove`/`clear`/`len`/`contains_key`), generalized over a pluggable
//! policy instead of being LRU-specific.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::{CacheBuilder, SketchKind};
use crate::entry::ExpirationPolicy;
use crate::error::LoadError;
use crate::index::EntryIndex;
use crate::lifecycle::CapacityLimit;
use crate::policy::composite::CompositePolicy;
use crate::policy::fifo::{InsertionOrderPolicy, Order};
use crate::policy::idle::IdlePolicy;
use crate::policy::lfu::LfuPolicy;
use crate::policy::lru::LruPolicy;
use crate::policy::weight::WeightPolicy;
use crate::policy::window_tinylfu::WindowTinyLfu;
use crate::policy::{Policy, PolicyKind};
use crate::stats::{notify, Event, Listener, Snapshot, Stats};

type Weigher<K, V> = Arc<dyn Fn(&K, &V) -> u64 + Send + Sync>;

/// Assembled, validated configuration handed from [`CacheBuilder::build`] to
/// [`Cache::from_builder_parts`]. Kept crate-private: the builder is the
/// only supported construction path (spec.md §6 "single entry point").
pub(crate) struct BuiltConfig<K, V> {
    pub(crate) capacity: CapacityLimit,
    pub(crate) weigher: Weigher<K, V>,
    pub(crate) expire_after_write: Option<Duration>,
    pub(crate) expire_after_access: Option<Duration>,
    pub(crate) refresh_after_write: Option<Duration>,
    pub(crate) eviction_policy: PolicyKind,
    pub(crate) sketch_kind: SketchKind,
    pub(crate) record_stats: bool,
    pub(crate) listeners: Vec<Arc<dyn Listener<K, V>>>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) shard_count: usize,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) name: Option<String>,
    pub(crate) idle_threshold: Duration,
    pub(crate) window_protected_ratio: f64,
}

/// The cache engine: a concurrent, thread-safe key→value store with
/// admission/eviction, expiration, and statistics (spec.md §4.5).
pub struct Cache<K, V> {
    pub(crate) index: EntryIndex<K, V>,
    pub(crate) clock: Arc<dyn Clock>,
    weigher: Weigher<K, V>,
    refresh_after_write: Option<Duration>,
    pub(crate) record_stats: bool,
    pub(crate) stats: Arc<Stats>,
    pub(crate) listeners: Vec<Arc<dyn Listener<K, V>>>,
    name: Option<String>,
    /// Per-key in-flight load coalescing for `compute_if_absent` (spec.md
    /// §4.5 "At-most-one loader": concurrent callers on the same missing
    /// key block one another until completion). A `std::sync::OnceLock`
    /// per key blocks every caller but the first until that first caller's
    /// `loader` finishes, then hands every caller the same result.
    pub(crate) pending_sync_loads:
        parking_lot::Mutex<std::collections::HashMap<K, SyncPendingLoad<V>>>,
    /// Per-key in-flight load coalescing for `future::get_or_load_async`
    /// (the async counterpart of `pending_sync_loads`).
    #[cfg(feature = "async")]
    pub(crate) pending_loads:
        parking_lot::Mutex<std::collections::HashMap<K, crate::future::PendingLoad<V>>>,
}

/// A shared handle to one in-flight (or completed) synchronous load,
/// blocking every caller but the winner of `OnceLock::get_or_init` until the
/// winner's `loader` returns (spec.md §4.5 "At-most-one loader").
pub(crate) type SyncPendingLoad<V> = Arc<OnceLock<Result<V, Arc<dyn std::error::Error + Send + Sync>>>>;

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.index.len())
            .field("shard_count", &self.index.shard_count())
            .field("name", &self.name)
            .finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// A builder, the only supported construction path (spec.md §6).
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    pub(crate) fn from_builder_parts(
        config: BuiltConfig<K, V>,
    ) -> Result<Self, crate::error::ConfigError> {
        let expiration = ExpirationPolicy {
            expire_after_write: config.expire_after_write,
            expire_after_access: config.expire_after_access,
        };

        let eviction_policy = config.eviction_policy;
        let sketch_kind = config.sketch_kind;
        let per_shard_hint = config
            .initial_capacity
            .map(|hint| (hint / config.shard_count.max(1)).max(1))
            .unwrap_or_else(|| match config.capacity {
                CapacityLimit::Count(n) => (n as usize / config.shard_count.max(1)).max(1),
                CapacityLimit::Weight(w) => (w as usize / config.shard_count.max(1)).max(1),
            });
        let idle_threshold = config.idle_threshold;
        let window_protected_ratio = config.window_protected_ratio;
        let clock_for_policy = config.clock.clone();

        let make_policy = move || -> Policy<K> {
            match eviction_policy {
                PolicyKind::Lru => Policy::Lru(LruPolicy::new()),
                PolicyKind::EnhancedLru => match sketch_kind {
                    SketchKind::None => Policy::Lru(LruPolicy::new()),
                    SketchKind::Basic | SketchKind::Optimized => {
                        Policy::Lru(LruPolicy::with_sketch(per_shard_hint))
                    }
                },
                PolicyKind::Lfu | PolicyKind::EnhancedLfu => Policy::Lfu(LfuPolicy::new()),
                PolicyKind::Fifo => {
                    Policy::InsertionOrder(InsertionOrderPolicy::new(Order::Fifo))
                }
                PolicyKind::Filo => {
                    Policy::InsertionOrder(InsertionOrderPolicy::new(Order::Filo))
                }
                PolicyKind::WeightBased => Policy::Weight(WeightPolicy::new()),
                PolicyKind::IdleTime => {
                    Policy::Idle(IdlePolicy::new(clock_for_policy.clone(), idle_threshold))
                }
                PolicyKind::WindowTinyLfu => Policy::WindowTinyLfu(WindowTinyLfu::new(
                    per_shard_hint,
                    0.01,
                    window_protected_ratio,
                )),
                PolicyKind::Composite => Policy::Composite(CompositePolicy::new(
                    clock_for_policy.clone(),
                    idle_threshold,
                    Box::new(LruPolicy::new()),
                )),
            }
        };

        let index = EntryIndex::new(config.shard_count, config.capacity, expiration, make_policy);

        let stats = Arc::new(Stats::default());
        if let Some(name) = &config.name {
            crate::stats::register_named(name, &stats);
        }

        Ok(Self {
            index,
            clock: config.clock,
            weigher: config.weigher,
            refresh_after_write: config.refresh_after_write,
            record_stats: config.record_stats,
            stats,
            listeners: config.listeners,
            name: config.name,
            pending_sync_loads: parking_lot::Mutex::new(std::collections::HashMap::new()),
            #[cfg(feature = "async")]
            pending_loads: parking_lot::Mutex::new(std::collections::HashMap::new()),
        })
    }

    /// Writes `key`/`value` through the index (weigher + capacity
    /// enforcement) without dispatching any event — shared by `put` (which
    /// follows with [`Event::Put`]) and the load paths (which follow with
    /// [`Event::Load`] instead).
    pub(crate) fn write_through(&self, key: K, value: V) -> crate::index::PutOutcome<K, V> {
        let weight = (self.weigher)(&key, &value);
        let now = self.now();
        self.index.put(key, value, weight, now)
    }

    pub(crate) fn now(&self) -> u64 {
        self.clock.now_nanos()
    }

    pub(crate) fn notify_evictions(&self, evicted: Vec<crate::index::Removed<K, V>>) {
        for removed in evicted {
            if self.record_stats {
                self.stats.record_eviction();
            }
            let event = if removed.reason == crate::policy::EvictionReason::Expired {
                Event::Expire {
                    key: &removed.key,
                    value: removed.entry.value(),
                }
            } else {
                Event::Evict {
                    key: &removed.key,
                    value: removed.entry.value(),
                    reason: removed.reason,
                }
            };
            notify(&self.listeners, event, &self.stats);
        }
    }

    /// Looks up `key`, returning a clone of its value on a hit.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.get_with(key, |v| v.clone())
    }

    /// Looks up `key` and applies `f` to the value while the shard lock is
    /// held, avoiding a clone (grounded on the teacher's `get_with`;
    /// additive beyond spec.md §4.5, see `SPEC_FULL.md` §2).
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        let now = self.now();
        let (found, expired) = self.index.get(key, now);
        if let Some(removed) = expired {
            self.notify_evictions(vec![removed]);
        }
        let hit = found.is_some();
        if self.record_stats {
            if hit {
                self.stats.record_hit();
            } else {
                self.stats.record_miss();
            }
        }
        self.index.note_request_outcome(key, hit);
        found.map(|entry| f(entry.value()))
    }

    /// Inserts or updates `key`. Runs the weigher, writes through the
    /// index, and evicts as many records as capacity enforcement demands.
    pub fn put(&self, key: K, value: V) {
        let outcome = self.write_through(key.clone(), value);
        notify(
            &self.listeners,
            Event::Put {
                key: &key,
                value: outcome.current.value(),
            },
            &self.stats,
        );
        self.notify_evictions(outcome.evicted);
    }

    /// Removes `key`, returning its value if present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        let removed = self.index.remove(key)?;
        let value = removed.entry.value().clone();
        notify(
            &self.listeners,
            Event::Remove {
                key: &removed.key,
                value: &value,
            },
            &self.stats,
        );
        Some(value)
    }

    /// Evicts every entry, notifying listeners once with [`Event::Clear`].
    pub fn clear(&self) {
        self.index.clear();
        notify(&self.listeners, Event::Clear, &self.stats);
    }

    pub fn size(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.contains(key, self.now())
    }

    /// Point-in-time statistics (spec.md §4.6).
    pub fn stats(&self) -> Snapshot {
        self.stats.snapshot()
    }

    /// Stats exported as a `BTreeMap<String, f64>` (`SPEC_FULL.md` §2,
    /// grounded on the teacher's `CacheMetrics::metrics`).
    pub fn metrics_snapshot(&self) -> BTreeMap<String, f64> {
        self.stats.snapshot().to_btreemap()
    }

    /// Reads `key`, loading it via `loader` on a miss.
    ///
    /// At most one call across threads actually runs `loader` for a given
    /// key: every caller racing on the same missing key shares one
    /// `OnceLock`, so a losing caller blocks on `OnceLock::get_or_init`
    /// until the winner's `loader` returns, then observes the same result
    /// (spec.md §4.5 "At-most-one loader: concurrent callers on the same
    /// missing key block one another until completion"). The loader's
    /// error type is erased to `Arc<dyn Error + Send + Sync>` since the
    /// pending-load slot is shared across every caller racing on the key,
    /// each of whom may be generic over a different concrete `E`.
    pub fn compute_if_absent<E>(
        &self,
        key: K,
        loader: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, LoadError<Arc<dyn std::error::Error + Send + Sync>>>
    where
        V: Clone,
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let cell: SyncPendingLoad<V> = {
            let mut pending = self.pending_sync_loads.lock();
            pending
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };

        let start = self.now();
        let result = cell
            .get_or_init(|| loader().map_err(|e| Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
            .clone();

        // Resolved for every waiter; drop it so a future miss starts fresh.
        self.pending_sync_loads.lock().remove(&key);

        match result {
            Ok(value) => {
                let elapsed = self.now().saturating_sub(start);
                if self.record_stats {
                    self.stats.record_load(elapsed);
                }
                let outcome = self.write_through(key.clone(), value.clone());
                notify(
                    &self.listeners,
                    Event::Load {
                        key: &key,
                        value: outcome.current.value(),
                    },
                    &self.stats,
                );
                self.notify_evictions(outcome.evicted);
                Ok(value)
            }
            Err(err) => {
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
        }
    }

    /// Whether `key`'s entry is older than `refresh_after_write` and should
    /// be proactively reloaded (spec.md §6 "refresh_after_write"). The
    /// engine only reports staleness here; triggering the reload is left to
    /// the caller (or `future.rs`'s async surface), since refresh must not
    /// block a reader that only needs the current value.
    pub fn needs_refresh<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some(refresh_after) = self.refresh_after_write else {
            return false;
        };
        let now = self.now();
        let (entry, _) = self.index.get(key, now);
        match entry {
            Some(entry) => now.saturating_sub(entry.created_at()) >= refresh_after.as_nanos() as u64,
            None => false,
        }
    }
}
