//! Statistics & Events (spec.md §4.6, component C6).
//!
//! Counters are lock-free adders (`AtomicU64`, relaxed ordering — spec.md
//! §5 "Statistics counters are lock-free adders" and ordering guarantees
//! are only promised per-key, not for stats), grounded in the teacher's
//! `CoreCacheMetrics`. Snapshots additionally export through a
//! `BTreeMap<String, f64>` the way the teacher's `CacheMetrics` trait does,
//! for deterministic-order external reporting (see `to_btreemap`'s doc
//! comment there for the rationale this mirrors).

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::policy::EvictionReason;

/// Process-global registry of named caches' statistics (spec.md §5 "Shared
/// resources": "the only process-global state is optional statistics
/// aggregation across cache instances ... a registry keyed by cache name").
/// Holds only `Weak` handles so a registered cache's stats are reclaimed as
/// soon as the cache itself is dropped.
static REGISTRY: OnceLock<parking_lot::Mutex<HashMap<String, Weak<Stats>>>> = OnceLock::new();

fn registry() -> &'static parking_lot::Mutex<HashMap<String, Weak<Stats>>> {
    REGISTRY.get_or_init(|| parking_lot::Mutex::new(HashMap::new()))
}

/// Registers `stats` under `name`, replacing whatever was previously
/// registered under that name. Called from `CacheBuilder::build` when the
/// builder was given a `.name(...)`.
pub(crate) fn register_named(name: &str, stats: &Arc<Stats>) {
    registry().lock().insert(name.to_string(), Arc::downgrade(stats));
}

/// Looks up the current statistics snapshot of a cache registered under
/// `name` via `CacheBuilder::name`. Returns `None` if no cache was ever
/// registered under that name, or if it has since been dropped.
pub fn named(name: &str) -> Option<Snapshot> {
    registry().lock().get(name).and_then(Weak::upgrade).map(|stats| stats.snapshot())
}

/// Monotonic, process-lifetime counters for one cache instance (spec.md
/// §4.6 "Counters").
#[derive(Debug, Default)]
pub struct Stats {
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    load_count: AtomicU64,
    load_failure_count: AtomicU64,
    eviction_count: AtomicU64,
    total_load_time_ns: AtomicU64,
    listener_error_count: AtomicU64,
}

impl Stats {
    pub fn record_hit(&self) {
        self.hit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.miss_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self, duration_nanos: u64) {
        self.load_count.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_ns
            .fetch_add(duration_nanos, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listener_error(&self) {
        self.listener_error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent-enough point-in-time snapshot. Individual
    /// counters are read independently, so a snapshot taken concurrently
    /// with heavy traffic may show `hit_count + miss_count` slightly out of
    /// step with a simultaneously-read `eviction_count`; this mirrors the
    /// teacher's `CoreCacheMetrics` snapshot, which makes the same
    /// trade-off in exchange for lock-free counters.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            load_count: self.load_count.load(Ordering::Relaxed),
            load_failure_count: self.load_failure_count.load(Ordering::Relaxed),
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
            total_load_time_ns: self.total_load_time_ns.load(Ordering::Relaxed),
            listener_error_count: self.listener_error_count.load(Ordering::Relaxed),
        }
    }
}

/// An immutable point-in-time read of [`Stats`], with derived rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub hit_count: u64,
    pub miss_count: u64,
    pub load_count: u64,
    pub load_failure_count: u64,
    pub eviction_count: u64,
    pub total_load_time_ns: u64,
    pub listener_error_count: u64,
}

impl Snapshot {
    /// `hits / (hits + misses)`. Zero denominators yield `0.0` (spec.md
    /// §4.6 "Derived on snapshot").
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    /// Mean load latency in nanoseconds, or `0.0` if nothing has loaded.
    pub fn average_load_penalty_nanos(&self) -> f64 {
        if self.load_count == 0 {
            0.0
        } else {
            self.total_load_time_ns as f64 / self.load_count as f64
        }
    }

    /// Exports every counter and derived rate as a `BTreeMap<String, f64>`
    /// for embedders that want deterministic-order reporting (e.g. to a
    /// metrics exporter) without depending on this crate's typed API —
    /// additive surface beyond spec.md §4.6, grounded in the teacher's
    /// `CacheMetrics::metrics`/`to_btreemap`.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("hit_count".to_string(), self.hit_count as f64);
        map.insert("miss_count".to_string(), self.miss_count as f64);
        map.insert("load_count".to_string(), self.load_count as f64);
        map.insert(
            "load_failure_count".to_string(),
            self.load_failure_count as f64,
        );
        map.insert("eviction_count".to_string(), self.eviction_count as f64);
        map.insert(
            "total_load_time_ns".to_string(),
            self.total_load_time_ns as f64,
        );
        map.insert(
            "listener_error_count".to_string(),
            self.listener_error_count as f64,
        );
        map.insert("hit_rate".to_string(), self.hit_rate());
        map.insert("miss_rate".to_string(), self.miss_rate());
        map.insert(
            "average_load_penalty_nanos".to_string(),
            self.average_load_penalty_nanos(),
        );
        map
    }
}

/// A cache lifecycle event, dispatched synchronously to every registered
/// [`Listener`] (spec.md §4.6 "Events").
#[derive(Debug)]
pub enum Event<'a, K, V> {
    Put { key: &'a K, value: &'a V },
    Remove { key: &'a K, value: &'a V },
    Evict { key: &'a K, value: &'a V, reason: EvictionReason },
    Expire { key: &'a K, value: &'a V },
    Load { key: &'a K, value: &'a V },
    /// `error` is type-erased: loaders passed to `compute_if_absent`/
    /// `get_or_load_async` may each fail with a different error type, so
    /// listeners — registered once for the cache's lifetime — see a
    /// `dyn Error` rather than a generic parameter pinned at construction.
    LoadError {
        key: &'a K,
        error: &'a (dyn std::error::Error + Send + Sync + 'static),
    },
    Clear,
}

/// A non-blocking callback invoked synchronously on every cache event.
///
/// Implementations must not block or panic as a matter of correctness —
/// the engine still guards every call with `catch_unwind` (spec.md §7
/// "Listener: listener invocation may throw — swallowed; counted; never
/// affects cache state"), but a panicking listener still loses whatever
/// work it hadn't finished.
pub trait Listener<K, V>: Send + Sync {
    fn on_event(&self, event: &Event<'_, K, V>);
}

/// Invokes every listener with `event`, swallowing and counting panics
/// (spec.md §7 "Listener"). Never blocks past what an individual listener
/// itself does — callers are expected to run this outside any lock.
pub fn notify<K, V>(listeners: &[Arc<dyn Listener<K, V>>], event: Event<'_, K, V>, stats: &Stats) {
    for listener in listeners {
        let result = catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
        if result.is_err() {
            stats.record_listener_error();
            tracing::warn!("cache listener panicked; continuing without it");
        }
    }
}
