//! Eviction Policies (spec.md §4.2, component C2).
//!
//! A policy tracks ordering/frequency metadata for keys only — it never
//! stores values, those live in the [`crate::index::EntryIndex`]. The
//! engine drives a policy through four operations and asks it to name a
//! victim whenever capacity must be reclaimed.

pub mod arena;
pub mod composite;
pub mod fifo;
pub mod idle;
pub mod lfu;
pub mod lru;
pub mod weight;
pub mod window_tinylfu;

use std::hash::Hash;

/// Why an entry left the cache, attached to eviction events (spec.md §3
/// "Eviction" and §4.6 events).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Evicted to stay within `maximum_size`.
    Size,
    /// Evicted to stay within `maximum_weight`.
    Weight,
    /// Removed by an explicit `remove`/`clear` call.
    Explicit,
    /// Removed because `expire_after_write`/`expire_after_access` elapsed.
    Expired,
}

/// The common contract every eviction policy implements (spec.md §4.2).
///
/// All four operations are O(1) amortized except [`EvictionPolicy::select_victim`]
/// on the weight-based and idle-time policies, which are explicitly
/// documented there as O(n) scans kept only for completeness.
pub trait EvictionPolicy<K: Eq + Hash + Clone>: Send {
    /// Notes that `key` was read. No-op for insertion-order-only policies
    /// (FIFO/FILO).
    fn record_access(&mut self, key: &K);

    /// Registers a newly inserted `key` with the policy.
    fn record_insertion(&mut self, key: K, weight: u64);

    /// Forgets `key`, e.g. after an explicit remove or expiration.
    fn record_removal(&mut self, key: &K);

    /// Names the next key to evict to reclaim capacity, if any remain
    /// under the policy's management.
    fn select_victim(&mut self) -> Option<K>;

    /// Number of keys currently tracked by the policy.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Selects which concrete policy a [`crate::config::CacheBuilder`] wires up
/// (spec.md §6 "eviction_policy"). Named the way the source algorithms are
/// named in spec.md §4.2, not after their implementation module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Lru,
    EnhancedLru,
    Lfu,
    /// Maps to the same bucketed-frequency policy as [`PolicyKind::Lfu`].
    /// spec.md §4.2.1 describes sketch-consultation as an LRU enhancement
    /// specifically (examine the tail and prefer the coldest node); LFU's
    /// buckets already give an exact frequency order, so consulting the
    /// probabilistic sketch on top would trade exactness for noise rather
    /// than add information. Kept as a distinct `PolicyKind` only so
    /// `eviction_policy` configuration round-trips the name from spec.md §6.
    EnhancedLfu,
    Fifo,
    Filo,
    WeightBased,
    IdleTime,
    WindowTinyLfu,
    /// Idle-time as a supplementary policy layered over a primary one
    /// (spec.md §4.2.5 "suitable only as supplementary policy").
    Composite,
}

/// A concrete eviction policy, picked at cache construction time.
///
/// This is an enum rather than `Box<dyn EvictionPolicy<K>>` because
/// Window-TinyLFU's hill-climbing adaptation (spec.md §4.2.6) needs an
/// extra hook, [`Policy::note_request_outcome`], that isn't meaningful for
/// any other policy and so was left off the shared trait; an enum lets the
/// engine call it without downcasting a trait object.
pub enum Policy<K: Eq + Hash + Clone> {
    Lru(lru::LruPolicy<K>),
    Lfu(lfu::LfuPolicy<K>),
    InsertionOrder(fifo::InsertionOrderPolicy<K>),
    Weight(weight::WeightPolicy<K>),
    Idle(idle::IdlePolicy<K>),
    WindowTinyLfu(window_tinylfu::WindowTinyLfu<K>),
    Composite(composite::CompositePolicy<K>),
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for Policy<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Policy::Lru(_) => "Lru",
            Policy::Lfu(_) => "Lfu",
            Policy::InsertionOrder(_) => "InsertionOrder",
            Policy::Weight(_) => "Weight",
            Policy::Idle(_) => "Idle",
            Policy::WindowTinyLfu(_) => "WindowTinyLfu",
            Policy::Composite(_) => "Composite",
        };
        f.debug_tuple("Policy").field(&name).finish()
    }
}

impl<K: Eq + Hash + Clone> Policy<K> {
    /// Feeds a request's hit/miss outcome to the hill-climbing adaptation.
    /// A no-op for every policy but [`Policy::WindowTinyLfu`].
    pub fn note_request_outcome(&mut self, hit: bool) {
        if let Policy::WindowTinyLfu(p) = self {
            p.note_outcome(hit);
        }
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for Policy<K> {
    fn record_access(&mut self, key: &K) {
        match self {
            Policy::Lru(p) => p.record_access(key),
            Policy::Lfu(p) => p.record_access(key),
            Policy::InsertionOrder(p) => p.record_access(key),
            Policy::Weight(p) => p.record_access(key),
            Policy::Idle(p) => p.record_access(key),
            Policy::WindowTinyLfu(p) => p.record_access(key),
            Policy::Composite(p) => p.record_access(key),
        }
    }

    fn record_insertion(&mut self, key: K, weight: u64) {
        match self {
            Policy::Lru(p) => p.record_insertion(key, weight),
            Policy::Lfu(p) => p.record_insertion(key, weight),
            Policy::InsertionOrder(p) => p.record_insertion(key, weight),
            Policy::Weight(p) => p.record_insertion(key, weight),
            Policy::Idle(p) => p.record_insertion(key, weight),
            Policy::WindowTinyLfu(p) => p.record_insertion(key, weight),
            Policy::Composite(p) => p.record_insertion(key, weight),
        }
    }

    fn record_removal(&mut self, key: &K) {
        match self {
            Policy::Lru(p) => p.record_removal(key),
            Policy::Lfu(p) => p.record_removal(key),
            Policy::InsertionOrder(p) => p.record_removal(key),
            Policy::Weight(p) => p.record_removal(key),
            Policy::Idle(p) => p.record_removal(key),
            Policy::WindowTinyLfu(p) => p.record_removal(key),
            Policy::Composite(p) => p.record_removal(key),
        }
    }

    fn select_victim(&mut self) -> Option<K> {
        match self {
            Policy::Lru(p) => p.select_victim(),
            Policy::Lfu(p) => p.select_victim(),
            Policy::InsertionOrder(p) => p.select_victim(),
            Policy::Weight(p) => p.select_victim(),
            Policy::Idle(p) => p.select_victim(),
            Policy::WindowTinyLfu(p) => p.select_victim(),
            Policy::Composite(p) => p.select_victim(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Policy::Lru(p) => p.len(),
            Policy::Lfu(p) => p.len(),
            Policy::InsertionOrder(p) => p.len(),
            Policy::Weight(p) => p.len(),
            Policy::Idle(p) => p.len(),
            Policy::WindowTinyLfu(p) => p.len(),
            Policy::Composite(p) => p.len(),
        }
    }
}
