//! Entry Index (spec.md §4.3, component C3).
//!
//! A concurrent hash map from key to entry record, sharded by key hash the
//! way the teacher's `ConcurrentLruCache` shards an `LruSegment` — lookups
//! for different keys never contend, at the cost of only approximate
//! global ordering (capacity is enforced per shard, not cache-wide).
//!
//! Each shard bundles its map, its [`Policy`], and its weight accounting
//! behind one `parking_lot::Mutex`, so a read that finds a key expired can
//! transition it to `Removed` and notify the policy without a second lock
//! acquisition.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use parking_lot::Mutex;

#[cfg(feature = "hashbrown")]
use hashbrown::{DefaultHashBuilder, HashMap};

#[cfg(not(feature = "hashbrown"))]
use std::collections::{hash_map::RandomState as DefaultHashBuilder, HashMap};

use crate::entry::{Entry, ExpirationPolicy};
use crate::lifecycle::{Accounting, CapacityLimit};
use crate::policy::{EvictionPolicy, EvictionReason, Policy};

/// A key removed from a shard, carried out to the engine so it can run
/// listeners and record stats outside the shard lock.
pub struct Removed<K, V> {
    pub key: K,
    pub entry: Arc<Entry<V>>,
    pub reason: EvictionReason,
}

/// The outcome of a `put`: the entry as stored, the previous entry if this
/// was an update, and any entries evicted to make room for it.
pub struct PutOutcome<K, V> {
    pub current: Arc<Entry<V>>,
    pub previous: Option<Arc<Entry<V>>>,
    pub evicted: Vec<Removed<K, V>>,
}

struct Shard<K, V> {
    map: HashMap<K, Arc<Entry<V>>>,
    policy: Policy<K>,
    expiration: ExpirationPolicy,
    capacity: CapacityLimit,
    accounting: Accounting,
}

impl<K: Eq + Hash + Clone + Send, V> Shard<K, V> {
    fn new(policy: Policy<K>, expiration: ExpirationPolicy, capacity: CapacityLimit) -> Self {
        Self {
            map: HashMap::default(),
            policy,
            expiration,
            capacity,
            accounting: Accounting::default(),
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    /// Looks up `key`, transitioning it to `Removed` in place if expired.
    /// Returns `(value, expired)` where `expired` carries the just-expired
    /// record so the engine can emit an `EXPIRED` event outside the lock.
    fn get<Q>(&mut self, key: &Q, now_nanos: u64) -> (Option<Arc<Entry<V>>>, Option<Removed<K, V>>)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some((owned_key, entry)) = self.map.get_key_value(key) else {
            return (None, None);
        };
        if self.expiration.is_enabled() && entry.is_expired(&self.expiration, now_nanos) {
            if entry.state().begin_expire() {
                let (_, removed) = self.remove_raw(key, EvictionReason::Expired);
                return (None, removed);
            }
            // Lost the race to expire this record to a concurrent reader;
            // treat it as already gone either way.
            return (None, None);
        }
        entry.touch(now_nanos);
        self.policy.record_access(owned_key);
        (Some(entry.clone()), None)
    }

    fn put(&mut self, key: K, value: V, weight: u64, now_nanos: u64) -> PutOutcome<K, V> {
        let new_entry = Arc::new(Entry::new(value, weight, now_nanos));
        let current = new_entry.clone();
        let previous = self.map.insert(key.clone(), new_entry);

        match &previous {
            Some(old) => {
                self.accounting.record_replace(old.weight(), weight);
                self.policy.record_access(&key);
            }
            None => {
                self.accounting.record_insertion(weight);
                self.policy.record_insertion(key, weight);
            }
        }

        let evicted = self.enforce_capacity();
        PutOutcome {
            current,
            previous,
            evicted,
        }
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<Removed<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, removed) = self.remove_raw(key, EvictionReason::Explicit);
        removed
    }

    /// Removes `key` from the map and policy, returning the owned key (for
    /// callers that only had a borrowed `Q`) and a [`Removed`] record.
    fn remove_raw<Q>(&mut self, key: &Q, reason: EvictionReason) -> (Option<K>, Option<Removed<K, V>>)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some((owned_key, entry)) = self.map.remove_entry(key) else {
            return (None, None);
        };
        entry.state().finish_remove();
        self.accounting.record_removal(entry.weight());
        self.policy.record_removal(&owned_key);
        (
            Some(owned_key.clone()),
            Some(Removed {
                key: owned_key,
                entry,
                reason,
            }),
        )
    }

    fn clear(&mut self) -> Vec<Removed<K, V>> {
        let mut evicted = Vec::with_capacity(self.map.len());
        for (key, entry) in self.map.drain() {
            entry.state().finish_remove();
            self.policy.record_removal(&key);
            evicted.push(Removed {
                key,
                entry,
                reason: EvictionReason::Explicit,
            });
        }
        self.accounting = Accounting::default();
        evicted
    }

    fn enforce_capacity(&mut self) -> Vec<Removed<K, V>> {
        let mut evicted = Vec::new();
        while self.accounting.exceeds(&self.capacity) {
            let Some(victim) = self.policy.select_victim() else {
                break;
            };
            let (_, removed) = self.remove_raw(&victim, self.capacity.eviction_reason());
            match removed {
                Some(removed) => evicted.push(removed),
                None => break,
            }
        }
        evicted
    }
}

/// The concurrent, sharded key→entry-record map (spec.md §4.3).
pub struct EntryIndex<K, V, S = DefaultHashBuilder> {
    shards: Box<[Mutex<Shard<K, V>>]>,
    hash_builder: S,
}

impl<K, V> EntryIndex<K, V, DefaultHashBuilder>
where
    K: Eq + Hash + Clone + Send,
{
    /// Builds an index with `shard_count` shards, each independently
    /// capacity-limited to `total_capacity / shard_count` (at least 1), and
    /// each running its own instance of the policy `make_policy` builds —
    /// see `crate::engine` for why policies are per-shard rather than
    /// cache-wide.
    pub fn new(
        shard_count: usize,
        total_capacity: CapacityLimit,
        expiration: ExpirationPolicy,
        make_policy: impl Fn() -> Policy<K>,
    ) -> Self {
        let shard_count = shard_count.max(1);
        let per_shard_capacity = match total_capacity {
            CapacityLimit::Count(n) => {
                CapacityLimit::Count((n / shard_count as u64).max(1))
            }
            CapacityLimit::Weight(w) => {
                CapacityLimit::Weight((w / shard_count as u64).max(1))
            }
        };
        let shards: Vec<_> = (0..shard_count)
            .map(|_| Mutex::new(Shard::new(make_policy(), expiration, per_shard_capacity)))
            .collect();
        Self {
            shards: shards.into_boxed_slice(),
            hash_builder: DefaultHashBuilder::default(),
        }
    }
}

impl<K, V, S> EntryIndex<K, V, S>
where
    K: Eq + Hash + Clone + Send,
    S: BuildHasher,
{
    fn shard_index<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (self.hash_builder.hash_one(key) as usize) % self.shards.len()
    }

    pub fn get<Q>(&self, key: &Q, now_nanos: u64) -> (Option<Arc<Entry<V>>>, Option<Removed<K, V>>)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.shard_index(key);
        self.shards[index].lock().get(key, now_nanos)
    }

    pub fn put(&self, key: K, value: V, weight: u64, now_nanos: u64) -> PutOutcome<K, V> {
        let index = self.shard_index(&key);
        self.shards[index].lock().put(key, value, weight, now_nanos)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<Removed<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.shard_index(key);
        self.shards[index].lock().remove(key)
    }

    pub fn contains<Q>(&self, key: &Q, now_nanos: u64) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key, now_nanos).0.is_some()
    }

    pub fn clear(&self) -> Vec<Removed<K, V>> {
        let mut evicted = Vec::new();
        for shard in self.shards.iter() {
            evicted.extend(shard.lock().clear());
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Reports a request outcome (hit/miss) to the shard owning `key`'s
    /// policy, for Window-TinyLFU's hill-climbing adaptation.
    pub fn note_request_outcome<Q>(&self, key: &Q, hit: bool)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        let index = self.shard_index(key);
        self.shards[index].lock().policy.note_request_outcome(hit);
    }
}

impl<K, V, S> std::fmt::Debug for EntryIndex<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryIndex")
            .field("shards", &self.shards.len())
            .finish()
    }
}
