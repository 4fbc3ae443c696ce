//! Idle-time eviction policy (spec.md §4.2.5).
//!
//! Tracks last-access timestamps and names a key as a victim once it has
//! been idle past a configured threshold. An O(n) scan, and — per the spec
//! — "suitable only as supplementary policy": it names a victim only when
//! one has actually gone idle, so callers pair it with a primary policy
//! rather than relying on it alone to reclaim capacity.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::policy::EvictionPolicy;

pub struct IdlePolicy<K: Eq + Hash + Clone> {
    clock: Arc<dyn Clock>,
    last_access_nanos: HashMap<K, u64>,
    idle_threshold: Duration,
}

impl<K: Eq + Hash + Clone> IdlePolicy<K> {
    pub fn new(clock: Arc<dyn Clock>, idle_threshold: Duration) -> Self {
        Self {
            clock,
            last_access_nanos: HashMap::new(),
            idle_threshold,
        }
    }
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for IdlePolicy<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdlePolicy")
            .field("len", &self.last_access_nanos.len())
            .field("idle_threshold", &self.idle_threshold)
            .finish()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for IdlePolicy<K> {
    fn record_access(&mut self, key: &K) {
        if let Some(stamp) = self.last_access_nanos.get_mut(key) {
            *stamp = self.clock.now_nanos();
        }
    }

    fn record_insertion(&mut self, key: K, _weight: u64) {
        let now = self.clock.now_nanos();
        self.last_access_nanos.insert(key, now);
    }

    fn record_removal(&mut self, key: &K) {
        self.last_access_nanos.remove(key);
    }

    fn select_victim(&mut self) -> Option<K> {
        let now = self.clock.now_nanos();
        let threshold_nanos = self.idle_threshold.as_nanos() as u64;
        self.last_access_nanos
            .iter()
            .filter(|(_, &stamp)| now.saturating_sub(stamp) >= threshold_nanos)
            .max_by_key(|(_, &stamp)| now.saturating_sub(stamp))
            .map(|(key, _)| key.clone())
    }

    fn len(&self) -> usize {
        self.last_access_nanos.len()
    }
}
