//! Composite eviction policy (spec.md §6 `eviction_policy: Composite`).
//!
//! Pairs a supplementary [`IdlePolicy`] with a primary policy: idle-time is
//! "suitable only as supplementary policy" per spec.md §4.2.5, since it only
//! ever names a victim once one has actually gone idle. `select_victim`
//! checks the idle policy first and falls back to the primary when nothing
//! has gone idle yet.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::policy::idle::IdlePolicy;
use crate::policy::EvictionPolicy;

pub struct CompositePolicy<K: Eq + Hash + Clone> {
    idle: IdlePolicy<K>,
    primary: Box<dyn EvictionPolicy<K>>,
}

impl<K: Eq + Hash + Clone> CompositePolicy<K> {
    pub fn new(
        clock: Arc<dyn Clock>,
        idle_threshold: Duration,
        primary: Box<dyn EvictionPolicy<K>>,
    ) -> Self {
        Self {
            idle: IdlePolicy::new(clock, idle_threshold),
            primary,
        }
    }
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for CompositePolicy<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositePolicy")
            .field("idle", &self.idle)
            .field("primary_len", &self.primary.len())
            .finish()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for CompositePolicy<K> {
    fn record_access(&mut self, key: &K) {
        self.idle.record_access(key);
        self.primary.record_access(key);
    }

    fn record_insertion(&mut self, key: K, weight: u64) {
        self.idle.record_insertion(key.clone(), weight);
        self.primary.record_insertion(key, weight);
    }

    fn record_removal(&mut self, key: &K) {
        self.idle.record_removal(key);
        self.primary.record_removal(key);
    }

    fn select_victim(&mut self) -> Option<K> {
        self.idle.select_victim().or_else(|| self.primary.select_victim())
    }

    fn len(&self) -> usize {
        self.primary.len()
    }
}
