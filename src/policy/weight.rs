//! Weight-based eviction policy (spec.md §4.2.4).
//!
//! Kept for completeness, as the spec notes: victim selection is an O(n)
//! linear scan for the heaviest live key, so this is unsuitable as a
//! default policy at any real capacity. `record_access` is a no-op — only
//! weight drives eviction order here.

use std::collections::HashMap;
use std::hash::Hash;

use crate::policy::EvictionPolicy;

pub struct WeightPolicy<K: Eq + Hash + Clone> {
    weights: HashMap<K, u64>,
}

impl<K: Eq + Hash + Clone> WeightPolicy<K> {
    pub fn new() -> Self {
        Self {
            weights: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for WeightPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for WeightPolicy<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightPolicy")
            .field("len", &self.weights.len())
            .finish()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for WeightPolicy<K> {
    fn record_access(&mut self, _key: &K) {}

    fn record_insertion(&mut self, key: K, weight: u64) {
        self.weights.insert(key, weight);
    }

    fn record_removal(&mut self, key: &K) {
        self.weights.remove(key);
    }

    fn select_victim(&mut self) -> Option<K> {
        self.weights
            .iter()
            .max_by_key(|(_, &weight)| weight)
            .map(|(key, _)| key.clone())
    }

    fn len(&self) -> usize {
        self.weights.len()
    }
}
