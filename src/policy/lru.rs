//! Enhanced LRU eviction policy (spec.md §4.2.1).
//!
//! A hash table mapping key to node plus a doubly linked list ordered by
//! recency. `record_access` moves a node to the head; `select_victim`
//! inspects the tail. When built `with_sketch`, victim selection looks at
//! the last few tail nodes and prefers whichever has the lowest estimated
//! frequency, the same trick Window-TinyLFU uses to protect hot keys from a
//! single cold burst of unrelated traffic.

use std::collections::HashMap;
use std::hash::Hash;

use crate::policy::arena::{Arena, NodeId};
use crate::policy::EvictionPolicy;
use crate::sketch::FrequencySketch;

/// Number of tail nodes examined when a frequency sketch is attached.
const SKETCH_LOOKBACK: usize = 5;

/// Plain or frequency-aware LRU, selected by whether a [`FrequencySketch`]
/// was supplied at construction.
pub struct LruPolicy<K: Eq + Hash + Clone> {
    index: HashMap<K, NodeId>,
    order: Arena<K>,
    sketch: Option<FrequencySketch>,
}

impl<K: Eq + Hash + Clone> LruPolicy<K> {
    /// Plain LRU: `select_victim` always returns the tail.
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            order: Arena::new(),
            sketch: None,
        }
    }

    /// Enhanced LRU: `select_victim` prefers the coldest of the last
    /// [`SKETCH_LOOKBACK`] tail nodes per their estimated frequency.
    pub fn with_sketch(capacity: usize) -> Self {
        Self {
            index: HashMap::new(),
            order: Arena::new(),
            sketch: Some(FrequencySketch::with_capacity(capacity)),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for LruPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for LruPolicy<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruPolicy")
            .field("len", &self.index.len())
            .field("enhanced", &self.sketch.is_some())
            .finish()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for LruPolicy<K> {
    fn record_access(&mut self, key: &K) {
        if let Some(sketch) = &mut self.sketch {
            sketch.increment(key);
        }
        if let Some(&id) = self.index.get(key) {
            self.order.move_to_front(id);
        }
    }

    fn record_insertion(&mut self, key: K, _weight: u64) {
        if let Some(sketch) = &mut self.sketch {
            sketch.increment(&key);
        }
        if let Some(&id) = self.index.get(&key) {
            self.order.move_to_front(id);
            return;
        }
        let id = self.order.push_front(key.clone());
        self.index.insert(key, id);
    }

    fn record_removal(&mut self, key: &K) {
        if let Some(id) = self.index.remove(key) {
            self.order.remove(id);
        }
    }

    fn select_victim(&mut self) -> Option<K> {
        let Some(sketch) = self.sketch.as_ref() else {
            return self.order.back().map(|id| self.order.get(id).clone());
        };
        self.order
            .iter_back()
            .take(SKETCH_LOOKBACK)
            .min_by_key(|&id| sketch.frequency(self.order.get(id)))
            .map(|id| self.order.get(id).clone())
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
