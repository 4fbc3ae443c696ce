//! FIFO / FILO eviction policies (spec.md §4.2.3).
//!
//! A single insertion-ordered list. `record_access` is a no-op for both —
//! neither policy reacts to reads, only to insertion order. FIFO evicts the
//! oldest entry (the tail); FILO evicts the newest (the head).

use std::collections::HashMap;
use std::hash::Hash;

use crate::policy::arena::{Arena, NodeId};
use crate::policy::EvictionPolicy;

/// Which end of the insertion order a policy evicts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Evict the oldest inserted key.
    Fifo,
    /// Evict the most recently inserted key.
    Filo,
}

pub struct InsertionOrderPolicy<K: Eq + Hash + Clone> {
    index: HashMap<K, NodeId>,
    order: Arena<K>,
    eviction_end: Order,
}

impl<K: Eq + Hash + Clone> InsertionOrderPolicy<K> {
    pub fn new(eviction_end: Order) -> Self {
        Self {
            index: HashMap::new(),
            order: Arena::new(),
            eviction_end,
        }
    }
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for InsertionOrderPolicy<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertionOrderPolicy")
            .field("len", &self.index.len())
            .field("eviction_end", &self.eviction_end)
            .finish()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for InsertionOrderPolicy<K> {
    fn record_access(&mut self, _key: &K) {}

    fn record_insertion(&mut self, key: K, _weight: u64) {
        if self.index.contains_key(&key) {
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
        let id = match self.eviction_end {
            Order::Fifo => self.order.back(),
            Order::Filo => self.order.front(),
        };
        id.map(|id| self.order.get(id).clone())
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
