//! Window-TinyLFU eviction policy (spec.md §4.2.6) — the default policy for
//! general workloads.
//!
//! Three segments share one key→location index: a small admission
//! **window** (LRU, ~1% of capacity), and a **main** space split into
//! **protected** and **probationary** segments (~80/20). A single
//! [`FrequencySketch`] estimates recency for admission decisions.
//!
//! # Reconciling the two eviction paths
//!
//! The spec describes eviction happening two ways: inline during
//! `record_insertion`'s admission flow (steps 2-4: pop the window tail,
//! compare it against the probationary tail, evict whichever loses), and
//! via a standalone `select_victim` that "returns the probationary tail; if
//! probationary is empty, the protected tail; if main is empty, the window
//! tail." Both are real: the first happens synchronously, every time a key
//! is inserted while the window is full, and resolves a key the engine
//! never explicitly asked to evict. Since this trait's `record_insertion`
//! has no return value, admission rejections are queued internally and
//! drained by the next `select_victim` call; the plain tail-based rule
//! above is the fallback `select_victim` uses once that queue is empty
//! (e.g. after a capacity shrink with no insertion driving it).

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use rand::Rng;

use crate::policy::arena::{Arena, NodeId};
use crate::policy::EvictionPolicy;
use crate::sketch::FrequencySketch;

/// Anti-hash-flood threshold from spec.md §4.2.6 step 4: equal frequencies
/// at or above this admit the candidate only probabilistically.
const ANTI_FLOOD_THRESHOLD: u8 = 2;
/// Admission probability once the anti-flood threshold is reached.
const ANTI_FLOOD_ADMIT_DENOMINATOR: u32 = 32;
/// Initial hill-climbing step, as a fraction of total capacity.
const INITIAL_STEP_FRACTION: f64 = 0.0625;
/// Per-iteration decay applied to the hill-climbing step size.
const STEP_DECAY: f64 = 0.98;
/// Hit-rate delta, as a fraction, above which the step size resets.
const RESET_DELTA_THRESHOLD: f64 = 0.05;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Segment {
    Window,
    Probationary,
    Protected,
}

struct Location {
    segment: Segment,
    node: NodeId,
}

/// Window-TinyLFU: admission window + segmented-LRU main space + shared
/// frequency sketch, with hill-climbing adaptive sizing.
pub struct WindowTinyLfu<K: Eq + Hash + Clone> {
    index: HashMap<K, Location>,
    window: Arena<K>,
    probationary: Arena<K>,
    protected: Arena<K>,
    sketch: FrequencySketch,

    window_capacity: usize,
    protected_capacity: usize,
    total_capacity: usize,

    pending_evictions: VecDeque<K>,

    step: f64,
    requests_this_sample: u64,
    hits_this_sample: u64,
    previous_hit_rate: f64,
}

impl<K: Eq + Hash + Clone> WindowTinyLfu<K> {
    /// Builds a Window-TinyLFU policy for `capacity` total live keys, with
    /// the window sized to `window_fraction` of capacity (spec.md default:
    /// ~1%) and the main space's protected segment sized to
    /// `protected_fraction` of main (spec.md default: ~80%).
    pub fn new(capacity: usize, window_fraction: f64, protected_fraction: f64) -> Self {
        let window_capacity = ((capacity as f64 * window_fraction).round() as usize)
            .clamp(1, capacity.saturating_sub(1).max(1));
        let main_capacity = capacity.saturating_sub(window_capacity).max(1);
        let protected_capacity = ((main_capacity as f64 * protected_fraction).round() as usize)
            .clamp(0, main_capacity);
        Self {
            index: HashMap::new(),
            window: Arena::new(),
            probationary: Arena::new(),
            protected: Arena::new(),
            sketch: FrequencySketch::with_capacity(capacity),
            window_capacity,
            protected_capacity,
            total_capacity: capacity,
            pending_evictions: VecDeque::new(),
            step: capacity as f64 * INITIAL_STEP_FRACTION,
            requests_this_sample: 0,
            hits_this_sample: 0,
            previous_hit_rate: 0.0,
        }
    }

    /// Feeds one request's hit/miss outcome into the hill-climbing
    /// adaptation (spec.md §4.2.6 "Adaptive sizing"). Not part of
    /// [`EvictionPolicy`] — only meaningful for this policy, so the engine
    /// calls it directly when Window-TinyLFU is configured.
    pub fn note_outcome(&mut self, hit: bool) {
        self.requests_this_sample += 1;
        if hit {
            self.hits_this_sample += 1;
        }
        if self.requests_this_sample as usize >= self.sketch.sample_size() {
            self.climb();
        }
    }

    fn climb(&mut self) {
        let hit_rate = if self.requests_this_sample == 0 {
            0.0
        } else {
            self.hits_this_sample as f64 / self.requests_this_sample as f64
        };
        let delta = hit_rate - self.previous_hit_rate;
        if delta.abs() >= RESET_DELTA_THRESHOLD {
            self.step = self.total_capacity as f64 * INITIAL_STEP_FRACTION;
        }

        let grow_window = delta >= 0.0;
        self.resize_window(grow_window);

        self.step *= STEP_DECAY;
        self.previous_hit_rate = hit_rate;
        self.requests_this_sample = 0;
        self.hits_this_sample = 0;
    }

    fn resize_window(&mut self, grow_window: bool) {
        let shift = (self.step.round() as i64).max(1) as usize;
        let main_capacity = self.total_capacity.saturating_sub(self.window_capacity);
        if grow_window {
            let shift = shift.min(main_capacity.saturating_sub(1));
            if shift == 0 {
                return;
            }
            self.window_capacity = (self.window_capacity + shift).min(self.total_capacity - 1);
        } else {
            let shift = shift.min(self.window_capacity.saturating_sub(1));
            if shift == 0 {
                return;
            }
            self.window_capacity = (self.window_capacity - shift).max(1);
        }
        let new_main_capacity = self.total_capacity.saturating_sub(self.window_capacity);
        self.protected_capacity = ((new_main_capacity as f64) * 0.8).round() as usize;

        while self.window.len() > self.window_capacity {
            if let Some(evicted) = self.window.pop_back() {
                self.index.remove(&evicted);
                self.pending_evictions.push_back(evicted);
            }
        }
        while self.protected.len() > self.protected_capacity {
            if let Some(demoted) = self.protected.pop_back() {
                let node = self.probationary.push_front(demoted.clone());
                self.index.insert(
                    demoted,
                    Location {
                        segment: Segment::Probationary,
                        node,
                    },
                );
            }
        }
    }

    fn main_len(&self) -> usize {
        self.probationary.len() + self.protected.len()
    }

    fn main_capacity(&self) -> usize {
        self.total_capacity.saturating_sub(self.window_capacity)
    }

    fn admit_candidate(&mut self, candidate: K) {
        if self.main_len() < self.main_capacity() {
            let node = self.probationary.push_front(candidate.clone());
            self.index.insert(
                candidate,
                Location {
                    segment: Segment::Probationary,
                    node,
                },
            );
            return;
        }

        let Some(victim_id) = self.probationary.back() else {
            // No probationary victim to compare against; admit directly.
            let node = self.probationary.push_front(candidate.clone());
            self.index.insert(
                candidate,
                Location {
                    segment: Segment::Probationary,
                    node,
                },
            );
            return;
        };
        let victim = self.probationary.get(victim_id).clone();
        let candidate_freq = self.sketch.frequency(&candidate);
        let victim_freq = self.sketch.frequency(&victim);

        let admit = if candidate_freq > victim_freq {
            true
        } else if candidate_freq <= 1 && victim_freq <= 1 {
            true
        } else if candidate_freq == victim_freq && candidate_freq >= ANTI_FLOOD_THRESHOLD {
            rand::thread_rng().gen_ratio(1, ANTI_FLOOD_ADMIT_DENOMINATOR)
        } else {
            false
        };

        if admit {
            self.probationary.remove(victim_id);
            self.index.remove(&victim);
            self.pending_evictions.push_back(victim);

            let node = self.probationary.push_front(candidate.clone());
            self.index.insert(
                candidate,
                Location {
                    segment: Segment::Probationary,
                    node,
                },
            );
        } else {
            self.pending_evictions.push_back(candidate);
        }
    }
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for WindowTinyLfu<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowTinyLfu")
            .field("len", &self.index.len())
            .field("window_capacity", &self.window_capacity)
            .field("protected_capacity", &self.protected_capacity)
            .field("total_capacity", &self.total_capacity)
            .finish()
    }
}

impl<K: Eq + Hash + Clone + Send> EvictionPolicy<K> for WindowTinyLfu<K> {
    fn record_access(&mut self, key: &K) {
        self.sketch.increment(key);
        let Some(loc) = self.index.get(key) else {
            return;
        };
        match loc.segment {
            Segment::Window => {
                self.window.move_to_front(loc.node);
            }
            Segment::Probationary => {
                let node = loc.node;
                self.probationary.remove(node);
                let new_node = self.protected.push_front(key.clone());
                self.index.insert(
                    key.clone(),
                    Location {
                        segment: Segment::Protected,
                        node: new_node,
                    },
                );
                if self.protected.len() > self.protected_capacity {
                    if let Some(demoted) = self.protected.pop_back() {
                        let demoted_node = self.probationary.push_front(demoted.clone());
                        self.index.insert(
                            demoted,
                            Location {
                                segment: Segment::Probationary,
                                node: demoted_node,
                            },
                        );
                    }
                }
            }
            Segment::Protected => {
                self.protected.move_to_front(loc.node);
            }
        }
    }

    fn record_insertion(&mut self, key: K, _weight: u64) {
        self.sketch.increment(&key);
        let node = self.window.push_front(key.clone());
        self.index.insert(
            key,
            Location {
                segment: Segment::Window,
                node,
            },
        );
        if self.window.len() > self.window_capacity {
            if let Some(candidate) = self.window.pop_back() {
                self.index.remove(&candidate);
                self.admit_candidate(candidate);
            }
        }
    }

    fn record_removal(&mut self, key: &K) {
        if let Some(loc) = self.index.remove(key) {
            match loc.segment {
                Segment::Window => {
                    self.window.remove(loc.node);
                }
                Segment::Probationary => {
                    self.probationary.remove(loc.node);
                }
                Segment::Protected => {
                    self.protected.remove(loc.node);
                }
            }
        }
    }

    fn select_victim(&mut self) -> Option<K> {
        if let Some(key) = self.pending_evictions.pop_front() {
            return Some(key);
        }
        if let Some(id) = self.probationary.back() {
            return Some(self.probationary.get(id).clone());
        }
        if let Some(id) = self.protected.back() {
            return Some(self.protected.get(id).clone());
        }
        self.window.back().map(|id| self.window.get(id).clone())
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
