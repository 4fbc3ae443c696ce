//! End-to-end scenarios and quantified invariants (spec.md §8).
//!
//! Scenario A (LRU order) and C/E (expiration, weight eviction) are covered
//! in `correctness_tests.rs` since they're really single-policy correctness
//! checks; this file covers the scenarios that need the full engine wired
//! up (Window-TinyLFU admission, async load coalescing, the frequency
//! sketch) plus property tests for the quantified invariants.

use corecache::policy::PolicyKind;
use corecache::sketch::FrequencySketch;
use corecache::Cache;
use proptest::prelude::*;

// ============================================================================
// Scenario B — W-TinyLFU protects the hot key
// ============================================================================

#[test]
fn scenario_b_window_tinylfu_protects_the_hot_key() {
    let cache: Cache<String, u64> = Cache::builder()
        .maximum_size(100)
        .eviction_policy(PolicyKind::WindowTinyLfu)
        .shard_count(1)
        .build()
        .unwrap();

    for i in 0..100u64 {
        cache.put(format!("k{i}"), i);
    }

    for _ in 0..10_000 {
        cache.get(&"k0".to_string());
    }

    for i in 0..1000u64 {
        cache.put(format!("new{i}"), i);
    }

    assert_eq!(
        cache.get(&"k0".to_string()),
        Some(0),
        "the hot key must survive the admission storm"
    );

    let admitted = (0..1000u64)
        .filter(|i| cache.contains_key(&format!("new{i}")))
        .count();
    assert!(
        admitted < 500,
        "a majority of cold \"new*\" keys should be admission-dropped, got {admitted} admitted"
    );
}

// ============================================================================
// Scenario D — loader coalescing (async)
// ============================================================================

#[tokio::test]
async fn scenario_d_loader_coalescing() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct NeverFails;
    impl std::fmt::Display for NeverFails {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "never fails")
        }
    }
    impl std::error::Error for NeverFails {}

    let cache: Arc<Cache<&str, u64>> = Arc::new(Cache::builder().maximum_size(10).build().unwrap());
    let invocations = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = cache.clone();
        let invocations = invocations.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_load_async("k", || {
                    let invocations = invocations.clone();
                    async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, NeverFails>(7u64)
                    }
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 7);
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1, "exactly one loader invocation should run");
}

// ============================================================================
// Scenario F — frequency sketch decay
// ============================================================================

#[test]
fn scenario_f_frequency_sketch_decay() {
    let mut sketch = FrequencySketch::with_capacity(16);
    for _ in 0..100 {
        sketch.increment(&"hot");
    }
    assert_eq!(sketch.frequency(&"hot"), 15, "should saturate at 15");

    for i in 0..400u64 {
        sketch.increment(&i);
    }
    assert!(sketch.frequency(&"hot") < 15, "decay should have halved the saturated counter");
}

// ============================================================================
// Quantified invariants (property tests)
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(u8, i32),
    Remove(u8),
    Get(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<u8>(), any::<i32>()).prop_map(|(k, v)| Op::Put(k, v)),
        any::<u8>().prop_map(Op::Remove),
        any::<u8>().prop_map(Op::Get),
    ]
}

proptest! {
    /// Invariant 1: `size() <= maximum_size` at every quiescent point.
    #[test]
    fn size_never_exceeds_maximum_size(ops in prop::collection::vec(op_strategy(), 0..500)) {
        let cache: Cache<u8, i32> = Cache::builder().maximum_size(16).shard_count(1).build().unwrap();
        for op in ops {
            match op {
                Op::Put(k, v) => cache.put(k, v),
                Op::Remove(k) => { cache.remove(&k); }
                Op::Get(k) => { cache.get(&k); }
            }
            prop_assert!(cache.size() as u64 <= 16);
        }
    }

    /// Invariant 6: `hit_count + miss_count` equals the number of `get`
    /// calls issued so far.
    #[test]
    fn hit_plus_miss_equals_get_calls(ops in prop::collection::vec(op_strategy(), 0..500)) {
        let cache: Cache<u8, i32> = Cache::builder().maximum_size(16).shard_count(1).build().unwrap();
        let mut get_calls = 0u64;
        for op in ops {
            match op {
                Op::Put(k, v) => cache.put(k, v),
                Op::Remove(k) => { cache.remove(&k); }
                Op::Get(k) => {
                    cache.get(&k);
                    get_calls += 1;
                }
            }
        }
        let snap = cache.stats();
        prop_assert_eq!(snap.hit_count + snap.miss_count, get_calls);
    }

    /// Invariant 2: `Σ weight(live) <= maximum_weight` for a weight-capped
    /// cache. Weight is re-derived from a shadow map tracking what each key
    /// was last put as, since the cache itself doesn't expose live weights.
    #[test]
    fn weight_sum_never_exceeds_maximum_weight(ops in prop::collection::vec(op_strategy(), 0..500)) {
        let weigh = |v: i32| (v as u64 % 8) + 1;
        let cache: Cache<u8, i32> = Cache::builder()
            .maximum_weight(64)
            .weigher(move |_, v: &i32| weigh(*v))
            .shard_count(1)
            .build()
            .unwrap();
        let mut shadow: std::collections::HashMap<u8, i32> = std::collections::HashMap::new();
        for op in ops {
            match op {
                Op::Put(k, v) => { cache.put(k, v); shadow.insert(k, v); }
                Op::Remove(k) => { cache.remove(&k); shadow.remove(&k); }
                Op::Get(k) => { cache.get(&k); }
            }
        }
        let total_weight: u64 = shadow
            .iter()
            .filter(|(k, _)| cache.contains_key(k))
            .map(|(_, v)| weigh(*v))
            .sum();
        prop_assert!(total_weight <= 64);
    }

    /// Invariant 4: a `get` immediately following a `put` for the same key,
    /// on the same thread with no intervening remove, returns that value.
    #[test]
    fn get_after_put_round_trips(key in any::<u8>(), value in any::<i32>()) {
        let cache: Cache<u8, i32> = Cache::builder().maximum_size(16).shard_count(1).build().unwrap();
        cache.put(key, value);
        prop_assert_eq!(cache.get(&key), Some(value));
    }
}

// ============================================================================
// Invariant 8 — frequency sketch bounds
// ============================================================================

proptest! {
    #[test]
    fn sketch_frequency_stays_within_bounds(increments in 0usize..200) {
        let mut sketch = FrequencySketch::with_capacity(64);
        for _ in 0..increments {
            sketch.increment(&"k");
        }
        let freq = sketch.frequency(&"k");
        prop_assert!(freq <= 15);
        if increments > 0 {
            prop_assert!(freq >= 1);
        }
    }

    #[test]
    fn sketch_reset_zeroes_frequency(increments in 0usize..50) {
        let mut sketch = FrequencySketch::with_capacity(64);
        for _ in 0..increments {
            sketch.increment(&"k");
        }
        sketch.reset();
        prop_assert_eq!(sketch.frequency(&"k"), 0);
    }
}
