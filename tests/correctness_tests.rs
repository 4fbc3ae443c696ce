//! Correctness Tests for Cache Algorithms
//!
//! Validates the fundamental correctness of each eviction policy using
//! simple, predictable access patterns against a single-shard cache (so
//! eviction order is cache-wide, not merely per-shard). Each test explicitly
//! checks which key gets evicted when a put causes an eviction.

use corecache::policy::PolicyKind;
use corecache::Cache;

/// Helper to build a single-shard cache with a given eviction policy.
fn make_cache<K, V>(capacity: u64, policy: PolicyKind) -> Cache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    Cache::builder()
        .maximum_size(capacity)
        .eviction_policy(policy)
        .shard_count(1)
        .build()
        .unwrap()
}

// ============================================================================
// LRU CORRECTNESS
// ============================================================================

#[test]
fn lru_evicts_least_recently_used() {
    let cache = make_cache(3, PolicyKind::Lru);

    cache.put(1, 10);
    cache.put(2, 20);
    cache.put(3, 30);
    // Order: 1 (LRU) -> 2 -> 3 (MRU)

    assert!(cache.get(&1).is_some(), "key 1 should be present");
    assert!(cache.get(&2).is_some(), "key 2 should be present");
    assert!(cache.get(&3).is_some(), "key 3 should be present");
    // After the reads above: order is now 1 -> 2 -> 3

    cache.put(4, 40);
    assert!(cache.get(&1).is_none(), "key 1 should have been evicted (was LRU)");
    assert!(cache.get(&2).is_some(), "key 2 should remain");
    assert!(cache.get(&3).is_some(), "key 3 should remain");
    assert!(cache.get(&4).is_some(), "key 4 should be present");
}

#[test]
fn lru_get_updates_recency() {
    let cache = make_cache(3, PolicyKind::Lru);

    cache.put(1, 10);
    cache.put(2, 20);
    cache.put(3, 30);
    // Order: 1 (LRU) -> 2 -> 3 (MRU)

    assert_eq!(cache.get(&1), Some(10));
    // Order: 2 (LRU) -> 3 -> 1 (MRU)

    cache.put(4, 40);
    assert!(cache.get(&1).is_some(), "key 1 should survive due to recent access");
    assert!(cache.get(&2).is_none(), "key 2 should be evicted (was LRU)");
    assert!(cache.get(&3).is_some(), "key 3 should remain");
}

// Scenario A from spec.md §8.
#[test]
fn scenario_a_lru_eviction_order() {
    let cache = make_cache(3, PolicyKind::Lru);

    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);
    cache.get(&"a");
    cache.put("d", 4);

    assert_eq!(cache.get(&"b"), None, "\"b\" is the LRU key once \"a\" was touched");
    assert_eq!(cache.get(&"a"), Some(1));
    assert_eq!(cache.get(&"c"), Some(3));
    assert_eq!(cache.get(&"d"), Some(4));
}

// ============================================================================
// LFU CORRECTNESS
// ============================================================================

#[test]
fn lfu_evicts_least_frequently_used() {
    let cache = make_cache(3, PolicyKind::Lfu);

    cache.put(1, 10);
    cache.put(2, 20);
    cache.put(3, 30);
    // Touch 1 and 2 repeatedly so 3 is the least frequently accessed.
    cache.get(&1);
    cache.get(&1);
    cache.get(&2);

    cache.put(4, 40);
    assert!(cache.get(&3).is_none(), "key 3 should be evicted (lowest frequency)");
    assert!(cache.get(&1).is_some());
    assert!(cache.get(&2).is_some());
    assert!(cache.get(&4).is_some());
}

// ============================================================================
// FIFO / FILO CORRECTNESS
// ============================================================================

#[test]
fn fifo_evicts_oldest_insertion_regardless_of_access() {
    let cache = make_cache(3, PolicyKind::Fifo);

    cache.put(1, 10);
    cache.put(2, 20);
    cache.put(3, 30);
    // Touching 1 should not save it from FIFO eviction.
    cache.get(&1);
    cache.get(&1);

    cache.put(4, 40);
    assert!(cache.get(&1).is_none(), "key 1 should be evicted (oldest insertion)");
    assert!(cache.get(&2).is_some());
    assert!(cache.get(&3).is_some());
    assert!(cache.get(&4).is_some());
}

#[test]
fn filo_evicts_most_recent_insertion() {
    let cache = make_cache(3, PolicyKind::Filo);

    cache.put(1, 10);
    cache.put(2, 20);
    cache.put(3, 30);

    cache.put(4, 40);
    assert!(cache.get(&3).is_none(), "key 3 should be evicted (most recent insertion)");
    assert!(cache.get(&1).is_some());
    assert!(cache.get(&2).is_some());
    assert!(cache.get(&4).is_some());
}

// ============================================================================
// EXPIRATION — Scenario C from spec.md §8
// ============================================================================

#[test]
fn scenario_c_expire_after_write() {
    use corecache::stats::{Event, Listener};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct ExpireCounter(AtomicUsize);
    impl Listener<&'static str, &'static str> for ExpireCounter {
        fn on_event(&self, event: &Event<'_, &'static str, &'static str>) {
            if matches!(event, Event::Expire { .. }) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let clock = Arc::new(corecache::clock::ManualClock::new());
    let counter = Arc::new(ExpireCounter(AtomicUsize::new(0)));
    let cache: Cache<&str, &str> = Cache::builder()
        .maximum_size(10)
        .expire_after_write(Duration::from_millis(100))
        .clock(clock.clone())
        .listener(counter.clone())
        .build()
        .unwrap();

    cache.put("x", "v");
    clock.advance(Duration::from_millis(50));
    assert_eq!(cache.get(&"x"), Some("v"));

    clock.advance(Duration::from_millis(60));
    assert_eq!(cache.get(&"x"), None);
    assert_eq!(counter.0.load(Ordering::SeqCst), 1, "EXPIRED should fire exactly once");
}

// ============================================================================
// WEIGHT-BASED CAPACITY — Scenario E from spec.md §8
// ============================================================================

#[test]
fn scenario_e_weight_based_eviction() {
    let cache: Cache<u32, String> = Cache::builder()
        .maximum_weight(100)
        .weigher(|_, v: &String| v.len() as u64)
        .shard_count(1)
        .build()
        .unwrap();

    for i in 0..10u32 {
        cache.put(i, "x".repeat(15));
    }

    let live = (0..10u32).filter(|k| cache.contains_key(k)).count();
    assert!(live * 15 <= 100, "current weight must stay within the configured bound");
    assert!(10 - live >= 5, "at least five keys should have been evicted to stay under weight 100");
    assert!(cache.stats().eviction_count as usize >= 5);
}

// ============================================================================
// REMOVE / CLEAR / CONTAINS
// ============================================================================

#[test]
fn remove_returns_value_and_forgets_key() {
    let cache = make_cache::<&str, i32>(10, PolicyKind::Lru);
    cache.put("a", 1);
    assert_eq!(cache.remove(&"a"), Some(1));
    assert!(!cache.contains_key(&"a"));
    assert_eq!(cache.remove(&"a"), None);
}

#[test]
fn clear_empties_every_shard() {
    let cache = make_cache::<&str, i32>(10, PolicyKind::Lru);
    cache.put("a", 1);
    cache.put("b", 2);
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.size(), 0);
}

#[test]
fn hit_and_miss_counters_track_every_get() {
    let cache = make_cache::<&str, i32>(10, PolicyKind::Lru);
    cache.put("a", 1);
    cache.get(&"a");
    cache.get(&"a");
    cache.get(&"missing");
    let snap = cache.stats();
    assert_eq!(snap.hit_count, 2);
    assert_eq!(snap.miss_count, 1);
}

#[test]
fn compute_if_absent_loads_once_and_caches() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct NeverFails;
    impl std::fmt::Display for NeverFails {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "never fails")
        }
    }
    impl std::error::Error for NeverFails {}

    let cache = make_cache::<&str, i32>(10, PolicyKind::Lru);
    let loads = AtomicUsize::new(0);

    let first = cache
        .compute_if_absent("a", || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, NeverFails>(42)
        })
        .unwrap();
    let second = cache
        .compute_if_absent("a", || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, NeverFails>(999)
        })
        .unwrap();

    assert_eq!(first, 42);
    assert_eq!(second, 42, "second call should observe the cached value, not reload");
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}
