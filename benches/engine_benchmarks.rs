//! Engine Benchmarks
//!
//! Measures the hot paths of the generalized `Cache<K, V>` engine: sequential
//! get/put against each eviction policy, and concurrent mixed read/write
//! throughput under contention.

use corecache::policy::PolicyKind;
use corecache::Cache;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

const CACHE_SIZE: u64 = 10_000;
const OPS_PER_THREAD: usize = 1_000;

fn make_cache(capacity: u64, policy: PolicyKind) -> Cache<usize, usize> {
    Cache::builder()
        .maximum_size(capacity)
        .eviction_policy(policy)
        .build()
        .unwrap()
}

const POLICIES: &[(&str, PolicyKind)] = &[
    ("LRU", PolicyKind::Lru),
    ("LFU", PolicyKind::Lfu),
    ("FIFO", PolicyKind::Fifo),
    ("WindowTinyLFU", PolicyKind::WindowTinyLfu),
];

fn sequential_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sequential Get (hit)");
    for &(name, policy) in POLICIES {
        let cache = make_cache(CACHE_SIZE, policy);
        for i in 0..CACHE_SIZE as usize {
            cache.put(i, i);
        }
        group.bench_with_input(BenchmarkId::from_parameter(name), &cache, |b, cache| {
            let mut i = 0usize;
            b.iter(|| {
                let key = i % CACHE_SIZE as usize;
                black_box(cache.get(&key));
                i += 1;
            });
        });
    }
    group.finish();
}

fn sequential_put_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sequential Put (steady-state eviction)");
    for &(name, policy) in POLICIES {
        let cache = make_cache(1_000, policy);
        for i in 0..1_000usize {
            cache.put(i, i);
        }
        group.bench_with_input(BenchmarkId::from_parameter(name), &cache, |b, cache| {
            let mut i = 1_000usize;
            b.iter(|| {
                cache.put(i, i);
                i += 1;
            });
        });
    }
    group.finish();
}

fn run_concurrent_mixed(cache: Arc<Cache<usize, usize>>, num_threads: usize, ops_per_thread: usize) {
    let mut handles = Vec::with_capacity(num_threads);
    for t in 0..num_threads {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                let key = (t * ops_per_thread + i) % CACHE_SIZE as usize;
                if i % 5 == 0 {
                    cache.put(key, key);
                } else {
                    black_box(cache.get(&key));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn concurrent_mixed_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Mixed Read/Write");
    group.throughput(Throughput::Elements((8 * OPS_PER_THREAD) as u64));

    for &(name, policy) in POLICIES {
        let cache: Arc<Cache<usize, usize>> = Arc::new(make_cache(CACHE_SIZE, policy));
        for i in 0..CACHE_SIZE as usize {
            cache.put(i, i);
        }
        group.bench_function(name, |b| {
            b.iter(|| {
                run_concurrent_mixed(Arc::clone(&cache), 8, OPS_PER_THREAD);
            });
        });
    }
    group.finish();
}

fn compute_if_absent_hit_path(c: &mut Criterion) {
    let cache = make_cache(CACHE_SIZE, PolicyKind::Lru);
    cache.put(1, 1);
    c.bench_function("compute_if_absent (hit)", |b| {
        b.iter(|| {
            black_box(cache.compute_if_absent(1, || Ok::<_, std::convert::Infallible>(1)).unwrap());
        });
    });
}

criterion_group!(
    benches,
    sequential_get_hit,
    sequential_put_with_eviction,
    concurrent_mixed_throughput,
    compute_if_absent_hit_path
);
criterion_main!(benches);
