//! Concurrent Store Benchmarks
//!
//! Benchmarks for measuring concurrent store performance across different
//! access patterns and shard configurations.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wtlfu_cache::{Store, StoreConfig};

const CACHE_SIZE: usize = 10_000;
const OPS_PER_THREAD: usize = 1_000;

fn make_store(shards: usize) -> Arc<Store<usize, usize>> {
    let config = StoreConfig::new(NonZeroUsize::new(CACHE_SIZE).unwrap()).with_shards(shards);
    Arc::new(Store::init(config, None, None))
}

fn fill(store: &Store<usize, usize>) {
    for i in 0..CACHE_SIZE {
        store.set(i, i, Duration::ZERO);
        store.set(i, i, Duration::ZERO);
    }
    store.flush();
}

/// Benchmark concurrent read operations
fn concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Reads");
    group.throughput(Throughput::Elements((8 * OPS_PER_THREAD) as u64));

    let store = make_store(16);
    fill(&store);

    group.bench_function("W-TinyLFU", |b| {
        b.iter(|| run_concurrent_reads(Arc::clone(&store), 8, OPS_PER_THREAD));
    });

    group.finish();
}

/// Benchmark concurrent write operations
fn concurrent_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Writes");
    group.throughput(Throughput::Elements((8 * OPS_PER_THREAD) as u64));

    let store = make_store(16);

    group.bench_function("W-TinyLFU", |b| {
        b.iter(|| run_concurrent_writes(Arc::clone(&store), 8, OPS_PER_THREAD));
    });

    group.finish();
}

/// Benchmark mixed read/write workload (80% reads, 20% writes)
fn concurrent_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Mixed");
    group.throughput(Throughput::Elements((8 * OPS_PER_THREAD) as u64));

    let store = make_store(16);
    fill(&store);

    group.bench_function("W-TinyLFU", |b| {
        b.iter(|| run_concurrent_mixed(Arc::clone(&store), 8, OPS_PER_THREAD));
    });

    group.finish();
}

/// Compare performance with different shard counts
fn shard_count_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("Shard Count Comparison");
    group.throughput(Throughput::Elements((8 * OPS_PER_THREAD) as u64));

    for shards in [1, 2, 4, 8, 16, 32] {
        let store = make_store(shards);
        fill(&store);

        group.bench_with_input(BenchmarkId::new("mixed", shards), &shards, |b, _| {
            b.iter(|| run_concurrent_mixed(Arc::clone(&store), 8, OPS_PER_THREAD));
        });
    }

    group.finish();
}

fn run_concurrent_reads(store: Arc<Store<usize, usize>>, num_threads: usize, ops_per_thread: usize) {
    let mut handles = Vec::with_capacity(num_threads);
    for t in 0..num_threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                let key = (t * ops_per_thread + i) % CACHE_SIZE;
                black_box(store.get(&key));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn run_concurrent_writes(store: Arc<Store<usize, usize>>, num_threads: usize, ops_per_thread: usize) {
    let mut handles = Vec::with_capacity(num_threads);
    for t in 0..num_threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                let key = t * ops_per_thread + i;
                black_box(store.set(key, i, Duration::ZERO));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn run_concurrent_mixed(store: Arc<Store<usize, usize>>, num_threads: usize, ops_per_thread: usize) {
    let mut handles = Vec::with_capacity(num_threads);
    for t in 0..num_threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                let key = (t * ops_per_thread + i) % CACHE_SIZE;
                if i % 5 == 0 {
                    store.set(key, i, Duration::ZERO);
                } else {
                    black_box(store.get(&key));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

criterion_group!(
    benches,
    concurrent_reads,
    concurrent_writes,
    concurrent_mixed,
    shard_count_comparison
);
criterion_main!(benches);
