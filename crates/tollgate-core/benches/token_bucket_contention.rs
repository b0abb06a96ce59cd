//! Benchmark: token bucket throughput under contention
//!
//! Measures `consume(1)` on one shared bucket from 1..16 threads, plus the
//! single-threaded cost of the read-only paths.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use tollgate_core::clock::ManualClock;
use tollgate_core::token_bucket::TokenBucket;

// ===========================================================================
// Shared bucket, many threads
// ===========================================================================

fn bench_consume_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("consume_contention");
    group.sample_size(20);

    for &threads in &[1usize, 4, 8, 16] {
        let ops_per_thread = 10_000usize;

        group.bench_with_input(
            BenchmarkId::new("monotonic_clock", threads),
            &threads,
            |b, &threads| {
                // Large enough that the bucket never runs dry mid-iteration.
                let bucket = Arc::new(TokenBucket::new(1e12, 1.0).unwrap());
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let bucket = Arc::clone(&bucket);
                            std::thread::spawn(move || {
                                for _ in 0..ops_per_thread {
                                    black_box(bucket.consume(1.0).unwrap());
                                }
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("denied_path", threads),
            &threads,
            |b, &threads| {
                let clock = Arc::new(ManualClock::new());
                let bucket = Arc::new(TokenBucket::with_clock(1.0, 1.0, 1.0, clock).unwrap());
                bucket.consume(1.0).unwrap();
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let bucket = Arc::clone(&bucket);
                            std::thread::spawn(move || {
                                for _ in 0..ops_per_thread {
                                    black_box(bucket.try_acquire_one());
                                }
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

// ===========================================================================
// Single-threaded paths
// ===========================================================================

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread");
    let bucket = TokenBucket::new(1e12, 1.0).unwrap();

    group.bench_function("consume", |b| {
        b.iter(|| black_box(bucket.consume(black_box(1.0)).unwrap()));
    });
    group.bench_function("get_available_tokens", |b| {
        b.iter(|| black_box(bucket.get_available_tokens()));
    });
    group.bench_function("wait_time", |b| {
        b.iter(|| black_box(bucket.wait_time(black_box(5.0)).unwrap()));
    });
    group.bench_function("stats", |b| {
        b.iter(|| black_box(bucket.stats()));
    });

    group.finish();
}

criterion_group!(benches, bench_consume_contention, bench_single_thread);
criterion_main!(benches);
