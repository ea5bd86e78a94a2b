//! Benchmarks for channel send/recv performance.
//!
//! Compares strand-channel against crossbeam-channel's bounded channel.

use criterion::{criterion_group, criterion_main, black_box, BenchmarkId, Criterion, Throughput};
use std::thread;

// ============================================================================
// Single-operation latency benchmarks
// ============================================================================

fn bench_channel_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_latency");

    group.bench_function("strand/u64", |b| {
        let (tx, rx) = strand_channel::channel::<u64>(1024);
        b.iter(|| {
            tx.try_send(black_box(42u64)).unwrap();
            black_box(rx.try_recv().unwrap())
        });
    });

    group.bench_function("crossbeam/u64", |b| {
        let (tx, rx) = crossbeam_channel::bounded::<u64>(1024);
        b.iter(|| {
            tx.try_send(black_box(42u64)).unwrap();
            black_box(rx.try_recv().unwrap())
        });
    });

    // 256-byte message
    #[allow(unused)]
    #[derive(Debug, Clone, Copy)]
    struct Message256([u64; 32]);

    group.bench_function("strand/256b", |b| {
        let (tx, rx) = strand_channel::channel::<Message256>(1024);
        let msg = Message256([42; 32]);
        b.iter(|| {
            tx.try_send(black_box(msg)).unwrap();
            black_box(rx.try_recv().unwrap())
        });
    });

    group.bench_function("crossbeam/256b", |b| {
        let (tx, rx) = crossbeam_channel::bounded::<Message256>(1024);
        let msg = Message256([42; 32]);
        b.iter(|| {
            tx.try_send(black_box(msg)).unwrap();
            black_box(rx.try_recv().unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Multi-producer throughput benchmarks
// ============================================================================

fn bench_channel_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_throughput");

    const MESSAGES_PER_PRODUCER: usize = 25_000;

    for num_producers in [1, 2, 4, 8] {
        let total_messages = MESSAGES_PER_PRODUCER * num_producers;
        group.throughput(Throughput::Elements(total_messages as u64));

        group.bench_with_input(
            BenchmarkId::new("strand", num_producers),
            &num_producers,
            |b, &n| {
                b.iter(|| {
                    let (tx, rx) = strand_channel::channel::<u64>(1024);

                    let handles: Vec<_> = (0..n)
                        .map(|_| {
                            let tx = tx.clone();
                            thread::spawn(move || {
                                for i in 0..MESSAGES_PER_PRODUCER {
                                    tx.send(i as u64).unwrap();
                                }
                            })
                        })
                        .collect();

                    drop(tx);

                    let mut count = 0;
                    while let Ok(v) = rx.recv() {
                        black_box(v);
                        count += 1;
                    }
                    assert_eq!(count, MESSAGES_PER_PRODUCER * n);

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam", num_producers),
            &num_producers,
            |b, &n| {
                b.iter(|| {
                    let (tx, rx) = crossbeam_channel::bounded::<u64>(1024);

                    let handles: Vec<_> = (0..n)
                        .map(|_| {
                            let tx = tx.clone();
                            thread::spawn(move || {
                                for i in 0..MESSAGES_PER_PRODUCER {
                                    tx.send(i as u64).unwrap();
                                }
                            })
                        })
                        .collect();

                    drop(tx);

                    let mut count = 0;
                    while let Ok(v) = rx.recv() {
                        black_box(v);
                        count += 1;
                    }
                    assert_eq!(count, MESSAGES_PER_PRODUCER * n);

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Contention benchmark (many producers, small buffer)
// ============================================================================

fn bench_channel_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_contention");

    const MESSAGES_PER_PRODUCER: usize = 10_000;
    const NUM_PRODUCERS: usize = 8;
    const TOTAL: usize = MESSAGES_PER_PRODUCER * NUM_PRODUCERS;

    group.throughput(Throughput::Elements(TOTAL as u64));

    group.bench_function("strand/small_buffer", |b| {
        b.iter(|| {
            let (tx, rx) = strand_channel::channel::<u64>(64); // Small!

            let handles: Vec<_> = (0..NUM_PRODUCERS)
                .map(|_| {
                    let tx = tx.clone();
                    thread::spawn(move || {
                        for i in 0..MESSAGES_PER_PRODUCER {
                            tx.send(i as u64).unwrap();
                        }
                    })
                })
                .collect();

            drop(tx);

            let mut count = 0;
            while rx.recv().is_ok() {
                count += 1;
            }
            assert_eq!(count, TOTAL);

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.bench_function("crossbeam/small_buffer", |b| {
        b.iter(|| {
            let (tx, rx) = crossbeam_channel::bounded::<u64>(64); // Small!

            let handles: Vec<_> = (0..NUM_PRODUCERS)
                .map(|_| {
                    let tx = tx.clone();
                    thread::spawn(move || {
                        for i in 0..MESSAGES_PER_PRODUCER {
                            tx.send(i as u64).unwrap();
                        }
                    })
                })
                .collect();

            drop(tx);

            let mut count = 0;
            while rx.recv().is_ok() {
                count += 1;
            }
            assert_eq!(count, TOTAL);

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_channel_latency,
    bench_channel_throughput,
    bench_channel_contention,
);

criterion_main!(benches);
