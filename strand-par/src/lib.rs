//! Bridges a single-threaded lazy iterator onto a [`ThreadPool`].
//!
//! The source iterator is pulled only on the calling thread; items are
//! batched into chunks of [`ParConfig::chunk_size`] and each chunk becomes
//! one pool job. A permit channel (a bounded channel preloaded with
//! [`ParConfig::max_in_flight`] tokens) provides backpressure: the caller
//! must receive a permit before submitting a chunk, and each job returns
//! its permit when it finishes (including by panicking; the permit travels
//! in a guard that sends on drop).
//!
//! Results are unordered: chunks complete in whatever order the workers
//! get to them. Nothing here preserves the source sequence's order across
//! outputs, and reductions must use operators that tolerate that.
//!
//! # Example
//!
//! ```
//! use strand_par::{par_map_collect_unordered, ParConfig};
//! use strand_pool::ThreadPool;
//!
//! let pool = ThreadPool::new(4, 64);
//! let config = ParConfig::for_pool(&pool);
//!
//! let doubled = par_map_collect_unordered(0..1000u64, &pool, config, |x| 2 * x).unwrap();
//!
//! assert_eq!(doubled.len(), 1000);
//! assert_eq!(doubled.iter().sum::<u64>(), 999_000);
//!
//! pool.shutdown();
//! ```

#![warn(missing_docs, missing_debug_implementations)]

use std::sync::Arc;

use strand_channel::{channel, Receiver, Sender};
use strand_pool::ThreadPool;

/// Chunk size used by [`ParConfig::for_pool`].
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Tuning knobs for the iterator bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParConfig {
    /// Number of items pulled from the source per job.
    pub chunk_size: usize,
    /// Maximum number of submitted-but-unfinished jobs.
    pub max_in_flight: usize,
}

impl ParConfig {
    /// Creates a config, coercing both knobs up to at least 1.
    pub fn new(chunk_size: usize, max_in_flight: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Default config for `pool`: chunks of [`DEFAULT_CHUNK_SIZE`] items,
    /// `2 * pool.size()` jobs in flight.
    pub fn for_pool(pool: &ThreadPool) -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, 2 * pool.size())
    }

    /// Config for a workload of roughly `total_hint` items: chunks sized so
    /// each worker sees several jobs, `2 * pool.size()` in flight.
    pub fn for_workload(pool: &ThreadPool, total_hint: usize) -> Self {
        Self::new(total_hint / (4 * pool.size()), 2 * pool.size())
    }
}

/// Token held while a chunk is in flight, returned to the producer when
/// the job finishes, whether normally or by unwinding.
struct Permit {
    slot: Sender<()>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        // The producer may already have given up; a dead channel is fine.
        let _ = self.slot.try_send(());
    }
}

/// Builds the permit channel: capacity `max_in_flight`, fully preloaded.
fn permit_channel(max_in_flight: usize) -> (Sender<()>, Receiver<()>) {
    let (tx, rx) = channel(max_in_flight);
    for _ in 0..max_in_flight {
        let preloaded = tx.try_send(()).is_ok();
        debug_assert!(preloaded, "permit preload cannot exceed capacity");
    }
    (tx, rx)
}

/// Pulls up to `n` items from `items` into a fresh chunk.
fn next_chunk<T>(items: &mut dyn Iterator<Item = T>, n: usize) -> Vec<T> {
    let mut chunk = Vec::with_capacity(n);
    for _ in 0..n {
        match items.next() {
            Some(item) => chunk.push(item),
            None => break,
        }
    }
    chunk
}

/// Runs `f` on every item of `items`, chunked across the pool's workers.
///
/// Returns `true` iff every chunk was submitted; a `false` means the pool
/// closed mid-stream and the tail of the sequence was not processed. On
/// `true`, every submitted job has also finished by the time this returns.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// use strand_par::{par_each, ParConfig};
/// use strand_pool::ThreadPool;
///
/// let pool = ThreadPool::new(4, 64);
/// let sum = Arc::new(AtomicU64::new(0));
///
/// let sum2 = Arc::clone(&sum);
/// let done = par_each(0..100u64, &pool, ParConfig::for_pool(&pool), move |x| {
///     sum2.fetch_add(x, Ordering::Relaxed);
/// });
///
/// assert!(done);
/// assert_eq!(sum.load(Ordering::Relaxed), 99 * 100 / 2);
/// pool.shutdown();
/// ```
pub fn par_each<I, F>(items: I, pool: &ThreadPool, config: ParConfig, f: F) -> bool
where
    I: IntoIterator,
    I::Item: Send + 'static,
    F: Fn(I::Item) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let mut items = items.into_iter();
    let (permit_tx, permit_rx) = permit_channel(config.max_in_flight);

    loop {
        let chunk = next_chunk(&mut items, config.chunk_size);
        if chunk.is_empty() {
            break;
        }

        if permit_rx.recv().is_err() {
            return false;
        }
        let permit = Permit {
            slot: permit_tx.clone(),
        };

        let f = Arc::clone(&f);
        let submitted = pool.submit(move || {
            let _permit = permit;
            for item in chunk {
                (*f)(item);
            }
        });
        if submitted.is_err() {
            return false;
        }
    }

    // Completion barrier: every permit back in hand means every job done.
    for _ in 0..config.max_in_flight {
        if permit_rx.recv().is_err() {
            return false;
        }
    }
    true
}

/// Maps every item through `f` on the pool and collects the results.
///
/// Returns `None` if the pool closed before the whole sequence was
/// submitted. The output order is chunk-completion order, not source
/// order.
pub fn par_map_collect_unordered<I, U, F>(
    items: I,
    pool: &ThreadPool,
    config: ParConfig,
    f: F,
) -> Option<Vec<U>>
where
    I: IntoIterator,
    I::Item: Send + 'static,
    U: Send + 'static,
    F: Fn(I::Item) -> U + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let job: Arc<dyn Fn(Vec<I::Item>) -> Vec<U> + Send + Sync> =
        Arc::new(move |chunk: Vec<I::Item>| chunk.into_iter().map(|item| (*f)(item)).collect());

    let mut items = items.into_iter();
    collect_chunks(&mut items, pool, config, job)
}

/// Keeps the items `pred` accepts, evaluated on the pool, and collects
/// them.
///
/// Returns `None` if the pool closed before the whole sequence was
/// submitted. The output order is chunk-completion order, not source
/// order.
///
/// # Example
///
/// ```
/// use strand_par::{par_filter_collect_unordered, ParConfig};
/// use strand_pool::ThreadPool;
///
/// let pool = ThreadPool::new(4, 64);
///
/// let evens =
///     par_filter_collect_unordered(0..1000u64, &pool, ParConfig::for_pool(&pool), |x| x % 2 == 0)
///         .unwrap();
///
/// assert_eq!(evens.len(), 500);
/// assert_eq!(evens.iter().sum::<u64>(), 249_500);
/// pool.shutdown();
/// ```
pub fn par_filter_collect_unordered<I, P>(
    items: I,
    pool: &ThreadPool,
    config: ParConfig,
    pred: P,
) -> Option<Vec<I::Item>>
where
    I: IntoIterator,
    I::Item: Send + 'static,
    P: Fn(&I::Item) -> bool + Send + Sync + 'static,
{
    let pred = Arc::new(pred);
    let job: Arc<dyn Fn(Vec<I::Item>) -> Vec<I::Item> + Send + Sync> =
        Arc::new(move |chunk: Vec<I::Item>| {
            chunk.into_iter().filter(|item| (*pred)(item)).collect()
        });

    let mut items = items.into_iter();
    collect_chunks(&mut items, pool, config, job)
}

/// Maps on the pool, then folds the collected results locally.
///
/// A thin wrapper over [`par_map_collect_unordered`]: the fold runs on the
/// calling thread, in chunk-completion order. `reduce` must not care about
/// operand order.
pub fn par_map_reduce_unordered<I, U, F, R>(
    items: I,
    pool: &ThreadPool,
    config: ParConfig,
    map: F,
    init: U,
    reduce: R,
) -> Option<U>
where
    I: IntoIterator,
    I::Item: Send + 'static,
    U: Send + 'static,
    F: Fn(I::Item) -> U + Send + Sync + 'static,
    R: FnMut(U, U) -> U,
{
    let mapped = par_map_collect_unordered(items, pool, config, map)?;
    Some(mapped.into_iter().fold(init, reduce))
}

/// Shared producer loop for the collect variants.
///
/// The result channel is bounded by `max_in_flight`, so ready results are
/// drained opportunistically between submissions; the tail is drained once
/// every job's sender clone has dropped.
fn collect_chunks<T, U>(
    items: &mut dyn Iterator<Item = T>,
    pool: &ThreadPool,
    config: ParConfig,
    job: Arc<dyn Fn(Vec<T>) -> Vec<U> + Send + Sync>,
) -> Option<Vec<U>>
where
    T: Send + 'static,
    U: Send + 'static,
{
    let (permit_tx, permit_rx) = permit_channel(config.max_in_flight);
    let (result_tx, result_rx) = channel::<Vec<U>>(config.max_in_flight);
    let mut out = Vec::new();

    loop {
        while let Ok(mut ready) = result_rx.try_recv() {
            out.append(&mut ready);
        }

        let chunk = next_chunk(items, config.chunk_size);
        if chunk.is_empty() {
            break;
        }

        if permit_rx.recv().is_err() {
            return None;
        }
        let permit = Permit {
            slot: permit_tx.clone(),
        };

        let job = Arc::clone(&job);
        let result_tx = result_tx.clone();
        let submitted = pool.submit(move || {
            let _permit = permit;
            let _ = result_tx.send((*job)(chunk));
        });
        if submitted.is_err() {
            return None;
        }
    }

    // Only job-held clones remain; the stream ends when the last one drops.
    drop(result_tx);
    while let Ok(mut ready) = result_rx.recv() {
        out.append(&mut ready);
    }
    Some(out)
}
