//! A fixed-size worker pool fed by a bounded job queue.
//!
//! The pool is a [`strand_channel`] channel of boxed jobs plus `size`
//! worker threads, each looping on [`Receiver::recv`] until the queue
//! reports end-of-stream. Jobs reach workers only through that channel, so
//! shutdown is an exercise in endpoint accounting: [`close`] drops the
//! pool's sending half, workers drain whatever is already queued and then
//! exit, and [`join`] waits for them.
//!
//! A job that panics is contained to that job; the worker survives and
//! keeps pulling from the queue.
//!
//! [`close`]: ThreadPool::close
//! [`join`]: ThreadPool::join
//! [`Receiver::recv`]: strand_channel::Receiver::recv
//!
//! # Example
//!
//! ```
//! use strand_pool::ThreadPool;
//!
//! let pool = ThreadPool::new(4, 64);
//!
//! let result = pool.submit_with_result(|| 40 + 2);
//! assert_eq!(result.recv().unwrap(), 42);
//!
//! pool.shutdown();
//! ```

#![warn(missing_docs, missing_debug_implementations)]

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;
use strand_channel::{channel, Receiver, Sender};
use strand_thread::{Builder, Thread};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of worker threads pulling jobs from one bounded queue.
///
/// Dropping the pool shuts it down: the queue is closed, queued jobs still
/// run, and the drop blocks until every worker has exited.
pub struct ThreadPool {
    size: usize,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<Thread<()>>>,
}

impl ThreadPool {
    /// Creates a pool of `size` workers behind a job queue holding up to
    /// `queue_capacity` pending jobs.
    ///
    /// Worker threads are named `strand-worker-{index}`.
    ///
    /// # Panics
    ///
    /// Panics if `size` or `queue_capacity` is 0, or if the OS refuses to
    /// spawn a worker thread.
    pub fn new(size: usize, queue_capacity: usize) -> ThreadPool {
        assert!(size > 0, "pool size must be at least 1");
        let (tx, rx) = channel::<Job>(queue_capacity);

        let workers = (0..size)
            .map(|i| {
                let jobs = rx.clone();
                Builder::new()
                    .name(format!("strand-worker-{i}"))
                    .spawn(move || worker_loop(jobs))
                    .expect("failed to spawn pool worker thread")
            })
            .collect();

        ThreadPool {
            size,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Returns the number of worker threads.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Submits a job, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolClosed`] if [`close`](ThreadPool::close) or
    /// [`shutdown`](ThreadPool::shutdown) has been called.
    pub fn submit<F>(&self, f: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        // Clone the sender out so a full queue blocks only this caller,
        // not close() or other submitters.
        let tx = {
            let guard = self.sender.lock();
            match guard.as_ref() {
                Some(tx) => tx.clone(),
                None => return Err(PoolClosed),
            }
        };
        tx.send(Box::new(f)).map_err(|_| PoolClosed)
    }

    /// Submits a job and returns a receiver for its result.
    ///
    /// The job sends its return value through a private one-shot channel.
    /// If the pool is closed, or the job panics before producing a value,
    /// the receiver reports end-of-stream instead.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_pool::ThreadPool;
    ///
    /// let pool = ThreadPool::new(2, 16);
    ///
    /// let squares: Vec<_> = (0..4u64)
    ///     .map(|i| pool.submit_with_result(move || i * i))
    ///     .collect();
    ///
    /// let results: Vec<u64> = squares.into_iter().map(|rx| rx.recv().unwrap()).collect();
    /// assert_eq!(results, vec![0, 1, 4, 9]);
    /// ```
    pub fn submit_with_result<T, F>(&self, f: F) -> Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = channel(1);
        // If the submit fails the job is dropped here, taking `tx` with it,
        // and the receiver reports end-of-stream.
        let _ = self.submit(move || {
            let _ = tx.try_send(f());
        });
        rx
    }

    /// Closes the job queue. Idempotent.
    ///
    /// New submissions fail with [`PoolClosed`]; jobs already queued still
    /// run. Workers exit once the queue drains.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Returns `true` if the pool no longer accepts jobs.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Waits for every worker to exit.
    ///
    /// Workers only exit once the queue is closed and drained, so this must
    /// follow [`close`](ThreadPool::close), or use
    /// [`shutdown`](ThreadPool::shutdown), which does both. Returns
    /// immediately if the workers are already joined.
    pub fn join(&self) {
        let workers: Vec<Thread<()>> = {
            let mut guard = self.workers.lock();
            guard.drain(..).collect()
        };
        for worker in workers {
            let _ = worker.try_join();
        }
    }

    /// Closes the queue, then waits for every queued job to finish and
    /// every worker to exit. Idempotent.
    pub fn shutdown(&self) {
        self.close();
        self.join();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("size", &self.size)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn worker_loop(jobs: Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        // A panicking job must not take the worker down with it.
        let _ = panic::catch_unwind(AssertUnwindSafe(job));
    }
}

/// Error returned by [`ThreadPool::submit`] after the pool has closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolClosed;

impl fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread pool is closed")
    }
}

impl std::error::Error for PoolClosed {}
