//! Typed OS-thread handles.
//!
//! [`spawn`] runs a closure on a fresh OS thread and hands back a
//! [`Thread<T>`] owning the thread's eventual return value. Joining
//! consumes the handle, so a thread can be joined at most once; dropping an
//! unjoined handle detaches the thread instead.
//!
//! ```
//! let worker = strand_thread::spawn(|| 40 + 2);
//! assert_eq!(worker.join(), 42);
//! ```

#![warn(missing_docs, missing_debug_implementations)]

use std::any::Any;
use std::fmt;
use std::io;
use std::panic;
use std::thread;

/// Spawns an OS thread running `f` and returns a handle to its result.
///
/// Captured state travels inside the closure by value. Use [`Builder`] to
/// name the thread or size its stack.
///
/// # Panics
///
/// Panics if the OS refuses to spawn a thread (delegates to
/// [`std::thread::spawn`]).
pub fn spawn<T, F>(f: F) -> Thread<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Thread {
        handle: thread::spawn(f),
    }
}

/// Configuration for a new thread: name and stack size.
///
/// # Example
///
/// ```
/// use strand_thread::Builder;
///
/// let worker = Builder::new()
///     .name("fetcher")
///     .spawn(|| 2 * 21)
///     .unwrap();
/// assert_eq!(worker.join(), 42);
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    /// Creates a builder with no name and the platform's default stack size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the thread (visible in debuggers and panic messages).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the stack size in bytes for the new thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Spawns the thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn<T, F>(self, f: F) -> io::Result<Thread<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        Ok(Thread {
            handle: builder.spawn(f)?,
        })
    }
}

/// A handle to a spawned thread, owning its eventual return value.
///
/// Joining consumes the handle, which makes "join at most once" a
/// compile-time guarantee. Dropping an unjoined handle detaches the
/// thread: it keeps running, and its return value is dropped when it
/// finishes.
pub struct Thread<T> {
    handle: thread::JoinHandle<T>,
}

impl<T> Thread<T> {
    /// Blocks until the thread exits and returns its result.
    ///
    /// # Panics
    ///
    /// If the thread panicked, the panic is resumed on the calling thread.
    /// Use [`try_join`](Thread::try_join) to recover the payload instead.
    pub fn join(self) -> T {
        match self.handle.join() {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Blocks until the thread exits, recovering a panic as an error.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError`] carrying the panic payload if the thread
    /// panicked instead of returning.
    ///
    /// # Example
    ///
    /// ```
    /// let worker = strand_thread::spawn(|| -> u64 { panic!("boom") });
    ///
    /// let err = worker.try_join().unwrap_err();
    /// assert_eq!(err.panic_message(), Some("boom"));
    /// ```
    pub fn try_join(self) -> Result<T, JoinError> {
        self.handle.join().map_err(JoinError)
    }

    /// Returns `true` if the thread has finished running.
    ///
    /// A `true` result means a join will not block.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> fmt::Debug for Thread<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.handle.thread().name())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// Error returned by [`Thread::try_join`] when the thread panicked.
///
/// Carries the panic payload so the caller can inspect or re-raise it.
pub struct JoinError(Box<dyn Any + Send + 'static>);

impl JoinError {
    /// Returns the panic payload.
    pub fn into_panic(self) -> Box<dyn Any + Send + 'static> {
        self.0
    }

    /// Returns the panic message, if it was a string.
    pub fn panic_message(&self) -> Option<&str> {
        if let Some(s) = self.0.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.0.downcast_ref::<String>().map(String::as_str)
        }
    }
}

impl fmt::Debug for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinError")
            .field("message", &self.panic_message())
            .finish()
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.panic_message() {
            Some(msg) => write!(f, "thread panicked: {msg}"),
            None => write!(f, "thread panicked"),
        }
    }
}

impl std::error::Error for JoinError {}
