//! A bounded blocking channel with explicit endpoint-count lifecycle.
//!
//! Both halves of the channel are cloneable: any number of senders may feed
//! any number of receivers through one fixed-capacity FIFO buffer. The
//! channel state is protected by a single mutex, with two condition
//! variables (`can_send`, `can_recv`) providing the blocking semantics.
//!
//! # Endpoint accounting
//!
//! The channel keeps a sender count and a receiver count, both mutated only
//! under the channel lock. Cloning an endpoint bumps its count; dropping one
//! decrements it. The counts drive the whole lifecycle:
//!
//! - When the last sender drops, the channel closes. Receivers drain what
//!   is buffered, then observe end-of-stream.
//! - When the last receiver drops, the channel closes **and every buffered
//!   message is dropped immediately**: nothing is left to consume them.
//! - The channel itself is freed when the last endpoint of either kind
//!   goes away.
//!
//! Closing is monotonic: once a channel is closed it stays closed, whether
//! that happened through [`Sender::close`], [`Receiver::close`], or an
//! endpoint count reaching zero.
//!
//! # Blocking
//!
//! [`Sender::send`] and [`Receiver::recv`] progress through three phases:
//! an immediate attempt, a bounded [`Backoff`] snooze loop, and finally a
//! condition-variable sleep. The snooze phase catches the common case where
//! the other side is about to make room, without paying for a full park.
//!
//! Every condition-variable wait sits in a predicate loop, so a wake-up
//! caused by closing (rather than by space or data) is classified
//! correctly.
//!
//! # Quick start
//!
//! ```
//! use std::thread;
//!
//! use strand_channel::channel;
//!
//! let (tx, rx) = channel::<u64>(64);
//!
//! let producer = thread::spawn(move || {
//!     for i in 0..100 {
//!         tx.send(i).unwrap();
//!     }
//! });
//!
//! let mut sum = 0;
//! while let Ok(v) = rx.recv() {
//!     sum += v;
//! }
//!
//! producer.join().unwrap();
//! assert_eq!(sum, 99 * 100 / 2);
//! ```
//!
//! # Disconnection
//!
//! ```
//! use strand_channel::{channel, TryRecvError};
//!
//! let (tx, rx) = channel::<u64>(4);
//!
//! tx.send(1).unwrap();
//! tx.send(2).unwrap();
//! drop(tx);
//!
//! // Buffered messages survive sender disconnection...
//! assert_eq!(rx.recv().unwrap(), 1);
//! assert_eq!(rx.recv().unwrap(), 2);
//!
//! // ...then the stream ends.
//! assert!(rx.recv().is_err());
//! assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
//! ```

#![warn(missing_docs, missing_debug_implementations)]

use std::fmt;
use std::sync::Arc;

use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};

/// Fixed-capacity FIFO ring. `tail` is derived: `(head + len) % capacity`.
struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    fn try_new(capacity: usize) -> Result<Self, ChannelError> {
        let mut slots: Vec<Option<T>> = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| ChannelError::Alloc)?;
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            len: 0,
        })
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    fn push(&mut self, value: T) {
        debug_assert!(self.len < self.slots.len());
        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = Some(value);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.head].take();
        debug_assert!(value.is_some());
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        value
    }

    fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Mutable channel state. Everything here is touched only under the lock.
struct State<T> {
    ring: Ring<T>,
    senders: usize,
    receivers: usize,
    closed: bool,
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    /// Signalled when a slot frees up or the channel closes.
    can_send: Condvar,
    /// Signalled when a message arrives or the channel closes.
    can_recv: Condvar,
}

impl<T> Shared<T> {
    /// Marks the channel closed and wakes every waiter. Idempotent.
    fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            self.can_send.notify_all();
            self.can_recv.notify_all();
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Creates a bounded channel with the given capacity.
///
/// Returns a connected `(Sender, Receiver)` pair; either half can be cloned
/// to add producers or consumers.
///
/// # Panics
///
/// Panics if `capacity` is 0. Use [`try_channel`] to get a structured error
/// instead.
///
/// # Example
///
/// ```
/// use strand_channel::channel;
///
/// let (tx, rx) = channel::<String>(8);
///
/// tx.send("hello".to_string()).unwrap();
/// assert_eq!(rx.recv().unwrap(), "hello");
/// ```
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    assert!(capacity > 0, "channel capacity must be at least 1");
    endpoints(Ring::new(capacity))
}

/// Fallible variant of [`channel`].
///
/// # Errors
///
/// Returns [`ChannelError::Capacity`] when `capacity` is 0, and
/// [`ChannelError::Alloc`] when the slot buffer cannot be allocated.
///
/// # Example
///
/// ```
/// use strand_channel::{try_channel, ChannelError};
///
/// assert_eq!(try_channel::<u64>(0).unwrap_err(), ChannelError::Capacity);
///
/// let (tx, rx) = try_channel::<u64>(4).unwrap();
/// tx.send(7).unwrap();
/// assert_eq!(rx.recv().unwrap(), 7);
/// ```
pub fn try_channel<T>(capacity: usize) -> Result<(Sender<T>, Receiver<T>), ChannelError> {
    if capacity == 0 {
        return Err(ChannelError::Capacity);
    }
    Ok(endpoints(Ring::try_new(capacity)?))
}

fn endpoints<T>(ring: Ring<T>) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        capacity: ring.capacity(),
        state: Mutex::new(State {
            ring,
            senders: 1,
            receivers: 1,
            closed: false,
        }),
        can_send: Condvar::new(),
        can_recv: Condvar::new(),
    });

    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

/// The sending half of a channel.
///
/// Cloning a `Sender` registers another producer; the channel closes when
/// the last one is dropped.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Sends a message, blocking while the buffer is full.
    ///
    /// Returns `Err(SendError(value))`, handing the message back, if the
    /// channel is closed or every receiver has been dropped, including when
    /// that happens while this call is waiting for a free slot.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_channel::channel;
    ///
    /// let (tx, rx) = channel::<u64>(2);
    ///
    /// tx.send(1).unwrap();
    /// drop(rx);
    ///
    /// // No receivers left: the payload comes back.
    /// assert_eq!(tx.send(2).unwrap_err().into_inner(), 2);
    /// ```
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        let mut value = value;

        // Fast path plus a bounded snooze before committing to a sleep.
        let backoff = Backoff::new();
        loop {
            match self.try_send(value) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(v)) => return Err(SendError(v)),
                Err(TrySendError::Full(v)) => value = v,
            }
            if backoff.is_completed() {
                break;
            }
            backoff.snooze();
        }

        // Block phase.
        let mut state = self.shared.state.lock();
        loop {
            if state.closed || state.receivers == 0 {
                return Err(SendError(value));
            }
            if !state.ring.is_full() {
                state.ring.push(value);
                self.shared.can_recv.notify_one();
                return Ok(());
            }
            self.shared.can_send.wait(&mut state);
        }
    }

    /// Attempts to send without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Err(TrySendError::Full(value))` when the buffer is at
    /// capacity, and `Err(TrySendError::Disconnected(value))` when the
    /// channel is closed or no receiver remains. The message is handed back
    /// in both cases.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_channel::{channel, TrySendError};
    ///
    /// let (tx, _rx) = channel::<u64>(1);
    ///
    /// assert!(tx.try_send(1).is_ok());
    /// assert!(matches!(tx.try_send(2), Err(TrySendError::Full(2))));
    /// ```
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut state = self.shared.state.lock();
        if state.closed || state.receivers == 0 {
            return Err(TrySendError::Disconnected(value));
        }
        if state.ring.is_full() {
            return Err(TrySendError::Full(value));
        }
        state.ring.push(value);
        self.shared.can_recv.notify_one();
        Ok(())
    }

    /// Closes the channel, waking every blocked sender and receiver.
    ///
    /// Buffered messages stay available to receivers. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Returns `true` if the channel is closed.
    ///
    /// A closed channel rejects new messages; receivers may still drain
    /// what is buffered.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Returns the capacity of the channel.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.state.lock().senders += 1;
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.senders -= 1;
        if state.senders == 0 && !state.closed {
            state.closed = true;
            self.shared.can_send.notify_all();
            self.shared.can_recv.notify_all();
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// The receiving half of a channel.
///
/// Cloning a `Receiver` registers another consumer; when the last one is
/// dropped the channel closes and any buffered messages are dropped with
/// it.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Receives a message, blocking while the buffer is empty.
    ///
    /// A closed channel is drained first: `recv` keeps returning buffered
    /// messages and only reports `Err(RecvError)` once the channel is both
    /// closed and empty.
    ///
    /// # Example
    ///
    /// ```
    /// use std::thread;
    ///
    /// use strand_channel::channel;
    ///
    /// let (tx, rx) = channel::<u64>(4);
    ///
    /// thread::spawn(move || {
    ///     tx.send(42).unwrap();
    /// });
    ///
    /// assert_eq!(rx.recv().unwrap(), 42);
    /// ```
    pub fn recv(&self) -> Result<T, RecvError> {
        // Fast path plus a bounded snooze before committing to a sleep.
        let backoff = Backoff::new();
        loop {
            match self.try_recv() {
                Ok(value) => return Ok(value),
                Err(TryRecvError::Disconnected) => return Err(RecvError),
                Err(TryRecvError::Empty) => {}
            }
            if backoff.is_completed() {
                break;
            }
            backoff.snooze();
        }

        // Block phase.
        let mut state = self.shared.state.lock();
        loop {
            if let Some(value) = state.ring.pop() {
                self.shared.can_send.notify_one();
                return Ok(value);
            }
            if state.closed {
                return Err(RecvError);
            }
            self.shared.can_recv.wait(&mut state);
        }
    }

    /// Attempts to receive without blocking.
    ///
    /// Buffered messages are returned even after the channel has closed.
    ///
    /// # Errors
    ///
    /// Returns `Err(TryRecvError::Empty)` when nothing is buffered on an
    /// open channel, and `Err(TryRecvError::Disconnected)` once the channel
    /// is closed and drained.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut state = self.shared.state.lock();
        match state.ring.pop() {
            Some(value) => {
                self.shared.can_send.notify_one();
                Ok(value)
            }
            None => {
                if state.closed {
                    Err(TryRecvError::Disconnected)
                } else {
                    Err(TryRecvError::Empty)
                }
            }
        }
    }

    /// Returns the number of buffered messages.
    ///
    /// A snapshot: other endpoints may change it before the value is used.
    pub fn len(&self) -> usize {
        self.shared.state.lock().ring.len
    }

    /// Returns `true` if no messages are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes the channel, waking every blocked sender and receiver.
    ///
    /// Buffered messages stay available to [`try_recv`](Receiver::try_recv)
    /// and [`recv`](Receiver::recv); they are only dropped when the last
    /// receiver goes away. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Returns `true` if the channel is closed.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Returns the capacity of the channel.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.shared.state.lock().receivers += 1;
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.receivers -= 1;
        if state.receivers == 0 {
            state.closed = true;
            // Nothing is left to consume these.
            state.ring.clear();
            self.shared.can_send.notify_all();
            self.shared.can_recv.notify_all();
        }
    }
}

impl<T> Iterator for Receiver<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.recv().ok()
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error returned by [`channel`]'s fallible twin, [`try_channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// A capacity of zero was requested where at least 1 is required.
    Capacity,
    /// The slot buffer could not be allocated.
    Alloc,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Capacity => write!(f, "channel capacity must be at least 1"),
            ChannelError::Alloc => write!(f, "channel buffer allocation failed"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Error returned when [`Sender::send`] fails because the channel closed.
///
/// Contains the message that could not be sent, returning ownership to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Returns the message that could not be sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel closed")
    }
}

impl<T: fmt::Debug> std::error::Error for SendError<T> {}

/// Error returned when [`Receiver::recv`] finds the channel closed and
/// drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvError;

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel closed")
    }
}

impl std::error::Error for RecvError {}

/// Error returned by [`Sender::try_send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrySendError<T> {
    /// The buffer is full but the channel is still open.
    ///
    /// The message is returned so it can be retried or handled.
    Full(T),

    /// The channel is closed or every receiver has been dropped.
    ///
    /// The message is returned for cleanup.
    Disconnected(T),
}

impl<T> TrySendError<T> {
    /// Returns the message that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(v) | TrySendError::Disconnected(v) => v,
        }
    }

    /// Returns `true` if this error is the `Full` variant.
    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }

    /// Returns `true` if this error is the `Disconnected` variant.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, TrySendError::Disconnected(_))
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => write!(f, "channel full"),
            TrySendError::Disconnected(_) => write!(f, "channel closed"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TrySendError<T> {}

/// Error returned by [`Receiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// The buffer is empty but the channel is still open.
    Empty,

    /// The channel is closed and every buffered message has been consumed.
    Disconnected,
}

impl TryRecvError {
    /// Returns `true` if this error is the `Empty` variant.
    pub fn is_empty(&self) -> bool {
        matches!(self, TryRecvError::Empty)
    }

    /// Returns `true` if this error is the `Disconnected` variant.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, TryRecvError::Disconnected)
    }
}

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryRecvError::Empty => write!(f, "channel empty"),
            TryRecvError::Disconnected => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for TryRecvError {}
