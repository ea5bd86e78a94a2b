//! Best-effort one-to-many fan-out built on [`strand_channel`].
//!
//! A [`BroadcastSender`] owns one private bounded channel per subscriber
//! and publishes by `try_send`ing a clone of the message into each. A
//! subscriber whose buffer is full at publish time silently misses that
//! message; every subscriber therefore observes an in-order prefix-with-
//! gaps of the publish sequence, paced entirely by its own consumption.
//!
//! Publishing is O(subscribers) under one lock, with no allocation beyond
//! the per-subscriber clone.
//!
//! # Lifecycle
//!
//! [`subscribe`](BroadcastSender::subscribe) hands the caller the receiving
//! half of a fresh internal channel; the broadcast keeps the sending half.
//! Each internal channel is torn down by its own endpoint counts: dropping
//! the subscriber's receiver marks it dead (it is pruned at the next
//! publish), and closing the broadcast drops every internal sender, ending
//! each subscriber's stream once it drains. Dropping the last publisher
//! handle closes the broadcast.
//!
//! # Example
//!
//! ```
//! use strand_broadcast::broadcast;
//!
//! let publisher = broadcast::<u64>(4);
//!
//! let a = publisher.subscribe();
//! let b = publisher.subscribe();
//!
//! assert_eq!(publisher.send(1), 2);
//! assert_eq!(publisher.send(2), 2);
//! publisher.close();
//!
//! for rx in [a, b] {
//!     assert_eq!(rx.recv().unwrap(), 1);
//!     assert_eq!(rx.recv().unwrap(), 2);
//!     assert!(rx.recv().is_err());
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use strand_channel::{channel, Receiver, Sender, TrySendError};

pub use strand_channel::ChannelError;

struct State<T> {
    subscribers: Vec<Sender<T>>,
    closed: bool,
}

struct Shared<T> {
    /// Buffer capacity applied to each subscriber's private channel.
    capacity: usize,
    state: Mutex<State<T>>,
}

/// Creates a broadcast whose subscriber buffers hold `capacity` messages.
///
/// # Panics
///
/// Panics if `capacity` is 0. Use [`try_broadcast`] to get a structured
/// error instead.
pub fn broadcast<T>(capacity: usize) -> BroadcastSender<T> {
    assert!(capacity > 0, "broadcast capacity must be at least 1");
    BroadcastSender {
        shared: Arc::new(Shared {
            capacity,
            state: Mutex::new(State {
                subscribers: Vec::new(),
                closed: false,
            }),
        }),
    }
}

/// Fallible variant of [`broadcast`].
///
/// # Errors
///
/// Returns [`ChannelError::Capacity`] when `capacity` is 0.
pub fn try_broadcast<T>(capacity: usize) -> Result<BroadcastSender<T>, ChannelError> {
    if capacity == 0 {
        return Err(ChannelError::Capacity);
    }
    Ok(broadcast(capacity))
}

/// The publishing handle of a broadcast.
///
/// Cloning registers another publisher; the broadcast closes when the last
/// handle drops.
pub struct BroadcastSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> BroadcastSender<T> {
    /// Registers a new subscriber and returns its receiving end.
    ///
    /// On a closed broadcast the returned receiver reports end-of-stream
    /// immediately.
    pub fn subscribe(&self) -> Receiver<T> {
        let mut state = self.shared.state.lock();
        let (tx, rx) = channel(self.shared.capacity);
        if state.closed {
            // Dropping the sender pre-closes the stream.
            drop(tx);
        } else {
            state.subscribers.push(tx);
        }
        rx
    }

    /// Publishes `value` to every current subscriber, best effort.
    ///
    /// Each subscriber gets its own clone via a non-blocking send; a
    /// subscriber whose buffer is full misses this message. Subscribers
    /// whose receiving end has been dropped are removed from the list.
    ///
    /// Returns the number of subscribers the message was delivered to;
    /// 0 on a closed broadcast.
    pub fn send(&self, value: T) -> usize
    where
        T: Clone,
    {
        let mut state = self.shared.state.lock();
        if state.closed {
            return 0;
        }

        let mut delivered = 0;
        state.subscribers.retain(|tx| match tx.try_send(value.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }

    /// Returns the number of live subscribers.
    ///
    /// A snapshot: subscribers that dropped their receiver are only counted
    /// out once a publish prunes them.
    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().subscribers.len()
    }

    /// Returns `true` if the broadcast has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Returns the buffer capacity applied to each subscriber.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Closes the broadcast. Idempotent.
    ///
    /// Every internal sender is dropped, so each subscriber's stream ends
    /// once its buffered messages are drained. Subsequent
    /// [`send`](BroadcastSender::send)s deliver to nobody and
    /// [`subscribe`](BroadcastSender::subscribe) hands out pre-closed
    /// streams.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.subscribers.clear();
    }
}

impl<T> Clone for BroadcastSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for BroadcastSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastSender")
            .field("capacity", &self.capacity())
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fan_out_to_two_subscribers() {
        let publisher = broadcast::<u64>(4);

        let a = publisher.subscribe();
        let b = publisher.subscribe();

        assert_eq!(publisher.send(1), 2);
        assert_eq!(publisher.send(2), 2);
        publisher.close();

        for rx in [a, b] {
            assert_eq!(rx.recv().unwrap(), 1);
            assert_eq!(rx.recv().unwrap(), 2);
            assert!(rx.recv().is_err());
        }
    }

    #[test]
    fn send_with_no_subscribers_delivers_to_nobody() {
        let publisher = broadcast::<u64>(4);
        assert_eq!(publisher.send(1), 0);
    }

    #[test]
    fn full_subscriber_misses_the_message() {
        let publisher = broadcast::<u64>(1);

        let slow = publisher.subscribe();
        let fast = publisher.subscribe();

        assert_eq!(publisher.send(1), 2);

        // `fast` drains, `slow` does not.
        assert_eq!(fast.recv().unwrap(), 1);

        assert_eq!(publisher.send(2), 1);

        assert_eq!(fast.recv().unwrap(), 2);
        assert_eq!(slow.recv().unwrap(), 1);
        assert!(slow.try_recv().is_err());
    }

    #[test]
    fn subscriber_observes_in_order_prefix_with_gaps() {
        let publisher = broadcast::<u64>(2);
        let rx = publisher.subscribe();

        for i in 0..10 {
            publisher.send(i);
        }
        publisher.close();

        // Whatever arrived is strictly increasing.
        let seen: Vec<u64> = rx.collect();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_next_send() {
        let publisher = broadcast::<u64>(4);

        let keep = publisher.subscribe();
        let gone = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        drop(gone);
        assert_eq!(publisher.send(1), 1);
        assert_eq!(publisher.subscriber_count(), 1);

        assert_eq!(keep.recv().unwrap(), 1);
    }

    #[test]
    fn subscribe_after_close_yields_ended_stream() {
        let publisher = broadcast::<u64>(4);
        publisher.close();

        let rx = publisher.subscribe();
        assert!(rx.recv().is_err());
        assert_eq!(publisher.send(9), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let publisher = broadcast::<u64>(4);
        let rx = publisher.subscribe();

        publisher.close();
        publisher.close();

        assert!(publisher.is_closed());
        assert!(rx.recv().is_err());
    }

    #[test]
    fn last_publisher_drop_closes() {
        let publisher = broadcast::<u64>(4);
        let second = publisher.clone();
        let rx = publisher.subscribe();

        drop(publisher);
        assert_eq!(second.send(1), 1);

        drop(second);

        assert_eq!(rx.recv().unwrap(), 1);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn try_broadcast_rejects_zero_capacity() {
        assert_eq!(
            try_broadcast::<u64>(0).unwrap_err(),
            ChannelError::Capacity
        );
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_panics() {
        let _ = broadcast::<u64>(0);
    }

    #[test]
    fn subscribers_pace_independently_across_threads() {
        let publisher = broadcast::<u64>(64);

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let rx = publisher.subscribe();
                thread::spawn(move || {
                    let mut last = None;
                    let mut count = 0u64;
                    while let Ok(v) = rx.recv() {
                        if let Some(prev) = last {
                            assert!(v > prev, "stream out of order");
                        }
                        last = Some(v);
                        count += 1;
                    }
                    count
                })
            })
            .collect();

        let mut published = 0u64;
        for i in 0..1000 {
            if publisher.send(i) == 3 {
                published += 1;
            }
        }
        publisher.close();

        for consumer in consumers {
            // Every subscriber saw at least the messages nobody missed.
            assert!(consumer.join().unwrap() >= published);
        }
    }
}
