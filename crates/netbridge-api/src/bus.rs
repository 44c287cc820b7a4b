//! In-process multicast of decoded events.
//!
//! Backed by [`tokio::sync::broadcast`]: a live feed, not a replay log.
//! Subscribers only see events published after they subscribe, and a
//! subscriber that falls more than `capacity` events behind loses the
//! oldest ones and resumes with the newest (drop-oldest).
//!
//! The broadcast ring only comes in powers of two, so each subscription
//! trims itself down to exactly `capacity` undelivered events.

use std::sync::Arc;

use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::event::Event;

/// Buffer slots per subscriber when nothing else is configured.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

/// Largest accepted buffer. The ring is allocated up front.
pub const MAX_BUFFER_CAPACITY: usize = 65_536;

// ── EventBus ─────────────────────────────────────────────────────────

/// Publishing side of the event feed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<Event>>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events per
    /// subscriber.
    ///
    /// `capacity` is clamped to `1..=MAX_BUFFER_CAPACITY`;
    /// [`capacity`](Self::capacity) reports the effective value.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_BUFFER_CAPACITY);
        let (tx, _) = broadcast::channel(capacity.next_power_of_two());
        Self { tx, capacity }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of subscribers that will see it. Zero just means
    /// nobody is listening right now.
    pub fn publish(&self, event: Event) -> usize {
        self.tx.send(Arc::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
            capacity: self.capacity,
            dropped: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

// ── EventSubscription ────────────────────────────────────────────────

/// Receiving side of the event feed.
///
/// Lag is absorbed rather than surfaced: events that were overwritten
/// before this subscriber read them are counted in
/// [`dropped`](Self::dropped) and the subscriber carries on with the
/// oldest of the newest `capacity` events.
#[derive(Debug)]
pub struct EventSubscription {
    rx: broadcast::Receiver<Arc<Event>>,
    capacity: usize,
    dropped: u64,
}

impl EventSubscription {
    /// Wait for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.within_capacity() {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if self.within_capacity() {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events this subscriber lost to drop-oldest buffering so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> impl Stream<Item = Arc<Event>> + Send + Unpin {
        stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
        .boxed()
    }

    /// Whether the event just received is among the newest `capacity`.
    /// Older ones are counted as dropped.
    fn within_capacity(&mut self) -> bool {
        if self.rx.len() < self.capacity {
            return true;
        }
        self.dropped += 1;
        false
    }

    fn record_lag(&mut self, skipped: u64) {
        self.dropped += skipped;
        tracing::debug!(skipped, "event subscriber lagged, oldest events dropped");
    }
}

// ── Tests ────────────────────────────────────────────────────────────
