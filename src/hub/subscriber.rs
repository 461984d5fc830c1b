use futures::stream::{self, Stream};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::models::{EndReason, SessionEvent};

/// Bounded per-rider buffer between the hub's fan-out and one subscriber.
///
/// Pushing never blocks: when the buffer is full the oldest event is dropped.
/// Once closed, no further events are accepted and the reader drains what is
/// left before observing the end of the stream.
pub(crate) struct SubscriberQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

struct QueueInner {
    events: VecDeque<SessionEvent>,
    closed: bool,
    dropped: u64,
}

impl SubscriberQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                events: VecDeque::with_capacity(capacity),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends an event, evicting the oldest one on overflow.
    /// Returns false if the queue is already closed.
    pub(crate) fn push(&self, event: SessionEvent) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return false;
            }
            Self::push_bounded(&mut inner, event, self.capacity);
        }
        self.notify.notify_one();
        true
    }

    /// Delivers a final `Ended` event and closes the queue.
    pub(crate) fn close(&self, reason: EndReason) {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            Self::push_bounded(&mut inner, SessionEvent::Ended(reason), self.capacity);
            inner.closed = true;
        }
        self.notify.notify_one();
    }

    /// Closes the queue without an end event; used when the reader went away.
    pub(crate) fn detach(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.events.clear();
    }

    #[allow(dead_code)]
    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    pub(crate) fn try_pop(&self) -> Option<SessionEvent> {
        self.inner.lock().events.pop_front()
    }

    /// Waits for the next event. Returns `None` once closed and drained.
    pub(crate) async fn pop(&self) -> Option<SessionEvent> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(event) = inner.events.pop_front() {
                    return Some(event);
                }
                if inner.closed {
                    return None;
                }
            }
            // notify_one stores a permit, so a push between the check and here is not lost
            self.notify.notified().await;
        }
    }

    fn push_bounded(inner: &mut QueueInner, event: SessionEvent, capacity: usize) {
        while inner.events.len() >= capacity {
            inner.events.pop_front();
            inner.dropped += 1;
        }
        inner.events.push_back(event);
    }
}

/// A rider's view of one ride session.
///
/// Events arrive in the order the hub accepted them. The stream ends after an
/// [`SessionEvent::Ended`] event. Dropping the subscription detaches it from
/// the session.
pub struct Subscription {
    ride_id: String,
    rider_id: String,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub(crate) fn new(ride_id: String, rider_id: String, queue: Arc<SubscriberQueue>) -> Self {
        Self { ride_id, rider_id, queue }
    }

    pub fn ride_id(&self) -> &str {
        &self.ride_id
    }

    pub fn rider_id(&self) -> &str {
        &self.rider_id
    }

    /// Waits for the next event; `None` after the stream has ended.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.queue.pop().await
    }

    /// Returns a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.queue.try_pop()
    }

    /// Number of events lost to the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn into_stream(self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("ride_id", &self.ride_id)
            .field("rider_id", &self.rider_id)
            .finish()
    }
}
