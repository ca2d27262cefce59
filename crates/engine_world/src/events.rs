//! Outward notifications as a polled channel.
//!
//! An [`EventBus`] fans every emitted event out to each subscriber's
//! unbounded channel. Emission never blocks, so it is safe to call from
//! inside a tick; consumers drain their receiver with `try_recv` whenever
//! they like. Subscribers whose receiver was dropped are pruned on the next
//! emit.

use tokio::sync::mpsc;

/// The consumer end of an [`EventBus`] subscription.
pub type EventReceiver<E> = mpsc::UnboundedReceiver<E>;

#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Vec<mpsc::UnboundedSender<E>>,
}

impl<E: Clone> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a new subscriber. Only events emitted after this call are
    /// delivered.
    pub fn subscribe(&mut self) -> EventReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&mut self, event: E) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
