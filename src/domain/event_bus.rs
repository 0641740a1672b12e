//! Broadcast channel for push lifecycle and failure events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Registrations,
//! removals and every failure reported by the executors are published as a
//! [`PushEvent`]; monitoring code subscribes to observe them, or to the
//! failures alone through [`EventBus::subscribe_failures`].

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::PushEvent;

/// Broadcast bus for [`PushEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest events are
/// dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PushEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: PushEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.sender.subscribe()
    }

    /// Creates a receiver that only yields failure events.
    #[must_use]
    pub fn subscribe_failures(&self) -> FailureSubscription {
        FailureSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver over an [`EventBus`] that skips lifecycle events.
///
/// A subscriber that falls behind loses the oldest events; the loss is
/// logged and receiving continues.
#[derive(Debug)]
pub struct FailureSubscription {
    receiver: broadcast::Receiver<PushEvent>,
}

impl FailureSubscription {
    /// Waits for the next failure. Returns `None` once every bus handle is
    /// dropped.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.is_failure() => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "failure subscriber lagged behind event bus");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already published failure without waiting.
    pub fn try_recv(&mut self) -> Option<PushEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.is_failure() => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "failure subscriber lagged behind event bus");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}
