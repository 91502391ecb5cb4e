//! # Broadcast bus for lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]; the supervisor publishes, and a single
//! listener task forwards everything to the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//! Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet ──► LogWriter, ...
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receivers the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers; a receiver that
//!   falls behind observes `RecvError::Lagged(n)` and skips the `n` oldest events.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publish handle over a broadcast channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding at most `capacity` undelivered events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to every current receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
