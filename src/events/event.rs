//! # Lifecycle events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies events across three categories:
//! - **Actor events**: an actor started, exited, failed, or overran its stop deadline
//! - **Shutdown events**: shutdown requested, all stopped within the deadline, deadline exceeded
//! - **Subscriber events**: a subscriber dropped an event or panicked
//!
//! The [`Event`] struct carries the metadata (actor name, reason, deadline).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use storagevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StopTimedOut)
//!     .with_actor("revad")
//!     .with_deadline(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::StopTimedOut);
//! assert_eq!(ev.actor.as_deref(), Some("revad"));
//! assert_eq!(ev.deadline_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `actor` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `actor` (subscriber name), `reason` (`full` or `closed`).
    SubscriberOverflow,

    // === Actor events ===
    /// Actor `start` was spawned.
    ///
    /// Sets: `actor`.
    ActorStarting,

    /// Actor `start` returned `Ok(())`.
    ///
    /// Sets: `actor`.
    ActorExited,

    /// Actor `start` returned an error or panicked.
    ///
    /// Sets: `actor`, `reason`.
    ActorFailed,

    /// Actor `stop` did not complete within its deadline.
    ///
    /// Sets: `actor`, `deadline_ms`, `reason`.
    StopTimedOut,

    // === Shutdown events ===
    /// The first actor returned; the group is shutting down.
    ///
    /// Sets: `actor` (the trigger), `deadline_ms`.
    ShutdownRequested,

    /// Every actor's `start` returned within the stop deadline.
    AllStoppedWithin,

    /// The stop deadline passed; remaining actors were aborted.
    ///
    /// Sets: `deadline_ms`, `reason` (stuck actor names).
    GraceExceeded,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Actor (or subscriber) the event refers to.
    pub actor: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, stuck actors).
    pub reason: Option<Arc<str>>,
    /// Stop deadline in milliseconds (compact).
    pub deadline_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            actor: None,
            reason: None,
            deadline_ms: None,
        }
    }

    /// Attaches an actor name.
    #[inline]
    pub fn with_actor(mut self, actor: impl Into<Arc<str>>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_deadline(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.deadline_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_actor(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_actor(subscriber)
            .with_reason(info)
    }
}
