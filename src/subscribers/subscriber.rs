//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging observers of the supervisor's
//! lifecycle events (logging, metrics, audit) into a [`Supervisor`](crate::Supervisor).
//!
//! Each subscriber gets a dedicated worker task fed by its own bounded queue:
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//!                                    └─► panic caught → EventKind::SubscriberPanicked
//! ```
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the event for this subscriber only and publishes
//!   `EventKind::SubscriberOverflow`.
//! - Events are processed sequentially (FIFO) per subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use storagevisor::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ActorFailed) {
//!             // bump a counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of lifecycle events.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; panics are caught but reported as events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, from the subscriber's own worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which is verbose; override it.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to a minimum of 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
