//! # LogWriter: renders lifecycle events through `tracing`.
//!
//! ## Example output (compact formatter)
//! ```text
//! DEBUG storagevisor::subscribers::log: actor starting actor="revad"
//! ERROR storagevisor::subscribers::log: actor failed actor="debug" error="bind failed on 127.0.0.1:9161: ..."
//! INFO  storagevisor::subscribers::log: shutdown requested trigger="signal" deadline_ms=5000
//! WARN  storagevisor::subscribers::log: stop deadline exceeded, aborting actors stuck="revad"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every lifecycle event with structured fields.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let actor = e.actor.as_deref().unwrap_or("unknown");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ActorStarting => debug!(actor, "actor starting"),
            EventKind::ActorExited => debug!(actor, "actor exited"),
            EventKind::ActorFailed => error!(actor, error = reason, "actor failed"),
            EventKind::StopTimedOut => {
                warn!(actor, deadline_ms = e.deadline_ms, error = reason, "actor stop timed out")
            }
            EventKind::ShutdownRequested => {
                info!(trigger = actor, deadline_ms = e.deadline_ms, "shutdown requested")
            }
            EventKind::AllStoppedWithin => debug!("all actors stopped within deadline"),
            EventKind::GraceExceeded => warn!(
                deadline_ms = e.deadline_ms,
                stuck = reason,
                "stop deadline exceeded, aborting actors"
            ),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = actor, reason, "subscriber dropped event")
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = actor, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
