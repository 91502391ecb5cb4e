//! # Shared shutdown context.
//!
//! [`ShutdownContext`] is the single cancellation primitive shared by all actors of a group.
//! The [`Supervisor`](crate::Supervisor) creates it, hands a clone to every actor's `start`,
//! and is the only party that ever cancels it.
//!
//! ## Rules
//! - Cancellation is **advisory**: actors are expected to observe it and return.
//! - The deadline is only set when shutdown begins; during normal operation it is `None`.
//! - Cloning is cheap (shared `Arc` state).

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Cancellable context shared by every actor of a supervised group.
#[derive(Clone, Debug, Default)]
pub struct ShutdownContext {
    token: CancellationToken,
    deadline: Arc<OnceLock<Instant>>,
}

impl ShutdownContext {
    /// Creates a live (not cancelled) context.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once shutdown has begun.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when shutdown begins.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Deadline of the stop phase, if shutdown has begun.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.get().copied()
    }

    /// Token view of the context, for APIs that take a [`CancellationToken`].
    ///
    /// The returned token is a child: cancelling it does not cancel the context.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Begins shutdown: records the stop deadline and cancels the context.
    ///
    /// Only the first call sets the deadline; the instant is returned either way.
    pub(crate) fn begin(&self, grace: Duration) -> Instant {
        let deadline = *self.deadline.get_or_init(|| Instant::now() + grace);
        self.token.cancel();
        deadline
    }
}
