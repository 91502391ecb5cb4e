//! # Actor: an independently scheduled unit with explicit start and graceful stop.
//!
//! Every long-lived component of a service (backend runtime, debug endpoint, signal
//! listener) implements [`Actor`]. The [`Supervisor`](crate::Supervisor) runs a group of
//! actors with all-or-nothing lifecycle semantics.
//!
//! ## State machine
//! ```text
//!            start()                  stop()
//!   Idle ─────────────► Running ─────────────► Stopping
//!     │                    │                      │
//!     │ stop()             │ start() returns      │ start() returns
//!     ▼                    ▼                      ▼
//!  Stopped ◄──────────── Stopped ◄─────────────── Stopped
//! ```
//!
//! ## Rules
//! - `stop` is idempotent: the first call requests termination, later calls are no-ops.
//! - `stop` before `start` is allowed: the actor goes straight to `Stopped` and a later
//!   `start` returns `Ok(())` without doing any work.
//! - `Stopped` is terminal.
//!
//! [`Lifecycle`] implements these rules once so actors only supply their work future.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::core::shutdown::ShutdownContext;
use crate::error::ActorError;

/// Shared handle to an actor.
pub type ActorRef = Arc<dyn Actor>;

/// Lifecycle state of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorState {
    /// Constructed, `start` not called yet.
    Idle,
    /// `start` is executing.
    Running,
    /// `stop` was requested while running; waiting for `start` to return.
    Stopping,
    /// Terminal.
    Stopped,
}

impl ActorState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ActorState::Idle,
            1 => ActorState::Running,
            2 => ActorState::Stopping,
            _ => ActorState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ActorState::Idle => 0,
            ActorState::Running => 1,
            ActorState::Stopping => 2,
            ActorState::Stopped => 3,
        }
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActorState::Idle => "idle",
            ActorState::Running => "running",
            ActorState::Stopping => "stopping",
            ActorState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// # Supervised actor.
///
/// `start` blocks until the actor stops on its own, is cancelled, or fails.
/// `stop` requests graceful termination and must not block past `deadline`.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use storagevisor::{Actor, ActorError, ActorState, Lifecycle, ShutdownContext};
///
/// struct Idle { lifecycle: Lifecycle }
///
/// #[async_trait]
/// impl Actor for Idle {
///     fn name(&self) -> &str { "idle" }
///     fn state(&self) -> ActorState { self.lifecycle.state() }
///
///     async fn start(&self, ctx: ShutdownContext) -> Result<(), ActorError> {
///         let stopped = self.lifecycle.stop_signal(&ctx);
///         self.lifecycle.run(async move { stopped.await; Ok(()) }).await
///     }
///
///     async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
///         self.lifecycle.stop(deadline).await
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// Stable, human-readable actor name used in logs and errors.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> ActorState;

    /// Runs the actor until it finishes, fails, or observes cancellation.
    async fn start(&self, ctx: ShutdownContext) -> Result<(), ActorError>;

    /// Requests graceful termination and waits for it at most `deadline`.
    async fn stop(&self, deadline: Duration) -> Result<(), ActorError>;
}

/// Reusable implementation of the actor state machine.
///
/// Holds the state, a stop token (cancelled by [`Lifecycle::stop`]) and an exit token
/// (cancelled when the work future finishes or is dropped).
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    stop: CancellationToken,
    exited: CancellationToken,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Creates a lifecycle in [`ActorState::Idle`].
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ActorState::Idle.as_u8()),
            stop: CancellationToken::new(),
            exited: CancellationToken::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ActorState {
        ActorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once `stop` has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Future that completes when either `stop` is requested or `ctx` is cancelled.
    ///
    /// The future owns its handles, so it can be moved into spawned servers.
    pub fn stop_signal(&self, ctx: &ShutdownContext) -> BoxFuture<'static, ()> {
        Box::pin(stop_or_shutdown(self.stop.clone(), ctx.clone()))
    }

    /// Runs `work` as the body of `start`.
    ///
    /// Returns `Ok(())` without polling `work` if the actor is not idle
    /// (already started, or stopped before it ever ran).
    pub async fn run<F>(&self, work: F) -> Result<(), ActorError>
    where
        F: Future<Output = Result<(), ActorError>>,
    {
        if self
            .state
            .compare_exchange(
                ActorState::Idle.as_u8(),
                ActorState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }

        let _guard = ExitGuard(self);
        work.await
    }

    /// Requests termination and waits for `start` to return, bounded by `deadline`.
    ///
    /// Idle actors go straight to `Stopped`. Repeated calls are no-ops.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
        if !self.request_stop() {
            return Ok(());
        }
        self.wait_exited(deadline).await
    }

    /// Waits for `start` to return, bounded by `deadline`.
    ///
    /// Pairs with [`Lifecycle::request_stop`] for actors that act on the transition itself.
    pub async fn wait_exited(&self, deadline: Duration) -> Result<(), ActorError> {
        match tokio::time::timeout(deadline, self.exited.cancelled()).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(ActorError::StopTimeout { deadline }),
        }
    }

    /// Applies the `stop` transition; returns `true` only when the caller must wait
    /// for a running `start` to finish.
    pub fn request_stop(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let next = match ActorState::from_u8(current) {
                ActorState::Idle => ActorState::Stopped,
                ActorState::Running => ActorState::Stopping,
                ActorState::Stopping | ActorState::Stopped => return false,
            };
            match self.state.compare_exchange(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.stop.cancel();
                    if next == ActorState::Stopped {
                        self.exited.cancel();
                        return false;
                    }
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn finish(&self) {
        self.state
            .store(ActorState::Stopped.as_u8(), Ordering::Release);
        self.exited.cancel();
    }
}

/// Marks the lifecycle stopped when the work future completes or is dropped (abort).
struct ExitGuard<'a>(&'a Lifecycle);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

async fn stop_or_shutdown(stop: CancellationToken, ctx: ShutdownContext) {
    tokio::select! {
        _ = stop.cancelled() => {}
        _ = ctx.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_before_start_skips_work() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), ActorState::Idle);

        lc.stop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(lc.state(), ActorState::Stopped);

        let res = lc
            .run(async { Err(ActorError::Fail("must not run".into())) })
            .await;
        assert!(res.is_ok());
        assert_eq!(lc.state(), ActorState::Stopped);
    }

    #[tokio::test]
    async fn run_then_stop_transitions_through_stopping() {
        let lc = Arc::new(Lifecycle::new());
        let ctx = ShutdownContext::new();

        let runner = {
            let lc = lc.clone();
            let stopped = lc.stop_signal(&ctx);
            tokio::spawn(async move { lc.run(async move { stopped.await; Ok(()) }).await })
        };

        while lc.state() != ActorState::Running {
            tokio::task::yield_now().await;
        }

        assert!(lc.request_stop());
        assert_eq!(lc.state(), ActorState::Stopping);
        // Second request is a no-op.
        assert!(!lc.request_stop());

        runner.await.unwrap().unwrap();
        assert_eq!(lc.state(), ActorState::Stopped);
        lc.stop(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn stop_reports_timeout_when_work_ignores_it() {
        let lc = Arc::new(Lifecycle::new());
        let runner = {
            let lc = lc.clone();
            tokio::spawn(async move {
                lc.run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })
                .await
            })
        };
        while lc.state() != ActorState::Running {
            tokio::task::yield_now().await;
        }

        let err = lc.stop(Duration::from_millis(20)).await.unwrap_err();
        assert!(err.is_stop_timeout());

        runner.abort();
        let _ = runner.await;
        // The guard still marks the actor stopped when the work is aborted.
        assert_eq!(lc.state(), ActorState::Stopped);
    }

    #[tokio::test]
    async fn stop_signal_fires_on_shutdown_context() {
        let lc = Lifecycle::new();
        let ctx = ShutdownContext::new();
        let signal = lc.stop_signal(&ctx);
        ctx.begin(Duration::from_secs(1));
        tokio::time::timeout(Duration::from_secs(1), signal)
            .await
            .expect("signal should complete after shutdown begins");
        assert!(!lc.is_stop_requested());
    }
}
