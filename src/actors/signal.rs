//! # Signal listener actor.
//!
//! [`SignalActor`] completes its `start` with `Ok(())` on the first termination signal,
//! which makes an interrupt a clean trigger for the supervisor.
//!
//! ## Unix
//! Handles **SIGINT**, **SIGTERM** and **SIGQUIT**, with [`tokio::signal::ctrl_c`] as a fallback.
//!
//! ## Other platforms
//! Only [`tokio::signal::ctrl_c`] is awaited.
//!
//! [`SignalActor::manual`] replaces the OS source with an [`InterruptHandle`], so tests and
//! embedders can inject an interrupt.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::{Actor, ActorState, Lifecycle, ShutdownContext};
use crate::error::ActorError;

enum Source {
    Os,
    Manual(CancellationToken),
}

/// Actor that returns when the process is asked to terminate.
pub struct SignalActor {
    source: Source,
    lifecycle: Lifecycle,
}

/// Injects an interrupt into a [`SignalActor`] created with [`SignalActor::manual`].
#[derive(Clone, Debug)]
pub struct InterruptHandle(CancellationToken);

impl InterruptHandle {
    /// Delivers the interrupt. Idempotent.
    pub fn interrupt(&self) {
        self.0.cancel();
    }
}

impl SignalActor {
    /// Listens for OS termination signals.
    pub fn new() -> Self {
        Self {
            source: Source::Os,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Listens only for interrupts injected through the returned handle.
    pub fn manual() -> (Self, InterruptHandle) {
        let token = CancellationToken::new();
        let actor = Self {
            source: Source::Manual(token.clone()),
            lifecycle: Lifecycle::new(),
        };
        (actor, InterruptHandle(token))
    }
}

impl Default for SignalActor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Actor for SignalActor {
    fn name(&self) -> &str {
        "signal"
    }

    fn state(&self) -> ActorState {
        self.lifecycle.state()
    }

    async fn start(&self, ctx: ShutdownContext) -> Result<(), ActorError> {
        let stopped = self.lifecycle.stop_signal(&ctx);
        self.lifecycle
            .run(async move {
                tokio::select! {
                    res = self.wait() => {
                        res?;
                        info!("interrupt received");
                        Ok(())
                    }
                    _ = stopped => Ok(()),
                }
            })
            .await
    }

    async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
        self.lifecycle.stop(deadline).await
    }
}

impl SignalActor {
    async fn wait(&self) -> Result<(), ActorError> {
        match &self.source {
            Source::Os => wait_for_shutdown_signal().await.map_err(ActorError::Signal),
            Source::Manual(token) => {
                token.cancelled().await;
                Ok(())
            }
        }
    }
}

/// Completes when the process receives a termination signal.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes when the process receives Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
