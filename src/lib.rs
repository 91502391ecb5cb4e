//! # storagevisor
//!
//! **Storagevisor** launches the backend services of a storage platform (gateway, user,
//! group and basic-auth providers) and stops them gracefully.
//!
//! Every service command runs a small group of [`Actor`]s under one [`Supervisor`]
//! with all-or-nothing lifecycle semantics: the first actor to return ends the group,
//! every actor is then asked to stop within a deadline, and the error of the first
//! actor (if any) is the result of the command.
//!
//! ## Architecture
//! ```text
//!   Config ──► ServiceConfig::from_config ──► RuntimeConfig (typed tree)
//!                                                 │
//!     ┌───────────────────┬───────────────────────┼────────────────────┐
//!     ▼                   ▼                       ▼                    │
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐             │
//! │ BackendActor │  │  DebugActor  │  │   SignalActor    │             │
//! │ (runtime)    │  │ (/healthz)   │  │ (SIGINT/SIGTERM) │             │
//! └──────┬───────┘  └──────┬───────┘  └────────┬─────────┘             │
//!        └─────────────────┼───────────────────┘                       │
//!                          ▼                                           │
//! ┌───────────────────────────────────────────────────────────────┐    │
//! │  Supervisor::run                                              │    │
//! │  - ShutdownContext (shared cancellation)                      │    │
//! │  - Bus (broadcast events) ──► SubscriberSet ──► LogWriter      │    │
//! └───────────────────────────────────────────────────────────────┘    │
//! ```
//!
//! ### Group lifecycle
//! ```text
//! run(actors)
//!   ├─► publish ActorStarting, spawn every start(ctx)
//!   ├─► first start to return is the trigger
//!   ├─► ctx.begin(deadline), publish ShutdownRequested
//!   ├─► stop(deadline) on every actor, concurrently
//!   │     └─ StopTimedOut / ActorFailed are logged, never returned
//!   ├─► wait for the remaining starts, bounded by the deadline
//!   │     └─ GraceExceeded: the stragglers are aborted
//!   └─► trigger's error (or Ok)
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types / traits                     |
//! |-------------------|------------------------------------------------------------|----------------------------------------|
//! | **Actors**        | Independently scheduled units with graceful stop.          | [`Actor`], [`Lifecycle`]               |
//! | **Supervision**   | All-or-nothing group lifecycle with a stop deadline.       | [`Supervisor`], [`ShutdownContext`]    |
//! | **Subscriber API**| Hook into lifecycle events.                                | [`Subscribe`], [`LogWriter`]           |
//! | **Services**      | Resolve and run one service command.                       | [`ServiceConfig`], [`run_service`]     |
//! | **Errors**        | Typed errors for configuration, actors and the group.      | [`ConfigError`], [`ActorError`], [`RuntimeError`] |
//! | **Configuration** | TOML file plus command-line overrides.                     | [`Config`], [`SupervisorConfig`]       |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use storagevisor::{
//!     Actor, ActorError, ActorRef, ActorState, Lifecycle, ShutdownContext, SignalActor,
//!     Supervisor, SupervisorConfig,
//! };
//!
//! struct Worker { lifecycle: Lifecycle }
//!
//! #[async_trait]
//! impl Actor for Worker {
//!     fn name(&self) -> &str { "worker" }
//!     fn state(&self) -> ActorState { self.lifecycle.state() }
//!
//!     async fn start(&self, ctx: ShutdownContext) -> Result<(), ActorError> {
//!         let stopped = self.lifecycle.stop_signal(&ctx);
//!         self.lifecycle.run(async move { stopped.await; Ok(()) }).await
//!     }
//!
//!     async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
//!         self.lifecycle.stop(deadline).await
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(SupervisorConfig::default()).build();
//!
//!     let (signal, interrupt) = SignalActor::manual();
//!     let actors: Vec<ActorRef> = vec![
//!         Arc::new(Worker { lifecycle: Lifecycle::new() }),
//!         Arc::new(signal),
//!     ];
//!
//!     // An interrupt is a clean exit of the whole group.
//!     interrupt.interrupt();
//!     sup.run(actors).await?;
//!     Ok(())
//! }
//! ```

pub mod actors;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod logging;
pub mod runtime;
pub mod service;
pub mod subscribers;

// ---- Public re-exports ----

pub use actors::{BackendActor, DebugActor, SignalActor};
pub use config::Config;
pub use core::{
    Actor, ActorRef, ActorState, Lifecycle, ShutdownContext, Supervisor, SupervisorConfig,
};
pub use error::{ActorError, ConfigError, Error, RuntimeError};
pub use events::{Event, EventKind};
pub use runtime::{BackendRuntime, ProcessRuntime, RuntimeConfig};
pub use service::{ServiceConfig, ServiceKind, run_service};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
