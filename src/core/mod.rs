//! Runtime core: actor contract, shared shutdown context and the supervisor.
//!
//! Internal modules:
//! - [`actor`]: the `Actor` trait, its state machine and the `Lifecycle` helper;
//! - [`shutdown`]: the cancellable context shared by an actor group;
//! - [`supervisor`]: runs a group with all-or-nothing lifecycle semantics;
//! - [`builder`]: constructs a supervisor with its subscribers;
//! - [`config`]: supervisor settings.

pub mod actor;
pub mod builder;
pub mod config;
pub mod shutdown;
pub mod supervisor;

pub use actor::{Actor, ActorRef, ActorState, Lifecycle};
pub use builder::SupervisorBuilder;
pub use config::{DEFAULT_STOP_DEADLINE, SupervisorConfig};
pub use shutdown::ShutdownContext;
pub use supervisor::Supervisor;
