//! The three actors every service command runs under one [`Supervisor`](crate::Supervisor):
//!
//! - [`BackendActor`]: the external backend runtime;
//! - [`DebugActor`]: the HTTP health/readiness endpoint;
//! - [`SignalActor`]: the OS signal listener.

pub mod backend;
pub mod debug;
pub mod signal;

pub use backend::{BackendActor, pid_file_path};
pub use debug::{DebugActor, VersionInfo};
pub use signal::{InterruptHandle, SignalActor, wait_for_shutdown_signal};
