//! Boundary to the external backend runtime.
//!
//! - [`tree`]: the typed configuration handed to the runtime;
//! - [`BackendRuntime`]: how a runtime is run for the lifetime of a service;
//! - [`process`]: the default implementation, launching the runtime binary.

pub mod process;
pub mod tree;

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ActorError;

pub use process::ProcessRuntime;
pub use tree::{
    CoreSection, GatewaySection, GrpcSection, ProviderSection, RuntimeConfig, ServiceSection,
    SharedSection,
};

/// Runs the backend runtime until it exits or `ctx` is cancelled.
///
/// Cancellation is cooperative: the implementation asks the runtime to terminate and
/// waits for it. Returning `Ok(())` after cancellation is the normal outcome.
#[async_trait]
pub trait BackendRuntime: Send + Sync + 'static {
    async fn run(
        &self,
        tree: &RuntimeConfig,
        pid_file: &Path,
        ctx: CancellationToken,
    ) -> Result<(), ActorError>;
}
