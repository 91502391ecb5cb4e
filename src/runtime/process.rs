//! Runs the backend runtime as a child process.
//!
//! The tree is written as TOML next to the PID file (`revad-groups-<uuid>.toml`), then the
//! binary is spawned with the argument template, where `{config}` and `{pidfile}` are
//! replaced by the two paths. On cancellation the child receives SIGTERM (Unix) or is
//! killed (elsewhere) and is waited for; `kill_on_drop` covers an aborted actor.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RuntimeSettings;
use crate::error::ActorError;
use crate::runtime::{BackendRuntime, RuntimeConfig};

/// [`BackendRuntime`] that launches an external binary.
#[derive(Debug, Clone)]
pub struct ProcessRuntime {
    binary: PathBuf,
    args: Vec<String>,
}

impl ProcessRuntime {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.binary.clone(), settings.args.clone())
    }

    /// Substitutes `{config}` and `{pidfile}` in the argument template.
    pub fn render_args(&self, config: &Path, pid_file: &Path) -> Vec<String> {
        let config = config.display().to_string();
        let pid_file = pid_file.display().to_string();
        self.args
            .iter()
            .map(|a| a.replace("{config}", &config).replace("{pidfile}", &pid_file))
            .collect()
    }
}

#[async_trait]
impl BackendRuntime for ProcessRuntime {
    async fn run(
        &self,
        tree: &RuntimeConfig,
        pid_file: &Path,
        ctx: CancellationToken,
    ) -> Result<(), ActorError> {
        let config_path = pid_file.with_extension("toml");
        tokio::fs::write(&config_path, tree.to_toml()?)
            .await
            .map_err(|source| ActorError::WriteConfig {
                path: config_path.clone(),
                source,
            })?;

        let res = self.supervise(&config_path, pid_file, ctx).await;
        if let Err(e) = tokio::fs::remove_file(&config_path).await {
            debug!(path = %config_path.display(), error = %e, "runtime config not removed");
        }
        res
    }
}

impl ProcessRuntime {
    async fn supervise(
        &self,
        config_path: &Path,
        pid_file: &Path,
        ctx: CancellationToken,
    ) -> Result<(), ActorError> {
        let mut child = Command::new(&self.binary)
            .args(self.render_args(config_path, pid_file))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ActorError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;
        info!(binary = %self.binary.display(), pid = child.id(), "backend runtime started");

        let exited = tokio::select! {
            res = child.wait() => Some(res),
            _ = ctx.cancelled() => None,
        };

        match exited {
            Some(Ok(status)) if status.success() => {
                info!(%status, "backend runtime exited");
                Ok(())
            }
            Some(Ok(status)) => Err(ActorError::RuntimeExited { status }),
            Some(Err(e)) => Err(ActorError::Fail(format!("waiting for backend runtime: {e}"))),
            None => {
                terminate(&mut child);
                let status = child
                    .wait()
                    .await
                    .map_err(|e| ActorError::Fail(format!("waiting for backend runtime: {e}")))?;
                debug!(%status, "backend runtime terminated");
                Ok(())
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    debug!(pid, "sending SIGTERM to backend runtime");
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!(pid, error = %e, "SIGTERM failed, killing backend runtime");
        force_kill(child);
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    force_kill(child);
}

/// Returns whether the kill was delivered.
fn force_kill(child: &mut Child) -> bool {
    match child.start_kill() {
        Ok(()) => true,
        Err(e) => {
            warn!(pid = child.id(), error = %e, "failed to kill backend runtime");
            false
        }
    }
}
