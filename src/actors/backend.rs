//! # Backend runtime actor.
//!
//! Runs the external runtime for the lifetime of a service. The runtime gets a
//! cancellation token that fires when the actor is stopped or the group shuts down;
//! termination is cooperative, never a hard kill.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{Actor, ActorState, Lifecycle, ShutdownContext};
use crate::error::ActorError;
use crate::runtime::{BackendRuntime, RuntimeConfig};

/// Per-process PID file path: `<tmp>/revad-<service>-<uuid v4>.pid`.
pub fn pid_file_path(service: &str) -> PathBuf {
    env::temp_dir().join(format!("revad-{service}-{}.pid", Uuid::new_v4()))
}

/// Actor hosting the backend runtime of one service.
pub struct BackendActor {
    service: String,
    tree: RuntimeConfig,
    pid_file: PathBuf,
    runtime: Arc<dyn BackendRuntime>,
    lifecycle: Lifecycle,
}

impl BackendActor {
    pub fn new(service: &str, tree: RuntimeConfig, runtime: Arc<dyn BackendRuntime>) -> Self {
        Self::with_pid_file(service, tree, runtime, pid_file_path(service))
    }

    pub fn with_pid_file(
        service: &str,
        tree: RuntimeConfig,
        runtime: Arc<dyn BackendRuntime>,
        pid_file: PathBuf,
    ) -> Self {
        Self {
            service: service.to_string(),
            tree,
            pid_file,
            runtime,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    pub fn tree(&self) -> &RuntimeConfig {
        &self.tree
    }
}

#[async_trait]
impl Actor for BackendActor {
    fn name(&self) -> &str {
        &self.service
    }

    fn state(&self) -> ActorState {
        self.lifecycle.state()
    }

    async fn start(&self, ctx: ShutdownContext) -> Result<(), ActorError> {
        let stopped = self.lifecycle.stop_signal(&ctx);

        self.lifecycle
            .run(async move {
                let token = CancellationToken::new();

                let run = self.runtime.run(&self.tree, &self.pid_file, token.clone());
                tokio::pin!(run);

                let res = tokio::select! {
                    res = &mut run => res,
                    _ = stopped => {
                        token.cancel();
                        run.await
                    }
                };

                if let Err(e) = tokio::fs::remove_file(&self.pid_file).await {
                    debug!(path = %self.pid_file.display(), error = %e, "pid file not removed");
                }
                res
            })
            .await
    }

    async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
        if !self.lifecycle.request_stop() {
            return Ok(());
        }
        info!(server = %self.service, "Shutting down server");
        self.lifecycle.wait_exited(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::runtime::{CoreSection, GrpcSection, SharedSection};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Runtime that records its pid file, writes it, and waits for cancellation.
    #[derive(Default)]
    struct FakeRuntime {
        seen: Mutex<Option<(PathBuf, String)>>,
    }

    #[async_trait]
    impl BackendRuntime for FakeRuntime {
        async fn run(
            &self,
            tree: &RuntimeConfig,
            pid_file: &Path,
            ctx: CancellationToken,
        ) -> Result<(), ActorError> {
            *self.seen.lock().unwrap() = Some((pid_file.to_path_buf(), tree.grpc.address.clone()));
            tokio::fs::write(pid_file, "4242").await.unwrap();
            ctx.cancelled().await;
            Ok(())
        }
    }

    fn tree() -> RuntimeConfig {
        RuntimeConfig {
            core: CoreSection {
                max_cpus: String::new(),
                tracing_enabled: false,
                tracing_endpoint: String::new(),
                tracing_collector: String::new(),
                tracing_service_name: "groups".into(),
            },
            shared: SharedSection {
                jwt_secret: "s".into(),
                gatewaysvc: None,
            },
            grpc: GrpcSection {
                network: Network::Tcp,
                address: "0.0.0.0:9160".into(),
                services: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn pid_files_are_unique_per_process() {
        let a = pid_file_path("groups");
        let b = pid_file_path("groups");
        assert_ne!(a, b);

        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("revad-groups-"), "{name}");
        assert!(name.ends_with(".pid"), "{name}");
        assert_eq!(a.parent(), Some(env::temp_dir().as_path()));
    }

    #[tokio::test]
    async fn stop_cancels_runtime_and_removes_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let pid_file = dir.path().join("revad-groups.pid");
        let actor = Arc::new(BackendActor::with_pid_file(
            "groups",
            tree(),
            runtime.clone(),
            pid_file.clone(),
        ));

        let task = {
            let actor = Arc::clone(&actor);
            tokio::spawn(async move { actor.start(ShutdownContext::new()).await })
        };
        while !pid_file.exists() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            runtime.seen.lock().unwrap().clone(),
            Some((pid_file.clone(), "0.0.0.0:9160".to_string()))
        );

        actor.stop(Duration::from_secs(1)).await.unwrap();
        task.await.unwrap().unwrap();
        assert!(!pid_file.exists());
        assert_eq!(actor.state(), ActorState::Stopped);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn repeated_stop_logs_shutdown_once() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("revad-users.pid");
        let actor = Arc::new(BackendActor::with_pid_file(
            "users",
            tree(),
            Arc::new(FakeRuntime::default()),
            pid_file.clone(),
        ));
        let task = {
            let actor = Arc::clone(&actor);
            tokio::spawn(async move { actor.start(ShutdownContext::new()).await })
        };
        while !pid_file.exists() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        for _ in 0..3 {
            actor.stop(Duration::from_secs(1)).await.unwrap();
        }
        task.await.unwrap().unwrap();

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(out.matches("Shutting down server").count(), 1, "{out}");
    }

    #[tokio::test]
    async fn shutdown_context_cancels_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let actor = BackendActor::with_pid_file(
            "users",
            tree(),
            Arc::new(FakeRuntime::default()),
            dir.path().join("revad-users.pid"),
        );
        let ctx = ShutdownContext::new();
        ctx.begin(Duration::from_secs(1));
        tokio::time::timeout(Duration::from_secs(1), actor.start(ctx))
            .await
            .expect("start should observe shutdown")
            .unwrap();
    }
}
