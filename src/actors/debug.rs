//! # Debug endpoint actor.
//!
//! Serves a small HTTP surface next to each service:
//!
//! | Route      | Response                                   |
//! |------------|--------------------------------------------|
//! | `/healthz` | `200 OK`, body `OK`                        |
//! | `/readyz`  | `200 OK`, body `OK`                        |
//! | `/version` | JSON `{ "service": .., "version": .. }`    |
//!
//! When tracing is enabled the router is wrapped in a [`TraceLayer`]. A bind failure is
//! returned from `start`, so it becomes the supervisor's trigger error.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::{Actor, ActorState, Lifecycle, ShutdownContext};
use crate::error::ActorError;

/// Body of `GET /version`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub service: String,
    pub version: &'static str,
}

/// HTTP liveness/readiness endpoint of one service.
pub struct DebugActor {
    name: String,
    addr: String,
    info: Arc<VersionInfo>,
    tracing: bool,
    bound: OnceLock<SocketAddr>,
    lifecycle: Lifecycle,
}

impl DebugActor {
    /// Creates the endpoint for `service`, to be bound on `addr` (`host:port`).
    pub fn new(service: &str, addr: impl Into<String>, tracing: bool) -> Self {
        Self {
            name: format!("{service}-debug"),
            addr: addr.into(),
            info: Arc::new(VersionInfo {
                service: service.to_string(),
                version: env!("CARGO_PKG_VERSION"),
            }),
            tracing,
            bound: OnceLock::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Address actually bound, once `start` is listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    /// Builds the router served by this actor.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/healthz", get(health))
            .route("/readyz", get(ready))
            .route("/version", get(version))
            .with_state(Arc::clone(&self.info));

        if self.tracing {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn ready() -> &'static str {
    "OK"
}

async fn version(State(info): State<Arc<VersionInfo>>) -> Json<VersionInfo> {
    Json(info.as_ref().clone())
}

#[async_trait]
impl Actor for DebugActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ActorState {
        self.lifecycle.state()
    }

    async fn start(&self, ctx: ShutdownContext) -> Result<(), ActorError> {
        let stopped = self.lifecycle.stop_signal(&ctx);
        let app = self.router();

        self.lifecycle
            .run(async move {
                let listener =
                    TcpListener::bind(&self.addr)
                        .await
                        .map_err(|source| ActorError::Bind {
                            addr: self.addr.clone(),
                            source,
                        })?;
                if let Ok(addr) = listener.local_addr() {
                    let _ = self.bound.set(addr);
                }
                info!(server = %self.name, addr = %self.addr, "starting debug server");

                axum::serve(listener, app)
                    .with_graceful_shutdown(stopped)
                    .await
                    .map_err(ActorError::Serve)?;

                info!(server = %self.name, "Shutting down server");
                Ok(())
            })
            .await
    }

    async fn stop(&self, deadline: Duration) -> Result<(), ActorError> {
        self.lifecycle.stop(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let res = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_and_ready_answer_ok() {
        let actor = DebugActor::new("groups", "127.0.0.1:0", false);
        assert_eq!(actor.name(), "groups-debug");

        for uri in ["/healthz", "/readyz"] {
            let (status, body) = get_body(actor.router(), uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "OK");
        }
    }

    #[tokio::test]
    async fn version_reports_service() {
        let actor = DebugActor::new("users", "127.0.0.1:0", true);
        let (status, body) = get_body(actor.router(), "/version").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["service"], "users");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let actor = DebugActor::new("users", "127.0.0.1:0", false);
        let (status, _) = get_body(actor.router(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bind_conflict_fails_start() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let actor = DebugActor::new("groups", addr.clone(), false);
        let err = actor.start(ShutdownContext::new()).await.unwrap_err();
        match err {
            ActorError::Bind { addr: got, .. } => assert_eq!(got, addr),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(actor.state(), ActorState::Stopped);
    }

    #[tokio::test]
    async fn stop_drains_the_server() {
        let actor = Arc::new(DebugActor::new("gateway", "127.0.0.1:0", false));
        let task = {
            let actor = Arc::clone(&actor);
            tokio::spawn(async move { actor.start(ShutdownContext::new()).await })
        };
        while actor.local_addr().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        actor.stop(Duration::from_secs(2)).await.unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(actor.state(), ActorState::Stopped);
    }
}
