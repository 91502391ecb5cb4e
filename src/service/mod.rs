//! # Service assembly.
//!
//! A service command (`gateway`, `users`, `groups`, `auth-basic`) resolves its
//! [`ServiceConfig`] from the [`Config`], then runs three actors under one supervisor:
//!
//! ```text
//! run_service(kind, &cfg)
//!   ├─► ServiceConfig::from_config   (driver resolution; errors before any actor starts)
//!   ├─► BackendActor(runtime_tree)   ─┐
//!   ├─► DebugActor(debug_addr)        ├─► Supervisor::run
//!   └─► SignalActor                  ─┘
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::actors::{BackendActor, DebugActor, SignalActor};
use crate::config::{
    Capability, Config, DriverSpec, Network, StaticParams, TracingConfig,
};
use crate::core::{ActorRef, Supervisor, SupervisorConfig};
use crate::error::{ConfigError, Error};
use crate::runtime::{
    BackendRuntime, CoreSection, GatewaySection, GrpcSection, ProcessRuntime, ProviderSection,
    RuntimeConfig, ServiceSection, SharedSection,
};
use crate::subscribers::{LogWriter, Subscribe};

/// The service commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Gateway,
    Users,
    Groups,
    AuthBasic,
}

impl ServiceKind {
    /// Command name; also the actor and tracing service name.
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Gateway => "gateway",
            ServiceKind::Users => "users",
            ServiceKind::Groups => "groups",
            ServiceKind::AuthBasic => "auth-basic",
        }
    }

    /// gRPC services this command knows how to configure.
    pub fn known_services(self) -> &'static [&'static str] {
        match self {
            ServiceKind::Gateway => &["gateway", "authregistry", "storageregistry"],
            ServiceKind::Users => &["userprovider"],
            ServiceKind::Groups => &["groupprovider"],
            ServiceKind::AuthBasic => &["authprovider"],
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully resolved description of one service instance. Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub kind: ServiceKind,
    pub network: Network,
    pub addr: String,
    pub debug_addr: String,
    pub max_cpus: String,
    pub tracing: TracingConfig,
    pub jwt_secret: String,
    pub gatewaysvc: Option<String>,
    pub services: BTreeMap<String, ServiceSection>,
}

impl ServiceConfig {
    /// Resolves the configuration of `kind`.
    ///
    /// # Errors
    /// - [`ConfigError::UnknownDriver`] for a driver outside the capability's set;
    /// - [`ConfigError::UnknownService`] for a hosted service the command cannot configure;
    /// - [`ConfigError::Invalid`] when no service is hosted at all.
    pub fn from_config(kind: ServiceKind, cfg: &Config) -> Result<Self, ConfigError> {
        let reva = &cfg.reva;
        let (network, addr, debug_addr, max_cpus, names) = match kind {
            ServiceKind::Gateway => {
                let s = &reva.gateway;
                (s.network, &s.addr, &s.debug_addr, &s.max_cpus, &s.services)
            }
            ServiceKind::Users => {
                let s = &reva.users;
                (s.network, &s.addr, &s.debug_addr, &s.max_cpus, &s.services)
            }
            ServiceKind::Groups => {
                let s = &reva.groups;
                (s.network, &s.addr, &s.debug_addr, &s.max_cpus, &s.services)
            }
            ServiceKind::AuthBasic => {
                let s = &reva.auth_basic;
                (s.network, &s.addr, &s.debug_addr, &s.max_cpus, &s.services)
            }
        };

        if names.is_empty() {
            return Err(ConfigError::Invalid {
                key: "services",
                reason: format!("{kind} must host at least one service"),
            });
        }

        let mut services = BTreeMap::new();
        for name in names {
            services.insert(name.clone(), hosted_section(kind, name, cfg)?);
        }

        Ok(Self {
            kind,
            network,
            addr: addr.clone(),
            debug_addr: debug_addr.clone(),
            max_cpus: max_cpus.clone(),
            tracing: cfg.tracing.clone(),
            jwt_secret: reva.jwt_secret.clone(),
            gatewaysvc: (kind == ServiceKind::Gateway).then(|| reva.endpoints.gateway.clone()),
            services,
        })
    }

    /// Service name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Builds the runtime configuration tree.
    pub fn runtime_tree(&self) -> RuntimeConfig {
        let service_name = if self.tracing.service.is_empty() {
            self.name().to_string()
        } else {
            self.tracing.service.clone()
        };
        RuntimeConfig {
            core: CoreSection {
                max_cpus: self.max_cpus.clone(),
                tracing_enabled: self.tracing.enabled,
                tracing_endpoint: self.tracing.endpoint.clone(),
                tracing_collector: self.tracing.collector.clone(),
                tracing_service_name: service_name,
            },
            shared: SharedSection {
                jwt_secret: self.jwt_secret.clone(),
                gatewaysvc: self.gatewaysvc.clone(),
            },
            grpc: GrpcSection {
                network: self.network,
                address: self.addr.clone(),
                services: self.services.clone(),
            },
        }
    }
}

fn hosted_section(
    kind: ServiceKind,
    name: &str,
    cfg: &Config,
) -> Result<ServiceSection, ConfigError> {
    let provider = |capability: Capability| -> Result<ServiceSection, ConfigError> {
        let spec = cfg.driver_settings(capability).resolve(capability)?;
        Ok(ServiceSection::Provider(ProviderSection::new(spec)))
    };

    match (kind, name) {
        (ServiceKind::Users, "userprovider") => provider(Capability::Users),
        (ServiceKind::Groups, "groupprovider") => provider(Capability::Groups),
        (ServiceKind::AuthBasic, "authprovider") => provider(Capability::Auth),
        (ServiceKind::Gateway, "storageregistry") => provider(Capability::Registry),
        (ServiceKind::Gateway, "authregistry") => {
            let ep = &cfg.reva.endpoints;
            let rules = BTreeMap::from([
                ("basic".to_string(), ep.auth_basic.clone()),
                ("bearer".to_string(), ep.auth_bearer.clone()),
            ]);
            Ok(ServiceSection::Provider(ProviderSection::new(
                DriverSpec::Static(StaticParams {
                    rules,
                    home_provider: None,
                }),
            )))
        }
        (ServiceKind::Gateway, "gateway") => {
            Ok(ServiceSection::Gateway(Box::new(gateway_section(cfg))))
        }
        _ => Err(ConfigError::UnknownService {
            command: kind.name(),
            service: name.to_string(),
            expected: kind.known_services(),
        }),
    }
}

fn gateway_section(cfg: &Config) -> GatewaySection {
    let reva = &cfg.reva;
    let gw = &reva.gateway;
    let ep = &reva.endpoints;
    let datagateway = if ep.datagateway_url.is_empty() {
        format!("{}/data", ep.public_url.trim_end_matches('/'))
    } else {
        ep.datagateway_url.clone()
    };

    GatewaySection {
        authregistrysvc: ep.gateway.clone(),
        storageregistrysvc: ep.gateway.clone(),
        usershareprovidersvc: ep.sharing.clone(),
        userprovidersvc: ep.userprovider.clone(),
        commit_share_to_storage_grant: gw.commit_share_to_storage_grant,
        commit_share_to_storage_ref: gw.commit_share_to_storage_ref,
        share_folder: gw.share_folder.clone(),
        disable_home_creation_on_login: gw.disable_home_creation_on_login,
        home_mapping: gw.home_mapping.clone(),
        etag_cache_ttl: gw.etag_cache_ttl,
        datagateway,
        transfer_shared_secret: reva.transfer_secret.clone(),
        transfer_expires: reva.transfer_expires,
    }
}

/// How the configured tracing backend is handled by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingSupport {
    Disabled,
    Jaeger,
    /// A known backend the runtime cannot export to.
    Unsupported,
    Unknown,
}

impl TracingSupport {
    pub fn of(cfg: &TracingConfig) -> Self {
        if !cfg.enabled {
            return TracingSupport::Disabled;
        }
        match cfg.kind.as_str() {
            "jaeger" => TracingSupport::Jaeger,
            "agent" | "zipkin" => TracingSupport::Unsupported,
            _ => TracingSupport::Unknown,
        }
    }
}

fn log_tracing_support(cfg: &TracingConfig, service: &str) {
    let kind = cfg.kind.as_str();
    match TracingSupport::of(cfg) {
        TracingSupport::Disabled => debug!(service, "Tracing is not enabled"),
        TracingSupport::Jaeger => {
            info!(service, backend = kind, "configuring storage to use the jaeger tracing backend")
        }
        TracingSupport::Unsupported => error!(
            service,
            backend = kind,
            "the runtime only supports the jaeger tracing backend"
        ),
        TracingSupport::Unknown => warn!(service, backend = kind, "Unknown tracing backend"),
    }
}

/// Runs `kind` with the runtime binary from the configuration, until interrupted or
/// until one of its actors fails.
pub async fn run_service(kind: ServiceKind, cfg: &Config) -> Result<(), Error> {
    let service = ServiceConfig::from_config(kind, cfg)?;
    let runtime = Arc::new(ProcessRuntime::from_settings(&cfg.runtime));
    run_with(&service, cfg.supervisor_config(), runtime, SignalActor::new()).await
}

/// Runs a resolved service with an explicit runtime and signal source.
pub async fn run_with(
    service: &ServiceConfig,
    sup_cfg: SupervisorConfig,
    runtime: Arc<dyn BackendRuntime>,
    signal: SignalActor,
) -> Result<(), Error> {
    let name = service.name();
    log_tracing_support(&service.tracing, name);

    let actors: Vec<ActorRef> = vec![
        Arc::new(BackendActor::new(name, service.runtime_tree(), runtime)),
        Arc::new(DebugActor::new(
            name,
            service.debug_addr.clone(),
            service.tracing.enabled,
        )),
        Arc::new(signal),
    ];

    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(sup_cfg)
        .with_subscribers(subscribers)
        .build();

    info!(service = name, addr = %service.addr, network = ?service.network, "starting service");
    sup.run(actors).await?;
    info!(service = name, "service stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ActorError, RuntimeError};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct IdleRuntime;

    #[async_trait]
    impl BackendRuntime for IdleRuntime {
        async fn run(
            &self,
            _tree: &RuntimeConfig,
            _pid_file: &Path,
            ctx: CancellationToken,
        ) -> Result<(), ActorError> {
            ctx.cancelled().await;
            Ok(())
        }
    }

    fn groups_cfg() -> Config {
        let mut cfg = Config::default();
        cfg.reva.groups.driver = "json".into();
        cfg.reva.groups.json = "/srv/groups.json".into();
        cfg.reva.groups.debug_addr = "127.0.0.1:0".into();
        cfg
    }

    #[test]
    fn groups_tree_hosts_the_group_provider() {
        let service = ServiceConfig::from_config(ServiceKind::Groups, &groups_cfg()).unwrap();
        let tree = service.runtime_tree();

        assert_eq!(tree.core.tracing_service_name, "groups");
        assert_eq!(tree.grpc.address, "0.0.0.0:9160");
        assert_eq!(tree.shared.gatewaysvc, None);
        match &tree.grpc.services["groupprovider"] {
            ServiceSection::Provider(p) => {
                assert_eq!(p.driver, "json");
                assert!(matches!(&p.drivers, DriverSpec::Json(j) if j.groups.as_deref() == Some("/srv/groups.json")));
            }
            other => panic!("unexpected section {other:?}"),
        }
    }

    #[test]
    fn gateway_hosts_registries_by_default() {
        let service = ServiceConfig::from_config(ServiceKind::Gateway, &Config::default()).unwrap();
        let names: Vec<_> = service.services.keys().map(String::as_str).collect();
        assert_eq!(names, ["authregistry", "gateway", "storageregistry"]);
        assert_eq!(service.gatewaysvc.as_deref(), Some("localhost:9142"));

        let ServiceSection::Gateway(gw) = &service.services["gateway"] else {
            panic!("gateway section");
        };
        assert_eq!(gw.datagateway, "https://localhost:9200/data");
        assert_eq!(gw.transfer_expires, 86_400);

        let ServiceSection::Provider(auth) = &service.services["authregistry"] else {
            panic!("authregistry section");
        };
        let DriverSpec::Static(rules) = &auth.drivers else {
            panic!("static driver");
        };
        assert_eq!(rules.rules["basic"], "localhost:9146");
    }

    #[test]
    fn unknown_driver_fails_before_start() {
        let mut cfg = Config::default();
        cfg.reva.users.driver = "nis".into();
        let err = ServiceConfig::from_config(ServiceKind::Users, &cfg).unwrap_err();
        assert_eq!(err.as_label(), "config_unknown_driver");
    }

    #[test]
    fn foreign_service_is_rejected() {
        let mut cfg = Config::default();
        cfg.reva.groups.services = vec!["userprovider".into()];
        match ServiceConfig::from_config(ServiceKind::Groups, &cfg) {
            Err(ConfigError::UnknownService { command, service, .. }) => {
                assert_eq!(command, "groups");
                assert_eq!(service, "userprovider");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tracing_backends_are_classified() {
        let mut t = TracingConfig::default();
        assert_eq!(TracingSupport::of(&t), TracingSupport::Disabled);
        t.enabled = true;
        assert_eq!(TracingSupport::of(&t), TracingSupport::Jaeger);
        t.kind = "zipkin".into();
        assert_eq!(TracingSupport::of(&t), TracingSupport::Unsupported);
        t.kind = "otlp".into();
        assert_eq!(TracingSupport::of(&t), TracingSupport::Unknown);
    }

    #[tokio::test]
    async fn interrupt_stops_the_service_cleanly() {
        let service = ServiceConfig::from_config(ServiceKind::Groups, &groups_cfg()).unwrap();
        let (signal, handle) = SignalActor::manual();
        let sup_cfg = SupervisorConfig::default().with_stop_deadline(Duration::from_secs(2));

        let run = tokio::spawn(async move {
            run_with(&service, sup_cfg, Arc::new(IdleRuntime), signal).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.interrupt();

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("service did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn debug_bind_failure_is_the_group_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut cfg = groups_cfg();
        cfg.reva.groups.debug_addr = taken.local_addr().unwrap().to_string();
        let service = ServiceConfig::from_config(ServiceKind::Groups, &cfg).unwrap();
        let (signal, _handle) = SignalActor::manual();

        let err = run_with(
            &service,
            SupervisorConfig::default().with_stop_deadline(Duration::from_secs(2)),
            Arc::new(IdleRuntime),
            signal,
        )
        .await
        .unwrap_err();

        match err {
            Error::Runtime(RuntimeError::ActorFailed { actor, source }) => {
                assert_eq!(actor, "groups-debug");
                assert_eq!(source.as_label(), "actor_bind");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
