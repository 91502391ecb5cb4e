//! Typed configuration tree of the backend runtime.
//!
//! The tree is assembled from a [`ServiceConfig`](crate::service::ServiceConfig) and only
//! turned into text (TOML) when it crosses the runtime boundary:
//!
//! ```toml
//! [core]
//! max_cpus = ""
//! tracing_enabled = false
//! tracing_service_name = "groups"
//!
//! [shared]
//! jwt_secret = "..."
//!
//! [grpc]
//! network = "tcp"
//! address = "0.0.0.0:9160"
//!
//! [grpc.services.groupprovider]
//! driver = "json"
//!
//! [grpc.services.groupprovider.drivers.json]
//! groups = "/srv/groups.json"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{DriverSpec, Network};

/// Root of the runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub core: CoreSection,
    pub shared: SharedSection,
    pub grpc: GrpcSection,
}

/// Process-wide runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSection {
    pub max_cpus: String,
    pub tracing_enabled: bool,
    pub tracing_endpoint: String,
    pub tracing_collector: String,
    pub tracing_service_name: String,
}

/// Settings shared by every hosted service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedSection {
    pub jwt_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gatewaysvc: Option<String>,
}

/// gRPC listener and the services it hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrpcSection {
    pub network: Network,
    pub address: String,
    pub services: BTreeMap<String, ServiceSection>,
}

/// Configuration of one hosted gRPC service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceSection {
    /// Driver-backed service (providers and registries).
    Provider(ProviderSection),
    Gateway(Box<GatewaySection>),
}

/// `driver = "<name>"` plus the selected driver's parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSection {
    pub driver: String,
    pub drivers: DriverSpec,
}

impl ProviderSection {
    pub fn new(spec: DriverSpec) -> Self {
        Self {
            driver: spec.name().to_string(),
            drivers: spec,
        }
    }
}

/// Settings of the `gateway` service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySection {
    pub authregistrysvc: String,
    pub storageregistrysvc: String,
    pub usershareprovidersvc: String,
    pub userprovidersvc: String,
    pub commit_share_to_storage_grant: bool,
    pub commit_share_to_storage_ref: bool,
    pub share_folder: String,
    pub disable_home_creation_on_login: bool,
    pub home_mapping: String,
    pub etag_cache_ttl: u64,
    pub datagateway: String,
    pub transfer_shared_secret: String,
    pub transfer_expires: u64,
}

impl RuntimeConfig {
    /// Names of the hosted services, sorted.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.grpc.services.keys().map(String::as_str)
    }

    /// Encodes the tree for the runtime.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonParams;

    fn tree() -> RuntimeConfig {
        let mut services = BTreeMap::new();
        services.insert(
            "groupprovider".to_string(),
            ServiceSection::Provider(ProviderSection::new(DriverSpec::Json(JsonParams {
                users: None,
                groups: Some("/srv/groups.json".into()),
            }))),
        );
        RuntimeConfig {
            core: CoreSection {
                max_cpus: String::new(),
                tracing_enabled: false,
                tracing_endpoint: String::new(),
                tracing_collector: String::new(),
                tracing_service_name: "groups".into(),
            },
            shared: SharedSection {
                jwt_secret: "secret".into(),
                gatewaysvc: None,
            },
            grpc: GrpcSection {
                network: Network::Tcp,
                address: "0.0.0.0:9160".into(),
                services,
            },
        }
    }

    #[test]
    fn encodes_the_runtime_layout() {
        let text = tree().to_toml().unwrap();
        let value: toml::Value = toml::from_str(&text).unwrap();

        assert_eq!(value["grpc"]["network"].as_str(), Some("tcp"));
        let provider = &value["grpc"]["services"]["groupprovider"];
        assert_eq!(provider["driver"].as_str(), Some("json"));
        assert_eq!(
            provider["drivers"]["json"]["groups"].as_str(),
            Some("/srv/groups.json")
        );
        assert!(provider["drivers"].get("ldap").is_none());
        assert!(value["shared"].get("gatewaysvc").is_none());
    }

    #[test]
    fn decodes_what_it_encodes() {
        let tree = tree();
        let back: RuntimeConfig = toml::from_str(&tree.to_toml().unwrap()).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.service_names().collect::<Vec<_>>(), ["groupprovider"]);
    }
}
