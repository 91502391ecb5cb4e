//! # Configuration model.
//!
//! [`Config`] is built once at startup, from a TOML file (optional) and command-line
//! overrides, and passed by reference to the service being started.
//!
//! ## Discovery
//! An explicit path must exist and parse. Otherwise the first `storage.toml` found in
//! `/etc/storagevisor`, `$HOME/.storagevisor` and `./config` is used; if there is none,
//! built-in defaults apply.
//!
//! ## Example
//! ```toml
//! [log]
//! level = "debug"
//!
//! [supervisor]
//! stop_deadline_secs = 10
//!
//! [reva.groups]
//! driver = "json"
//! json = "/var/lib/storage/groups.json"
//! ```

mod driver;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::SupervisorConfig;
use crate::error::ConfigError;

pub use driver::{
    Capability, DemoParams, DriverSettings, DriverSpec, JsonParams, LdapParams, LdapSchema,
    LdapSchemaSettings, LdapSettings, RestParams, RestSettings, StaticParams,
};

/// File name looked up in the search directories.
pub const CONFIG_FILE_NAME: &str = "storage.toml";

/// Complete configuration of every service command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub tracing: TracingConfig,
    pub supervisor: SupervisorSettings,
    pub runtime: RuntimeSettings,
    pub reva: RevaConfig,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`. `RUST_LOG` takes precedence.
    pub level: String,
    /// Multi-line human-readable output.
    pub pretty: bool,
    /// ANSI colours.
    pub color: bool,
    /// One JSON object per line; ignored when `pretty` is set.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            pretty: false,
            color: true,
            json: false,
        }
    }
}

/// Distributed tracing settings forwarded to the backend runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    /// Backend kind; the runtime only supports `jaeger`.
    #[serde(rename = "type")]
    pub kind: String,
    pub endpoint: String,
    pub collector: String,
    /// Service name reported to the collector; the command name when empty.
    pub service: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: "jaeger".into(),
            endpoint: String::new(),
            collector: String::new(),
            service: String::new(),
        }
    }
}

/// Settings of the actor supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Time every actor gets to stop once shutdown begins.
    pub stop_deadline_secs: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            stop_deadline_secs: crate::core::DEFAULT_STOP_DEADLINE.as_secs(),
        }
    }
}

/// How the external backend runtime is launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Runtime binary, resolved through `PATH` when relative.
    pub binary: PathBuf,
    /// Argument template; `{config}` and `{pidfile}` are substituted.
    pub args: Vec<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("revad"),
            args: ["-c", "{config}", "-p", "{pidfile}"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Transport of a gRPC listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Tcp,
    Udp,
    Unix,
}

/// Backend runtime settings, per service and shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevaConfig {
    pub jwt_secret: String,
    pub transfer_secret: String,
    /// Seconds a data transfer token stays valid.
    pub transfer_expires: u64,
    pub gateway: GatewayConfig,
    pub users: UsersConfig,
    pub groups: GroupsConfig,
    pub auth_basic: AuthBasicConfig,
    pub auth_provider: AuthProviderConfig,
    pub storage_registry: StorageRegistryConfig,
    pub ldap: LdapSettings,
    pub user_group_rest: RestSettings,
    pub endpoints: Endpoints,
}

impl Default for RevaConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "Pive-Fumkiu4".into(),
            transfer_secret: "replace-me-with-a-transfer-secret".into(),
            transfer_expires: 24 * 60 * 60,
            gateway: GatewayConfig::default(),
            users: UsersConfig::default(),
            groups: GroupsConfig::default(),
            auth_basic: AuthBasicConfig::default(),
            auth_provider: AuthProviderConfig::default(),
            storage_registry: StorageRegistryConfig::default(),
            ldap: LdapSettings::default(),
            user_group_rest: RestSettings::default(),
            endpoints: Endpoints::default(),
        }
    }
}

fn services(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Gateway service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub network: Network,
    pub addr: String,
    pub debug_addr: String,
    pub max_cpus: String,
    pub services: Vec<String>,
    pub commit_share_to_storage_grant: bool,
    pub commit_share_to_storage_ref: bool,
    pub share_folder: String,
    pub disable_home_creation_on_login: bool,
    pub home_mapping: String,
    pub etag_cache_ttl: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            addr: "0.0.0.0:9142".into(),
            debug_addr: "0.0.0.0:9143".into(),
            max_cpus: String::new(),
            services: services(&["gateway", "authregistry", "storageregistry"]),
            commit_share_to_storage_grant: true,
            commit_share_to_storage_ref: true,
            share_folder: "Shares".into(),
            disable_home_creation_on_login: false,
            home_mapping: String::new(),
            etag_cache_ttl: 0,
        }
    }
}

/// Users provider service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    pub network: Network,
    pub addr: String,
    pub debug_addr: String,
    pub max_cpus: String,
    pub services: Vec<String>,
    pub driver: String,
    pub json: String,
    /// Minutes the `rest` driver caches a user's groups.
    pub user_groups_cache_expiration: u64,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            addr: "0.0.0.0:9144".into(),
            debug_addr: "0.0.0.0:9145".into(),
            max_cpus: String::new(),
            services: services(&["userprovider"]),
            driver: "ldap".into(),
            json: String::new(),
            user_groups_cache_expiration: 5,
        }
    }
}

/// Groups provider service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    pub network: Network,
    pub addr: String,
    pub debug_addr: String,
    pub max_cpus: String,
    pub services: Vec<String>,
    pub driver: String,
    pub json: String,
    /// Minutes the `rest` driver caches a group's members.
    pub group_members_cache_expiration: u64,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            addr: "0.0.0.0:9160".into(),
            debug_addr: "0.0.0.0:9161".into(),
            max_cpus: String::new(),
            services: services(&["groupprovider"]),
            driver: "ldap".into(),
            json: String::new(),
            group_members_cache_expiration: 5,
        }
    }
}

/// Basic-auth provider service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthBasicConfig {
    pub network: Network,
    pub addr: String,
    pub debug_addr: String,
    pub max_cpus: String,
    pub services: Vec<String>,
}

impl Default for AuthBasicConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            addr: "0.0.0.0:9146".into(),
            debug_addr: "0.0.0.0:9147".into(),
            max_cpus: String::new(),
            services: services(&["authprovider"]),
        }
    }
}

/// Driver of the basic-auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthProviderConfig {
    pub driver: String,
    pub json: String,
}

impl Default for AuthProviderConfig {
    fn default() -> Self {
        Self {
            driver: "ldap".into(),
            json: String::new(),
        }
    }
}

/// Storage registry hosted by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageRegistryConfig {
    pub driver: String,
    pub home_provider: String,
    /// Explicit `path=endpoint` rules; when empty the rules are derived from the
    /// storage endpoints.
    pub rules: Vec<String>,
}

impl Default for StorageRegistryConfig {
    fn default() -> Self {
        Self {
            driver: "static".into(),
            home_provider: "/home".into(),
            rules: Vec::new(),
        }
    }
}

/// A storage provider mounted into the namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMount {
    pub endpoint: String,
    pub mount_path: String,
    pub mount_id: String,
}

/// Addresses of sibling services, as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub gateway: String,
    pub auth_basic: String,
    pub auth_bearer: String,
    pub userprovider: String,
    pub sharing: String,
    pub public_url: String,
    /// Public data gateway URL; derived from `public_url` when empty.
    pub datagateway_url: String,
    pub storage_home: StorageMount,
    pub storage_users: StorageMount,
    pub storage_public_link: StorageMount,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gateway: "localhost:9142".into(),
            auth_basic: "localhost:9146".into(),
            auth_bearer: "localhost:9148".into(),
            userprovider: "localhost:9144".into(),
            sharing: "localhost:9150".into(),
            public_url: "https://localhost:9200".into(),
            datagateway_url: String::new(),
            storage_home: StorageMount {
                endpoint: "localhost:9154".into(),
                mount_path: "/home".into(),
                mount_id: "1284d238-aa92-42ce-bdc4-0b0000009154".into(),
            },
            storage_users: StorageMount {
                endpoint: "localhost:9157".into(),
                mount_path: "/users".into(),
                mount_id: "1284d238-aa92-42ce-bdc4-0b0000009157".into(),
            },
            storage_public_link: StorageMount {
                endpoint: "localhost:9178".into(),
                mount_path: "/public".into(),
                mount_id: "e1a73ede-549b-4226-abdf-40e69ca8230d".into(),
            },
        }
    }
}

impl Config {
    /// Loads the configuration from `explicit`, or from the first file found in the
    /// search directories, or falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match locate(explicit) {
            Some(path) => Self::from_file(&path),
            None => {
                let cfg = Self::default();
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    /// Reads and validates one TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let cfg: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks settings whose domain the types do not capture.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS
            .iter()
            .any(|l| l.eq_ignore_ascii_case(self.log.level.trim()))
        {
            return Err(ConfigError::Invalid {
                key: "log.level",
                reason: format!("{:?} is not one of {LEVELS:?}", self.log.level),
            });
        }
        if self.runtime.binary.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "runtime.binary",
                reason: "must not be empty".into(),
            });
        }
        for rule in &self.reva.storage_registry.rules {
            if !rule.contains('=') {
                return Err(ConfigError::Invalid {
                    key: "reva.storage_registry.rules",
                    reason: format!("{rule:?} is not of the form path=endpoint"),
                });
            }
        }
        Ok(())
    }

    /// Settings of the actor supervisor.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::default()
            .with_stop_deadline(Duration::from_secs(self.supervisor.stop_deadline_secs))
    }

    /// Driver selection and parameters for `capability`.
    pub fn driver_settings(&self, capability: Capability) -> DriverSettings {
        let reva = &self.reva;
        let (driver, json, cache_expiration) = match capability {
            Capability::Users => (
                reva.users.driver.as_str(),
                reva.users.json.as_str(),
                reva.users.user_groups_cache_expiration,
            ),
            Capability::Groups => (
                reva.groups.driver.as_str(),
                reva.groups.json.as_str(),
                reva.groups.group_members_cache_expiration,
            ),
            Capability::Auth => (
                reva.auth_provider.driver.as_str(),
                reva.auth_provider.json.as_str(),
                0,
            ),
            Capability::Registry => (reva.storage_registry.driver.as_str(), "", 0),
        };

        DriverSettings {
            driver: driver.to_string(),
            json: json.to_string(),
            ldap: reva.ldap.clone(),
            rest: reva.user_group_rest.clone(),
            cache_expiration,
            rules: if capability == Capability::Registry {
                self.storage_rules()
            } else {
                Default::default()
            },
            home_provider: (capability == Capability::Registry)
                .then(|| reva.storage_registry.home_provider.clone()),
        }
    }

    /// Storage registry rules: the explicit list when given, otherwise one rule per
    /// mount path and mount id of the configured storage providers.
    fn storage_rules(&self) -> std::collections::BTreeMap<String, String> {
        let explicit = &self.reva.storage_registry.rules;
        if !explicit.is_empty() {
            return explicit
                .iter()
                .filter_map(|r| r.split_once('='))
                .map(|(path, endpoint)| (path.trim().to_string(), endpoint.trim().to_string()))
                .collect();
        }

        let ep = &self.reva.endpoints;
        let mut rules = std::collections::BTreeMap::new();
        for mount in [&ep.storage_home, &ep.storage_users] {
            rules.insert(mount.mount_path.clone(), mount.endpoint.clone());
            rules.insert(mount.mount_id.clone(), mount.endpoint.clone());
        }
        rules.insert(
            ep.storage_public_link.mount_path.clone(),
            ep.storage_public_link.endpoint.clone(),
        );
        rules
    }
}

/// File [`Config::load`] reads: `explicit` when given, otherwise the discovered one.
pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => discover(&search_dirs()),
    }
}

/// Directories searched for [`CONFIG_FILE_NAME`], in order.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut out = vec![PathBuf::from("/etc/storagevisor")];
    if let Some(home) = dirs::home_dir() {
        out.push(home.join(".storagevisor"));
    }
    out.push(PathBuf::from("./config"));
    out
}

/// First existing [`CONFIG_FILE_NAME`] in `dirs`.
pub fn discover(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|d| d.join(CONFIG_FILE_NAME))
        .find(|p| p.is_file())
}
