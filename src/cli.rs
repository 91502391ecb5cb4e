//! Command line of the `storagevisor` binary.
//!
//! Every flag is optional and has a `STORAGE_*` environment override; a value given
//! here replaces the one from the config file. Precedence: flag > env > file > default.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Config, LdapSettings, Network, RestSettings};
use crate::error::ConfigError;
use crate::service::ServiceKind;

/// Launches one storage service under a supervisor.
#[derive(Parser, Debug)]
#[command(name = "storagevisor", version, about)]
pub struct Cli {
    /// Config file; searched in the default locations when omitted.
    #[arg(long, global = true, env = "STORAGE_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "STORAGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Multi-line human-readable log output.
    #[arg(long, global = true, env = "STORAGE_LOG_PRETTY", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub log_pretty: Option<bool>,

    /// Coloured log output.
    #[arg(long, global = true, env = "STORAGE_LOG_COLOR", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub log_color: Option<bool>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway (gateway, auth registry, storage registry).
    Gateway(GatewayArgs),
    /// Start the user provider.
    Users(UsersArgs),
    /// Start the group provider.
    Groups(GroupsArgs),
    /// Start the basic-auth provider.
    AuthBasic(AuthBasicArgs),
}

impl Cli {
    /// Loads the config file, applies the command line on top and validates the result.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut cfg = Config::load(self.config_file.as_deref())?;
        self.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply(&self, cfg: &mut Config) {
        set(&mut cfg.log.level, &self.log_level);
        set(&mut cfg.log.pretty, &self.log_pretty);
        set(&mut cfg.log.color, &self.log_color);
        self.command.apply(cfg);
    }
}

impl Command {
    pub fn kind(&self) -> ServiceKind {
        match self {
            Command::Gateway(_) => ServiceKind::Gateway,
            Command::Users(_) => ServiceKind::Users,
            Command::Groups(_) => ServiceKind::Groups,
            Command::AuthBasic(_) => ServiceKind::AuthBasic,
        }
    }

    pub fn apply(&self, cfg: &mut Config) {
        match self {
            Command::Gateway(a) => a.apply(cfg),
            Command::Users(a) => a.apply(cfg),
            Command::Groups(a) => a.apply(cfg),
            Command::AuthBasic(a) => a.apply(cfg),
        }
    }
}

fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
    if let Some(v) = src {
        *dst = v.clone();
    }
}

fn set_list(dst: &mut Vec<String>, src: &[String]) {
    if !src.is_empty() {
        *dst = src.to_vec();
    }
}

/// Flags accepted by every service.
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Enable sending traces.
    #[arg(long, env = "STORAGE_TRACING_ENABLED", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub tracing_enabled: Option<bool>,
    /// Tracing backend type.
    #[arg(long, env = "STORAGE_TRACING_TYPE")]
    pub tracing_type: Option<String>,
    /// Endpoint of the tracing agent.
    #[arg(long, env = "STORAGE_TRACING_ENDPOINT")]
    pub tracing_endpoint: Option<String>,
    /// HTTP endpoint for sending spans directly to a collector.
    #[arg(long, env = "STORAGE_TRACING_COLLECTOR")]
    pub tracing_collector: Option<String>,
    /// Service name reported to the tracing backend.
    #[arg(long, env = "STORAGE_TRACING_SERVICE")]
    pub tracing_service: Option<String>,
    /// Secret used to sign and verify tokens.
    #[arg(long, env = "STORAGE_JWT_SECRET")]
    pub jwt_secret: Option<String>,
}

impl CommonArgs {
    fn apply(&self, cfg: &mut Config) {
        set(&mut cfg.tracing.enabled, &self.tracing_enabled);
        set(&mut cfg.tracing.kind, &self.tracing_type);
        set(&mut cfg.tracing.endpoint, &self.tracing_endpoint);
        set(&mut cfg.tracing.collector, &self.tracing_collector);
        set(&mut cfg.tracing.service, &self.tracing_service);
        set(&mut cfg.reva.jwt_secret, &self.jwt_secret);
    }
}

/// LDAP flags shared by the providers.
#[derive(Args, Debug, Default)]
pub struct LdapArgs {
    #[arg(long, env = "STORAGE_LDAP_HOSTNAME")]
    pub ldap_hostname: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_PORT")]
    pub ldap_port: Option<u16>,
    #[arg(long, env = "STORAGE_LDAP_BASE_DN")]
    pub ldap_base_dn: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_LOGINFILTER")]
    pub ldap_loginfilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_USERFILTER")]
    pub ldap_userfilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_USERATTRIBUTEFILTER")]
    pub ldap_userattributefilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_USERFINDFILTER")]
    pub ldap_userfindfilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_USERGROUPFILTER")]
    pub ldap_usergroupfilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_GROUPFILTER")]
    pub ldap_groupfilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_GROUPATTRIBUTEFILTER")]
    pub ldap_groupattributefilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_GROUPFINDFILTER")]
    pub ldap_groupfindfilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_GROUPMEMBERFILTER")]
    pub ldap_groupmemberfilter: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_BIND_DN")]
    pub ldap_bind_dn: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_BIND_PASSWORD")]
    pub ldap_bind_password: Option<String>,
    /// Identity provider value stamped on resolved accounts.
    #[arg(long, env = "STORAGE_LDAP_IDP")]
    pub ldap_idp: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_SCHEMA_UID")]
    pub ldap_schema_uid: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_SCHEMA_GID")]
    pub ldap_schema_gid: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_SCHEMA_MAIL")]
    pub ldap_schema_mail: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_SCHEMA_DISPLAYNAME")]
    pub ldap_schema_displayname: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_SCHEMA_CN")]
    pub ldap_schema_cn: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_SCHEMA_UID_NUMBER")]
    pub ldap_schema_uid_number: Option<String>,
    #[arg(long, env = "STORAGE_LDAP_SCHEMA_GID_NUMBER")]
    pub ldap_schema_gid_number: Option<String>,
}

impl LdapArgs {
    fn apply(&self, ldap: &mut LdapSettings) {
        set(&mut ldap.hostname, &self.ldap_hostname);
        set(&mut ldap.port, &self.ldap_port);
        set(&mut ldap.base_dn, &self.ldap_base_dn);
        set(&mut ldap.login_filter, &self.ldap_loginfilter);
        set(&mut ldap.user_filter, &self.ldap_userfilter);
        set(&mut ldap.user_attribute_filter, &self.ldap_userattributefilter);
        set(&mut ldap.user_find_filter, &self.ldap_userfindfilter);
        set(&mut ldap.user_group_filter, &self.ldap_usergroupfilter);
        set(&mut ldap.group_filter, &self.ldap_groupfilter);
        set(&mut ldap.group_attribute_filter, &self.ldap_groupattributefilter);
        set(&mut ldap.group_find_filter, &self.ldap_groupfindfilter);
        set(&mut ldap.group_member_filter, &self.ldap_groupmemberfilter);
        set(&mut ldap.bind_dn, &self.ldap_bind_dn);
        set(&mut ldap.bind_password, &self.ldap_bind_password);
        set(&mut ldap.idp, &self.ldap_idp);
        let schema = &mut ldap.schema;
        set(&mut schema.uid, &self.ldap_schema_uid);
        set(&mut schema.gid, &self.ldap_schema_gid);
        set(&mut schema.mail, &self.ldap_schema_mail);
        set(&mut schema.display_name, &self.ldap_schema_displayname);
        set(&mut schema.cn, &self.ldap_schema_cn);
        set(&mut schema.uid_number, &self.ldap_schema_uid_number);
        set(&mut schema.gid_number, &self.ldap_schema_gid_number);
    }
}

/// REST backend flags shared by the user and group providers.
#[derive(Args, Debug, Default)]
pub struct RestArgs {
    #[arg(long, env = "STORAGE_REST_CLIENT_ID")]
    pub rest_client_id: Option<String>,
    #[arg(long, env = "STORAGE_REST_CLIENT_SECRET")]
    pub rest_client_secret: Option<String>,
    #[arg(long, env = "STORAGE_REST_REDIS_ADDRESS")]
    pub rest_redis_address: Option<String>,
    #[arg(long, env = "STORAGE_REST_REDIS_USERNAME")]
    pub rest_redis_username: Option<String>,
    #[arg(long, env = "STORAGE_REST_REDIS_PASSWORD")]
    pub rest_redis_password: Option<String>,
    #[arg(long, env = "STORAGE_REST_ID_PROVIDER")]
    pub rest_id_provider: Option<String>,
    #[arg(long, env = "STORAGE_REST_API_BASE_URL")]
    pub rest_api_base_url: Option<String>,
    #[arg(long, env = "STORAGE_REST_OIDC_TOKEN_ENDPOINT")]
    pub rest_oidc_token_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_REST_TARGET_API")]
    pub rest_target_api: Option<String>,
}

impl RestArgs {
    fn apply(&self, rest: &mut RestSettings) {
        set(&mut rest.client_id, &self.rest_client_id);
        set(&mut rest.client_secret, &self.rest_client_secret);
        set(&mut rest.redis_address, &self.rest_redis_address);
        set(&mut rest.redis_username, &self.rest_redis_username);
        set(&mut rest.redis_password, &self.rest_redis_password);
        set(&mut rest.id_provider, &self.rest_id_provider);
        set(&mut rest.api_base_url, &self.rest_api_base_url);
        set(&mut rest.oidc_token_endpoint, &self.rest_oidc_token_endpoint);
        set(&mut rest.target_api, &self.rest_target_api);
    }
}

#[derive(Args, Debug)]
pub struct GatewayArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Address of the debug endpoint.
    #[arg(long, env = "STORAGE_GATEWAY_DEBUG_ADDR")]
    pub debug_addr: Option<String>,
    #[arg(long, value_enum, env = "STORAGE_GATEWAY_NETWORK")]
    pub network: Option<Network>,
    /// Address of the gRPC listener.
    #[arg(long, env = "STORAGE_GATEWAY_ADDR")]
    pub addr: Option<String>,
    /// gRPC services to host; repeat or separate with commas.
    #[arg(long = "service", env = "STORAGE_GATEWAY_SERVICES", value_delimiter = ',')]
    pub services: Vec<String>,

    #[arg(long, env = "STORAGE_GATEWAY_COMMIT_SHARE_TO_STORAGE_GRANT")]
    pub commit_share_to_storage_grant: Option<bool>,
    #[arg(long, env = "STORAGE_GATEWAY_COMMIT_SHARE_TO_STORAGE_REF")]
    pub commit_share_to_storage_ref: Option<bool>,
    /// Folder received shares are mounted into.
    #[arg(long, env = "STORAGE_GATEWAY_SHARE_FOLDER")]
    pub share_folder: Option<String>,
    #[arg(long, env = "STORAGE_GATEWAY_DISABLE_HOME_CREATION_ON_LOGIN")]
    pub disable_home_creation_on_login: Option<bool>,
    #[arg(long, env = "STORAGE_GATEWAY_HOME_MAPPING")]
    pub home_mapping: Option<String>,
    #[arg(long, env = "STORAGE_GATEWAY_ETAG_CACHE_TTL")]
    pub etag_cache_ttl: Option<u64>,
    #[arg(long, env = "STORAGE_TRANSFER_SECRET")]
    pub transfer_secret: Option<String>,
    /// Seconds a data transfer token stays valid.
    #[arg(long, env = "STORAGE_TRANSFER_EXPIRES")]
    pub transfer_expires: Option<u64>,

    #[arg(long, env = "STORAGE_STORAGE_REGISTRY_DRIVER")]
    pub storage_registry_driver: Option<String>,
    #[arg(long, env = "STORAGE_STORAGE_REGISTRY_HOME_PROVIDER")]
    pub storage_registry_home_provider: Option<String>,
    /// `path=endpoint` routing rule; replaces the rules derived from the storage endpoints.
    #[arg(long = "storage-registry-rule", env = "STORAGE_STORAGE_REGISTRY_RULES", value_delimiter = ',')]
    pub storage_registry_rules: Vec<String>,

    /// Address other services use to reach the gateway.
    #[arg(long, env = "STORAGE_GATEWAY_ENDPOINT")]
    pub gateway_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_AUTH_BASIC_ENDPOINT")]
    pub auth_basic_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_AUTH_BEARER_ENDPOINT")]
    pub auth_bearer_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_USERPROVIDER_ENDPOINT")]
    pub userprovider_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_SHARING_ENDPOINT")]
    pub sharing_endpoint: Option<String>,
    /// Public URL the platform is reached at.
    #[arg(long, env = "STORAGE_FRONTEND_PUBLIC_URL")]
    pub public_url: Option<String>,
    /// Public data gateway URL; `<public-url>/data` when omitted.
    #[arg(long, env = "STORAGE_DATAGATEWAY_PUBLIC_URL")]
    pub datagateway_url: Option<String>,
    #[arg(long, env = "STORAGE_HOME_ENDPOINT")]
    pub storage_home_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_HOME_MOUNT_PATH")]
    pub storage_home_mount_path: Option<String>,
    #[arg(long, env = "STORAGE_HOME_MOUNT_ID")]
    pub storage_home_mount_id: Option<String>,
    #[arg(long, env = "STORAGE_USERS_ENDPOINT")]
    pub storage_users_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_USERS_MOUNT_PATH")]
    pub storage_users_mount_path: Option<String>,
    #[arg(long, env = "STORAGE_USERS_MOUNT_ID")]
    pub storage_users_mount_id: Option<String>,
    #[arg(long, env = "STORAGE_PUBLIC_LINK_ENDPOINT")]
    pub public_link_endpoint: Option<String>,
    #[arg(long, env = "STORAGE_PUBLIC_LINK_MOUNT_PATH")]
    pub public_link_mount_path: Option<String>,
}

impl GatewayArgs {
    fn apply(&self, cfg: &mut Config) {
        self.common.apply(cfg);
        let reva = &mut cfg.reva;
        set(&mut reva.transfer_secret, &self.transfer_secret);
        set(&mut reva.transfer_expires, &self.transfer_expires);

        let gw = &mut reva.gateway;
        set(&mut gw.debug_addr, &self.debug_addr);
        set(&mut gw.network, &self.network);
        set(&mut gw.addr, &self.addr);
        set_list(&mut gw.services, &self.services);
        set(&mut gw.commit_share_to_storage_grant, &self.commit_share_to_storage_grant);
        set(&mut gw.commit_share_to_storage_ref, &self.commit_share_to_storage_ref);
        set(&mut gw.share_folder, &self.share_folder);
        set(&mut gw.disable_home_creation_on_login, &self.disable_home_creation_on_login);
        set(&mut gw.home_mapping, &self.home_mapping);
        set(&mut gw.etag_cache_ttl, &self.etag_cache_ttl);

        let reg = &mut reva.storage_registry;
        set(&mut reg.driver, &self.storage_registry_driver);
        set(&mut reg.home_provider, &self.storage_registry_home_provider);
        set_list(&mut reg.rules, &self.storage_registry_rules);

        let ep = &mut reva.endpoints;
        set(&mut ep.gateway, &self.gateway_endpoint);
        set(&mut ep.auth_basic, &self.auth_basic_endpoint);
        set(&mut ep.auth_bearer, &self.auth_bearer_endpoint);
        set(&mut ep.userprovider, &self.userprovider_endpoint);
        set(&mut ep.sharing, &self.sharing_endpoint);
        set(&mut ep.public_url, &self.public_url);
        set(&mut ep.datagateway_url, &self.datagateway_url);
        set(&mut ep.storage_home.endpoint, &self.storage_home_endpoint);
        set(&mut ep.storage_home.mount_path, &self.storage_home_mount_path);
        set(&mut ep.storage_home.mount_id, &self.storage_home_mount_id);
        set(&mut ep.storage_users.endpoint, &self.storage_users_endpoint);
        set(&mut ep.storage_users.mount_path, &self.storage_users_mount_path);
        set(&mut ep.storage_users.mount_id, &self.storage_users_mount_id);
        set(&mut ep.storage_public_link.endpoint, &self.public_link_endpoint);
        set(&mut ep.storage_public_link.mount_path, &self.public_link_mount_path);
    }
}

#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[arg(long, env = "STORAGE_USERPROVIDER_DEBUG_ADDR")]
    pub debug_addr: Option<String>,
    #[arg(long, value_enum, env = "STORAGE_USERPROVIDER_NETWORK")]
    pub network: Option<Network>,
    #[arg(long, env = "STORAGE_USERPROVIDER_ADDR")]
    pub addr: Option<String>,
    #[arg(long = "service", env = "STORAGE_USERPROVIDER_SERVICES", value_delimiter = ',')]
    pub services: Vec<String>,
    /// User backend: json, ldap or rest.
    #[arg(long, env = "STORAGE_USERPROVIDER_DRIVER")]
    pub driver: Option<String>,
    /// File read by the json driver.
    #[arg(long, env = "STORAGE_USERPROVIDER_JSON")]
    pub json_config: Option<String>,
    /// Minutes the rest driver caches a user's groups.
    #[arg(long, env = "STORAGE_USER_GROUPS_CACHE_EXPIRATION")]
    pub user_groups_cache_expiration: Option<u64>,
    #[command(flatten)]
    pub ldap: LdapArgs,
    #[command(flatten)]
    pub rest: RestArgs,
}

impl UsersArgs {
    fn apply(&self, cfg: &mut Config) {
        self.common.apply(cfg);
        self.ldap.apply(&mut cfg.reva.ldap);
        self.rest.apply(&mut cfg.reva.user_group_rest);
        let users = &mut cfg.reva.users;
        set(&mut users.debug_addr, &self.debug_addr);
        set(&mut users.network, &self.network);
        set(&mut users.addr, &self.addr);
        set_list(&mut users.services, &self.services);
        set(&mut users.driver, &self.driver);
        set(&mut users.json, &self.json_config);
        set(&mut users.user_groups_cache_expiration, &self.user_groups_cache_expiration);
    }
}

#[derive(Args, Debug)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[arg(long, env = "STORAGE_GROUPPROVIDER_DEBUG_ADDR")]
    pub debug_addr: Option<String>,
    #[arg(long, value_enum, env = "STORAGE_GROUPPROVIDER_NETWORK")]
    pub network: Option<Network>,
    #[arg(long, env = "STORAGE_GROUPPROVIDER_ADDR")]
    pub addr: Option<String>,
    #[arg(long = "service", env = "STORAGE_GROUPPROVIDER_SERVICES", value_delimiter = ',')]
    pub services: Vec<String>,
    /// Group backend: json, ldap or rest.
    #[arg(long, env = "STORAGE_GROUPPROVIDER_DRIVER")]
    pub driver: Option<String>,
    /// File read by the json driver.
    #[arg(long, env = "STORAGE_GROUPPROVIDER_JSON")]
    pub json_config: Option<String>,
    /// Minutes the rest driver caches a group's members.
    #[arg(long, env = "STORAGE_GROUP_MEMBERS_CACHE_EXPIRATION")]
    pub group_members_cache_expiration: Option<u64>,
    #[command(flatten)]
    pub ldap: LdapArgs,
    #[command(flatten)]
    pub rest: RestArgs,
}

impl GroupsArgs {
    fn apply(&self, cfg: &mut Config) {
        self.common.apply(cfg);
        self.ldap.apply(&mut cfg.reva.ldap);
        self.rest.apply(&mut cfg.reva.user_group_rest);
        let groups = &mut cfg.reva.groups;
        set(&mut groups.debug_addr, &self.debug_addr);
        set(&mut groups.network, &self.network);
        set(&mut groups.addr, &self.addr);
        set_list(&mut groups.services, &self.services);
        set(&mut groups.driver, &self.driver);
        set(&mut groups.json, &self.json_config);
        set(&mut groups.group_members_cache_expiration, &self.group_members_cache_expiration);
    }
}

#[derive(Args, Debug)]
pub struct AuthBasicArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[arg(long, env = "STORAGE_AUTH_BASIC_DEBUG_ADDR")]
    pub debug_addr: Option<String>,
    #[arg(long, value_enum, env = "STORAGE_AUTH_BASIC_NETWORK")]
    pub network: Option<Network>,
    #[arg(long, env = "STORAGE_AUTH_BASIC_ADDR")]
    pub addr: Option<String>,
    #[arg(long = "service", env = "STORAGE_AUTH_BASIC_SERVICES", value_delimiter = ',')]
    pub services: Vec<String>,
    /// Auth backend: demo, json or ldap.
    #[arg(long, env = "STORAGE_AUTH_DRIVER")]
    pub auth_driver: Option<String>,
    /// File read by the json driver.
    #[arg(long, env = "STORAGE_AUTH_JSON")]
    pub auth_json: Option<String>,
    #[command(flatten)]
    pub ldap: LdapArgs,
}

impl AuthBasicArgs {
    fn apply(&self, cfg: &mut Config) {
        self.common.apply(cfg);
        self.ldap.apply(&mut cfg.reva.ldap);
        let auth = &mut cfg.reva.auth_basic;
        set(&mut auth.debug_addr, &self.debug_addr);
        set(&mut auth.network, &self.network);
        set(&mut auth.addr, &self.addr);
        set_list(&mut auth.services, &self.services);
        set(&mut cfg.reva.auth_provider.driver, &self.auth_driver);
        set(&mut cfg.reva.auth_provider.json, &self.auth_json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("storagevisor").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_line_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_the_file() {
        let cli = parse(&[
            "--log-level",
            "debug",
            "--log-pretty",
            "groups",
            "--driver",
            "json",
            "--json-config",
            "/srv/groups.json",
            "--addr",
            "127.0.0.1:19160",
            "--network",
            "unix",
            "--tracing-enabled",
            "--ldap-port",
            "636",
        ]);
        assert_eq!(cli.command.kind(), ServiceKind::Groups);

        let mut cfg = Config::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.log.level, "debug");
        assert!(cfg.log.pretty);
        assert!(cfg.log.color);
        assert!(cfg.tracing.enabled);
        assert_eq!(cfg.reva.groups.driver, "json");
        assert_eq!(cfg.reva.groups.json, "/srv/groups.json");
        assert_eq!(cfg.reva.groups.addr, "127.0.0.1:19160");
        assert_eq!(cfg.reva.groups.network, Network::Unix);
        assert_eq!(cfg.reva.groups.debug_addr, "0.0.0.0:9161");
        assert_eq!(cfg.reva.ldap.port, 636);
        assert_eq!(cfg.reva.users.driver, "ldap");
    }

    #[test]
    fn repeated_services_replace_the_default_list() {
        let cli = parse(&["gateway", "--service", "gateway", "--service", "authregistry"]);
        let mut cfg = Config::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.reva.gateway.services, ["gateway", "authregistry"]);
    }

    #[test]
    fn registry_rules_come_from_the_command_line() {
        let cli = parse(&[
            "gateway",
            "--storage-registry-rule",
            "/eos=localhost:9158",
            "--public-url",
            "https://cloud.example.org",
        ]);
        let mut cfg = Config::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.reva.storage_registry.rules, ["/eos=localhost:9158"]);
        assert_eq!(cfg.reva.endpoints.public_url, "https://cloud.example.org");
    }

    #[test]
    fn auth_basic_subcommand_is_kebab_case() {
        let cli = parse(&["auth-basic", "--auth-driver", "demo"]);
        assert_eq!(cli.command.kind(), ServiceKind::AuthBasic);
        let mut cfg = Config::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.reva.auth_provider.driver, "demo");
    }

    #[test]
    fn unknown_network_is_rejected() {
        let res = Cli::try_parse_from(["storagevisor", "users", "--network", "carrier-pigeon"]);
        assert!(res.is_err());
    }
}
