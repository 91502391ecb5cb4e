//! # Driver selection for provider capabilities.
//!
//! Each capability accepts a fixed, closed set of driver names:
//!
//! | Capability | Drivers               |
//! |------------|-----------------------|
//! | users      | `json`, `ldap`, `rest`|
//! | groups     | `json`, `ldap`, `rest`|
//! | auth       | `demo`, `json`, `ldap`|
//! | registry   | `static`              |
//!
//! [`DriverSettings::resolve`] turns the selection plus the configured parameters into a
//! [`DriverSpec`] holding the selected driver's parameters only. It is pure; an unknown
//! name is a [`ConfigError::UnknownDriver`] raised before any actor starts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A provider capability with its own closed set of drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Users,
    Groups,
    Auth,
    Registry,
}

impl Capability {
    /// Name used in errors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Users => "users",
            Capability::Groups => "groups",
            Capability::Auth => "auth",
            Capability::Registry => "registry",
        }
    }

    /// Accepted driver names.
    pub fn drivers(self) -> &'static [&'static str] {
        match self {
            Capability::Users | Capability::Groups => &["json", "ldap", "rest"],
            Capability::Auth => &["demo", "json", "ldap"],
            Capability::Registry => &["static"],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved driver: exactly one variant, carrying only that driver's parameters.
///
/// Serializes as a single-entry table keyed by the driver name, which is the shape of
/// the runtime's `drivers` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverSpec {
    Json(JsonParams),
    Ldap(LdapParams),
    Rest(RestParams),
    Demo(DemoParams),
    Static(StaticParams),
}

impl DriverSpec {
    /// Driver name as the runtime expects it.
    pub fn name(&self) -> &'static str {
        match self {
            DriverSpec::Json(_) => "json",
            DriverSpec::Ldap(_) => "ldap",
            DriverSpec::Rest(_) => "rest",
            DriverSpec::Demo(_) => "demo",
            DriverSpec::Static(_) => "static",
        }
    }
}

/// `json` driver: path of the users or groups file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<String>,
}

/// `ldap` driver. Filters that do not apply to the capability are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdapParams {
    pub hostname: String,
    pub port: u16,
    pub base_dn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loginfilter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userfilter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupfilter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributefilter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findfilter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memberfilter: Option<String>,
    pub bind_username: String,
    pub bind_password: String,
    pub idp: String,
    pub schema: LdapSchema,
}

/// Attribute names of the LDAP schema, in the runtime's spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdapSchema {
    pub dn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<String>,
    pub mail: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub cn: String,
    #[serde(
        rename = "uidNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub uid_number: Option<String>,
    #[serde(
        rename = "gidNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gid_number: Option<String>,
}

/// `rest` driver backed by an external user/group API and a redis cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestParams {
    pub client_id: String,
    pub client_secret: String,
    pub redis_address: String,
    pub redis_username: String,
    pub redis_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_groups_cache_expiration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_members_cache_expiration: Option<u64>,
    pub id_provider: String,
    pub api_base_url: String,
    pub oidc_token_endpoint: String,
    pub target_api: String,
}

/// `demo` driver: built-in accounts, no parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemoParams {}

/// `static` registry driver: fixed routing rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticParams {
    pub rules: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_provider: Option<String>,
}

/// LDAP connection, filters and schema, shared by every capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapSettings {
    pub hostname: String,
    pub port: u16,
    pub base_dn: String,
    pub login_filter: String,
    pub user_filter: String,
    pub user_attribute_filter: String,
    pub user_find_filter: String,
    pub user_group_filter: String,
    pub group_filter: String,
    pub group_attribute_filter: String,
    pub group_find_filter: String,
    pub group_member_filter: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub idp: String,
    pub schema: LdapSchemaSettings,
}

impl Default for LdapSettings {
    fn default() -> Self {
        Self {
            hostname: "localhost".into(),
            port: 9126,
            base_dn: "dc=example,dc=org".into(),
            login_filter: "(&(objectclass=posixAccount)(|(cn={{login}})(mail={{login}})))".into(),
            user_filter:
                "(&(objectclass=posixAccount)(|(ownclouduuid={{.OpaqueId}})(cn={{.OpaqueId}})))"
                    .into(),
            user_attribute_filter: "(&(objectclass=posixAccount)({{attr}}={{value}}))".into(),
            user_find_filter:
                "(&(objectclass=posixAccount)(|(cn={{query}}*)(displayname={{query}}*)(mail={{query}}*)))"
                    .into(),
            user_group_filter: "(&(objectclass=posixGroup)(ownclouduuid={{.OpaqueId}}*))".into(),
            group_filter:
                "(&(objectclass=posixGroup)(|(ownclouduuid={{.OpaqueId}})(cn={{.OpaqueId}})))"
                    .into(),
            group_attribute_filter: "(&(objectclass=posixGroup)({{attr}}={{value}}))".into(),
            group_find_filter:
                "(&(objectclass=posixGroup)(|(cn={{query}}*)(displayname={{query}}*)(mail={{query}}*)))"
                    .into(),
            group_member_filter: "(&(objectclass=posixAccount)(ownclouduuid={{.OpaqueId}}*))"
                .into(),
            bind_dn: "cn=reva,ou=sysusers,dc=example,dc=org".into(),
            bind_password: "reva".into(),
            idp: "https://localhost:9200".into(),
            schema: LdapSchemaSettings::default(),
        }
    }
}

/// LDAP attribute names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapSchemaSettings {
    pub uid: String,
    pub gid: String,
    pub mail: String,
    pub display_name: String,
    pub cn: String,
    pub uid_number: String,
    pub gid_number: String,
}

impl Default for LdapSchemaSettings {
    fn default() -> Self {
        Self {
            uid: "ownclouduuid".into(),
            gid: "ownclouduuid".into(),
            mail: "mail".into(),
            display_name: "displayname".into(),
            cn: "cn".into(),
            uid_number: "uidnumber".into(),
            gid_number: "gidnumber".into(),
        }
    }
}

/// REST user/group backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redis_address: String,
    pub redis_username: String,
    pub redis_password: String,
    pub id_provider: String,
    pub api_base_url: String,
    pub oidc_token_endpoint: String,
    pub target_api: String,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redis_address: "localhost:6379".into(),
            redis_username: String::new(),
            redis_password: String::new(),
            id_provider: String::new(),
            api_base_url: String::new(),
            oidc_token_endpoint: String::new(),
            target_api: String::new(),
        }
    }
}

/// Driver selection plus every driver's configured parameters, for one capability.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriverSettings {
    /// Selected driver name.
    pub driver: String,
    /// Path used by the `json` driver.
    pub json: String,
    pub ldap: LdapSettings,
    pub rest: RestSettings,
    /// Cache TTL of the `rest` driver.
    pub cache_expiration: u64,
    /// Rules of the `static` registry driver.
    pub rules: BTreeMap<String, String>,
    pub home_provider: Option<String>,
}

impl DriverSettings {
    /// Resolves the selected driver for `capability`.
    ///
    /// # Errors
    /// [`ConfigError::UnknownDriver`] when the name is not in the capability's set.
    ///
    /// # Example
    /// ```
    /// use storagevisor::config::{Capability, DriverSettings, DriverSpec};
    ///
    /// let settings = DriverSettings {
    ///     driver: "json".into(),
    ///     json: "/var/lib/groups.json".into(),
    ///     ..Default::default()
    /// };
    /// let spec = settings.resolve(Capability::Groups).unwrap();
    /// assert_eq!(spec.name(), "json");
    /// assert!(matches!(spec, DriverSpec::Json(ref p) if p.groups.as_deref() == Some("/var/lib/groups.json")));
    ///
    /// let err = DriverSettings { driver: "nis".into(), ..Default::default() }
    ///     .resolve(Capability::Groups)
    ///     .unwrap_err();
    /// assert_eq!(err.as_label(), "config_unknown_driver");
    /// ```
    pub fn resolve(&self, capability: Capability) -> Result<DriverSpec, ConfigError> {
        use Capability::*;

        let spec = match (capability, self.driver.as_str()) {
            (Users | Auth, "json") => DriverSpec::Json(JsonParams {
                users: Some(self.json.clone()),
                groups: None,
            }),
            (Groups, "json") => DriverSpec::Json(JsonParams {
                users: None,
                groups: Some(self.json.clone()),
            }),
            (Users | Groups | Auth, "ldap") => DriverSpec::Ldap(self.ldap_params(capability)),
            (Users | Groups, "rest") => DriverSpec::Rest(self.rest_params(capability)),
            (Auth, "demo") => DriverSpec::Demo(DemoParams {}),
            (Registry, "static") => DriverSpec::Static(StaticParams {
                rules: self.rules.clone(),
                home_provider: self.home_provider.clone(),
            }),
            _ => {
                return Err(ConfigError::UnknownDriver {
                    capability: capability.as_str(),
                    driver: self.driver.clone(),
                    expected: capability.drivers(),
                });
            }
        };
        Ok(spec)
    }

    fn ldap_params(&self, capability: Capability) -> LdapParams {
        let l = &self.ldap;
        let s = &l.schema;
        let mut params = LdapParams {
            hostname: l.hostname.clone(),
            port: l.port,
            base_dn: l.base_dn.clone(),
            loginfilter: None,
            userfilter: None,
            groupfilter: None,
            attributefilter: None,
            findfilter: None,
            memberfilter: None,
            bind_username: l.bind_dn.clone(),
            bind_password: l.bind_password.clone(),
            idp: l.idp.clone(),
            schema: LdapSchema {
                dn: "dn".into(),
                uid: None,
                gid: None,
                mail: s.mail.clone(),
                display_name: s.display_name.clone(),
                cn: s.cn.clone(),
                uid_number: None,
                gid_number: None,
            },
        };

        match capability {
            Capability::Users => {
                params.userfilter = Some(l.user_filter.clone());
                params.attributefilter = Some(l.user_attribute_filter.clone());
                params.findfilter = Some(l.user_find_filter.clone());
                params.groupfilter = Some(l.user_group_filter.clone());
                params.schema.uid = Some(s.uid.clone());
                params.schema.uid_number = Some(s.uid_number.clone());
                params.schema.gid_number = Some(s.gid_number.clone());
            }
            Capability::Groups => {
                params.groupfilter = Some(l.group_filter.clone());
                params.attributefilter = Some(l.group_attribute_filter.clone());
                params.findfilter = Some(l.group_find_filter.clone());
                params.memberfilter = Some(l.group_member_filter.clone());
                params.schema.gid = Some(s.gid.clone());
                params.schema.gid_number = Some(s.gid_number.clone());
            }
            Capability::Auth => {
                params.loginfilter = Some(l.login_filter.clone());
                params.userfilter = Some(l.user_filter.clone());
                params.schema.uid = Some(s.uid.clone());
            }
            Capability::Registry => {}
        }
        params
    }

    fn rest_params(&self, capability: Capability) -> RestParams {
        let r = &self.rest;
        let ttl = Some(self.cache_expiration);
        RestParams {
            client_id: r.client_id.clone(),
            client_secret: r.client_secret.clone(),
            redis_address: r.redis_address.clone(),
            redis_username: r.redis_username.clone(),
            redis_password: r.redis_password.clone(),
            user_groups_cache_expiration: ttl.filter(|_| capability == Capability::Users),
            group_members_cache_expiration: ttl.filter(|_| capability == Capability::Groups),
            id_provider: r.id_provider.clone(),
            api_base_url: r.api_base_url.clone(),
            oidc_token_endpoint: r.oidc_token_endpoint.clone(),
            target_api: r.target_api.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(driver: &str) -> DriverSettings {
        DriverSettings {
            driver: driver.into(),
            json: "/etc/storage/groups.json".into(),
            cache_expiration: 5,
            ..Default::default()
        }
    }

    #[test]
    fn ldap_groups_carry_group_filters_only() {
        let spec = settings("ldap").resolve(Capability::Groups).unwrap();
        let DriverSpec::Ldap(p) = spec else {
            panic!("expected ldap");
        };
        assert_eq!(p.hostname, "localhost");
        assert_eq!(p.port, 9126);
        assert_eq!(p.bind_username, "cn=reva,ou=sysusers,dc=example,dc=org");
        assert!(p.memberfilter.is_some());
        assert!(p.loginfilter.is_none());
        assert_eq!(p.schema.gid.as_deref(), Some("ownclouduuid"));
        assert_eq!(p.schema.gid_number.as_deref(), Some("gidnumber"));
        assert!(p.schema.uid.is_none());
    }

    #[test]
    fn rest_cache_ttl_follows_capability() {
        let DriverSpec::Rest(users) = settings("rest").resolve(Capability::Users).unwrap() else {
            panic!("expected rest");
        };
        assert_eq!(users.user_groups_cache_expiration, Some(5));
        assert_eq!(users.group_members_cache_expiration, None);

        let DriverSpec::Rest(groups) = settings("rest").resolve(Capability::Groups).unwrap()
        else {
            panic!("expected rest");
        };
        assert_eq!(groups.group_members_cache_expiration, Some(5));
        assert_eq!(groups.redis_address, "localhost:6379");
    }

    #[test]
    fn every_accepted_name_resolves_to_itself() {
        for cap in [
            Capability::Users,
            Capability::Groups,
            Capability::Auth,
            Capability::Registry,
        ] {
            for name in cap.drivers() {
                let spec = settings(name).resolve(cap).unwrap();
                assert_eq!(spec.name(), *name, "{cap}/{name}");
            }
        }
    }

    #[test]
    fn names_outside_the_set_are_rejected() {
        for (cap, name) in [
            (Capability::Groups, "nis"),
            (Capability::Groups, "demo"),
            (Capability::Auth, "rest"),
            (Capability::Registry, "json"),
            (Capability::Users, "LDAP"),
            (Capability::Users, ""),
        ] {
            match settings(name).resolve(cap) {
                Err(ConfigError::UnknownDriver {
                    capability,
                    driver,
                    expected,
                }) => {
                    assert_eq!(capability, cap.as_str());
                    assert_eq!(driver, name);
                    assert_eq!(expected, cap.drivers());
                }
                other => panic!("{cap}/{name}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn only_the_selected_driver_is_serialized() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            drivers: DriverSpec,
        }

        let spec = settings("json").resolve(Capability::Groups).unwrap();
        let text = toml::to_string(&Wrapper {
            drivers: spec.clone(),
        })
        .unwrap();
        assert!(text.contains("[drivers.json]"), "{text}");
        assert!(text.contains("groups = \"/etc/storage/groups.json\""), "{text}");
        assert!(!text.contains("ldap"), "{text}");

        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.drivers, spec);
    }
}
