//! Compiler Configuration
//!
//! Every fixed name pattern, port, path and label used while generating
//! manifests lives here, so alternate naming schemes can be swapped in
//! without touching the assemblers. All sections deserialize with defaults,
//! so a partial YAML file only overrides what it names.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholders every per-replica pattern must carry to stay unique per replica
pub const REPLICA_COORDINATES: [&str; 4] = ["{chi}", "{cluster}", "{shard}", "{replica}"];

/// Placeholders rendered as decimal indices
const INDEX_PLACEHOLDERS: [&str; 3] = ["{cluster}", "{shard}", "{replica}"];

/// Placeholders constant within one installation
const CONSTANT_PLACEHOLDERS: [&str; 2] = ["{chi}", "{namespace}"];

// =============================================================================
// Compiler Configuration
// =============================================================================

/// Configuration for the manifest compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Resource name patterns
    pub naming: NamingConfig,
    /// ClickHouse ports exposed by services and default containers
    pub ports: PortConfig,
    /// Mount paths inside the ClickHouse container
    pub paths: PathConfig,
    /// Config file names used as ConfigMap keys
    pub files: FileNames,
    /// Label keys stamped on generated objects
    pub labels: LabelConfig,
    /// Fallback values for templates and services
    pub defaults: DefaultsConfig,
    /// Namespace used when the installation carries none
    pub default_namespace: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            naming: NamingConfig::default(),
            ports: PortConfig::default(),
            paths: PathConfig::default(),
            files: FileNames::default(),
            labels: LabelConfig::default(),
            defaults: DefaultsConfig::default(),
            default_namespace: "default".into(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that would produce ambiguous output
    pub fn validate(&self) -> Result<()> {
        self.naming.validate()?;

        if self.defaults.image.is_empty() {
            return Err(Error::Configuration("default image must not be empty".into()));
        }
        if self.defaults.data_volume_name.is_empty() {
            return Err(Error::Configuration(
                "default data volume name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Naming
// =============================================================================

/// Name patterns
///
/// Placeholders: `{chi}`, `{cluster}`, `{shard}`, `{replica}` and
/// `{namespace}`. A pod FQDN is the pod hostname followed by the namespace
/// domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NamingConfig {
    pub macros_config_map: String,
    pub common_config_map: String,
    pub common_users_config_map: String,
    pub installation_service: String,
    pub stateful_set: String,
    pub stateful_set_service: String,
    pub pod_hostname: String,
    pub namespace_domain: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            macros_config_map: "chi-{chi}-deploy-confd-{cluster}-{shard}-{replica}".into(),
            common_config_map: "{chi}-common-configd".into(),
            common_users_config_map: "{chi}-common-usersd".into(),
            installation_service: "{chi}".into(),
            stateful_set: "chi-{chi}-{cluster}-{shard}-{replica}".into(),
            stateful_set_service: "chi-{chi}-{cluster}-{shard}-{replica}".into(),
            pod_hostname: "chi-{chi}-{cluster}-{shard}-{replica}".into(),
            namespace_domain: ".{namespace}.svc.cluster.local".into(),
        }
    }
}

impl NamingConfig {
    /// Reject patterns that cannot tell replicas apart
    pub fn validate(&self) -> Result<()> {
        let per_replica = [
            ("macrosConfigMap", &self.macros_config_map),
            ("statefulSet", &self.stateful_set),
            ("statefulSetService", &self.stateful_set_service),
            ("podHostname", &self.pod_hostname),
        ];
        for (field, pattern) in per_replica {
            if let Some(missing) = REPLICA_COORDINATES.iter().find(|p| !pattern.contains(*p)) {
                return Err(Error::Configuration(format!(
                    "naming.{} pattern '{}' is missing placeholder {}",
                    field, pattern, missing
                )));
            }
            if !indices_separated(pattern) {
                return Err(Error::Configuration(format!(
                    "naming.{} pattern '{}' needs a non-digit separator between index placeholders",
                    field, pattern
                )));
            }
        }

        let per_installation = [
            ("commonConfigMap", &self.common_config_map),
            ("commonUsersConfigMap", &self.common_users_config_map),
            ("installationService", &self.installation_service),
        ];
        for (field, pattern) in per_installation {
            if !pattern.contains("{chi}") {
                return Err(Error::Configuration(format!(
                    "naming.{} pattern '{}' is missing placeholder {{chi}}",
                    field, pattern
                )));
            }
        }

        if !self.namespace_domain.contains("{namespace}") {
            return Err(Error::Configuration(format!(
                "naming.namespaceDomain pattern '{}' is missing placeholder {{namespace}}",
                self.namespace_domain
            )));
        }
        Ok(())
    }
}

/// Whether the literal text between every two consecutive index
/// placeholders holds a non-digit, so indices (1, 11) and (11, 1) never
/// render alike
fn indices_separated(pattern: &str) -> bool {
    let mut positions: Vec<(usize, usize)> = INDEX_PLACEHOLDERS
        .iter()
        .flat_map(|placeholder| {
            pattern
                .match_indices(placeholder)
                .map(|(start, found)| (start, start + found.len()))
        })
        .collect();
    positions.sort_unstable();

    positions.windows(2).all(|pair| {
        let literal = CONSTANT_PLACEHOLDERS
            .iter()
            .fold(pattern[pair[0].1..pair[1].0].to_string(), |text, placeholder| {
                text.replace(placeholder, "")
            });
        literal.chars().any(|c| !c.is_ascii_digit())
    })
}

// =============================================================================
// Ports
// =============================================================================

/// A named TCP port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPort {
    pub name: String,
    pub number: i32,
}

impl NamedPort {
    pub fn new(name: impl Into<String>, number: i32) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }
}

/// Fixed port triple shared by services and the default container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortConfig {
    /// HTTP query interface
    pub http: NamedPort,
    /// Native client protocol
    pub client: NamedPort,
    /// Inter-node replication
    pub interserver: NamedPort,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            http: NamedPort::new("http", 8123),
            client: NamedPort::new("client", 9000),
            interserver: NamedPort::new("interserver", 9009),
        }
    }
}

impl PortConfig {
    /// Ports in the order they are exposed
    pub fn all(&self) -> [&NamedPort; 3] {
        [&self.http, &self.client, &self.interserver]
    }
}

// =============================================================================
// Paths and Files
// =============================================================================

/// Mount paths inside the ClickHouse container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathConfig {
    /// Common config bundle
    pub config_d: String,
    /// Common users bundle
    pub users_d: String,
    /// Per-host macros bundle
    pub conf_d: String,
    /// ClickHouse data directory
    pub data: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            config_d: "/etc/clickhouse-server/config.d/".into(),
            users_d: "/etc/clickhouse-server/users.d/".into(),
            conf_d: "/etc/clickhouse-server/conf.d/".into(),
            data: "/var/lib/clickhouse".into(),
        }
    }
}

/// Config file names, used as ConfigMap data keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileNames {
    pub remote_servers: String,
    pub zookeeper: String,
    pub settings: String,
    pub listen: String,
    pub users: String,
    pub quotas: String,
    pub profiles: String,
    pub macros: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            remote_servers: "remote_servers.xml".into(),
            zookeeper: "zookeeper.xml".into(),
            settings: "settings.xml".into(),
            listen: "listen.xml".into(),
            users: "users.xml".into(),
            quotas: "quotas.xml".into(),
            profiles: "profiles.xml".into(),
            macros: "macros.xml".into(),
        }
    }
}

// =============================================================================
// Labels
// =============================================================================

/// Label keys stamped on generated objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelConfig {
    /// Marks objects as operator-generated
    pub operator: String,
    /// Binds objects to their installation
    pub installation: String,
    /// Selects the single pod of one StatefulSet
    pub app: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            operator: "clickhouse.altinity.com/chop".into(),
            installation: "clickhouse.altinity.com/chi".into(),
            app: "clickhouse.altinity.com/app".into(),
        }
    }
}

impl LabelConfig {
    /// Labels identifying an object as generated for `chi_name`
    pub fn generated(&self, chi_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (self.operator.clone(), chi_name.to_string()),
            (self.installation.clone(), chi_name.to_string()),
        ])
    }

    /// Selector matching every pod of an installation
    pub fn installation_selector(&self, chi_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(self.installation.clone(), chi_name.to_string())])
    }

    /// Selector matching the pod of one StatefulSet
    pub fn app_selector(&self, stateful_set_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(self.app.clone(), stateful_set_name.to_string())])
    }
}

// =============================================================================
// Defaults
// =============================================================================

/// Fallback values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaultsConfig {
    /// Image of the synthesized container when no pod template resolves
    pub image: String,
    /// Claim and mount name for the ClickHouse data volume
    pub data_volume_name: String,
    /// Claim name marking a volume claim template for default naming
    pub default_claim_name_marker: String,
    /// Cluster IP of per-replica services
    pub replica_service_cluster_ip: String,
    /// Type of the per-replica services
    pub replica_service_type: String,
    /// Type of the installation-wide service
    pub installation_service_type: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            image: "yandex/clickhouse-server:latest".into(),
            data_volume_name: "clickhouse-data".into(),
            default_claim_name_marker: "USE_DEFAULT_NAME".into(),
            replica_service_cluster_ip: "None".into(),
            replica_service_type: "ClusterIP".into(),
            installation_service_type: "LoadBalancer".into(),
        }
    }
}
