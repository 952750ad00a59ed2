//! ClickHouseInstallation CRD
//!
//! Declarative description of a ClickHouse deployment: clusters made of
//! shards made of replicas, plus a catalog of named pod and volume claim
//! templates the replicas refer to.

use k8s_openapi::api::core::v1::{Container, PersistentVolumeClaim, Volume};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ClickHouseInstallation CRD
// =============================================================================

/// ClickHouseInstallation describes one ClickHouse deployment and the
/// templates used to build its pods and volumes.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "clickhouse.altinity.com",
    version = "v1",
    kind = "ClickHouseInstallation",
    plural = "clickhouseinstallations",
    shortname = "chi",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClickHouseInstallationSpec {
    /// Installation-wide defaults inherited by every replica
    #[serde(default)]
    pub defaults: ChiDefaults,

    /// ClickHouse configuration and cluster topology
    #[serde(default)]
    pub configuration: ChiConfiguration,

    /// Named templates referenced by replicas
    #[serde(default)]
    pub templates: ChiTemplates,
}

impl ClickHouseInstallation {
    /// Namespace of the installation, or `fallback` when unset
    pub fn namespace_or(&self, fallback: &str) -> String {
        self.namespace().unwrap_or_else(|| fallback.to_string())
    }

    /// Total number of replicas across all clusters and shards
    pub fn replica_count(&self) -> usize {
        self.spec
            .configuration
            .clusters
            .iter()
            .flat_map(|cluster| cluster.layout.shards.iter())
            .map(|shard| shard.replicas.len())
            .sum()
    }
}

// =============================================================================
// Defaults and Deployment
// =============================================================================

/// Installation-wide defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiDefaults {
    #[serde(default)]
    pub deployment: ChiDeployment,
}

/// Which templates a replica is built from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiDeployment {
    /// Name of a pod template from `templates.podTemplates`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<String>,

    /// Name of a volume claim template from `templates.volumeClaimTemplates`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_template: Option<String>,
}

impl ChiDeployment {
    /// Fill unset template names from `parent`
    pub fn inherit(&self, parent: &ChiDeployment) -> ChiDeployment {
        ChiDeployment {
            pod_template: self
                .pod_template
                .clone()
                .or_else(|| parent.pod_template.clone()),
            volume_claim_template: self
                .volume_claim_template
                .clone()
                .or_else(|| parent.volume_claim_template.clone()),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// ClickHouse configuration sections and topology
///
/// `users`, `profiles`, `quotas` and `settings` map slash-separated XML
/// paths (e.g. `default/networks/ip`) to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiConfiguration {
    #[serde(default)]
    pub zookeeper: ChiZookeeperConfig,

    #[serde(default)]
    pub users: BTreeMap<String, String>,

    #[serde(default)]
    pub profiles: BTreeMap<String, String>,

    #[serde(default)]
    pub quotas: BTreeMap<String, String>,

    #[serde(default)]
    pub settings: BTreeMap<String, String>,

    #[serde(default)]
    pub clusters: Vec<ChiCluster>,
}

/// Coordination service endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiZookeeperConfig {
    #[serde(default)]
    pub nodes: Vec<ChiZookeeperNode>,
}

/// A single coordination service node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiZookeeperNode {
    pub host: String,

    #[serde(default = "default_zookeeper_port")]
    pub port: u16,
}

// =============================================================================
// Topology
// =============================================================================

/// A named ClickHouse cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiCluster {
    pub name: String,

    /// Defaults for every replica of the cluster
    #[serde(default)]
    pub deployment: ChiDeployment,

    #[serde(default)]
    pub layout: ChiLayout,
}

/// Shard layout of a cluster
///
/// Either explicit `shards`, or `shardsCount` generated shards of
/// `replicasCount` replicas each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shards: Vec<ChiShard>,
}

/// A shard of a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiShard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas_count: Option<u32>,

    /// Emitted into remote_servers as `internal_replication`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_replication: Option<bool>,

    /// Emitted into remote_servers as `weight`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,

    #[serde(default)]
    pub deployment: ChiDeployment,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<ChiReplica>,
}

/// A single replica, the unit that becomes one StatefulSet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiReplica {
    #[serde(default)]
    pub deployment: ChiDeployment,

    /// Populated by normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub address: Option<ReplicaAddress>,
}

/// Position of a replica within its installation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaAddress {
    pub namespace: String,
    pub chi_name: String,
    pub cluster_name: String,
    pub cluster_index: usize,
    pub shard_index: usize,
    pub replica_index: usize,
}

impl std::fmt::Display for ReplicaAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}-{}-{}",
            self.namespace, self.chi_name, self.cluster_index, self.shard_index, self.replica_index
        )
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Template catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiTemplates {
    #[serde(default)]
    pub pod_templates: Vec<ChiPodTemplate>,

    #[serde(default)]
    pub volume_claim_templates: Vec<ChiVolumeClaimTemplate>,
}

/// Containers and volumes seeding a replica's pod
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiPodTemplate {
    pub name: String,

    #[serde(default)]
    pub containers: Vec<Container>,

    #[serde(default)]
    pub volumes: Vec<Volume>,
}

/// Persistent volume claim attached to a replica's StatefulSet
///
/// A claim named `USE_DEFAULT_NAME` is renamed to the default data volume
/// and mounted at the ClickHouse data directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChiVolumeClaimTemplate {
    pub name: String,

    pub persistent_volume_claim: PersistentVolumeClaim,
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_zookeeper_port() -> u16 {
    2181
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r#"
apiVersion: clickhouse.altinity.com/v1
kind: ClickHouseInstallation
metadata:
  name: demo
  namespace: ns1
spec:
  defaults:
    deployment:
      podTemplate: clickhouse-v18
  configuration:
    zookeeper:
      nodes:
        - host: zookeeper-0.zookeepers
    settings:
      compression/case/method: zstd
    clusters:
      - name: replicated
        layout:
          shardsCount: 2
          replicasCount: 2
  templates:
    podTemplates:
      - name: clickhouse-v18
        containers:
          - name: clickhouse
            image: yandex/clickhouse-server:18.16.2
    volumeClaimTemplates:
      - name: default
        persistentVolumeClaim:
          metadata:
            name: USE_DEFAULT_NAME
          spec:
            accessModes: [ReadWriteOnce]
            resources:
              requests:
                storage: 1Gi
"#;

    #[test]
    fn test_parse_installation() {
        let chi: ClickHouseInstallation = serde_yaml::from_str(DEMO).unwrap();

        assert_eq!(chi.name_any(), "demo");
        assert_eq!(chi.namespace_or("default"), "ns1");
        assert_eq!(
            chi.spec.defaults.deployment.pod_template.as_deref(),
            Some("clickhouse-v18")
        );

        let zk = &chi.spec.configuration.zookeeper.nodes[0];
        assert_eq!(zk.host, "zookeeper-0.zookeepers");
        assert_eq!(zk.port, 2181);

        let cluster = &chi.spec.configuration.clusters[0];
        assert_eq!(cluster.layout.shards_count, Some(2));
        assert!(cluster.layout.shards.is_empty());

        let vct = &chi.spec.templates.volume_claim_templates[0];
        assert_eq!(
            vct.persistent_volume_claim.metadata.name.as_deref(),
            Some("USE_DEFAULT_NAME")
        );
        assert_eq!(chi.spec.templates.pod_templates[0].containers[0].name, "clickhouse");
    }

    #[test]
    fn test_namespace_fallback() {
        let chi = ClickHouseInstallation::new("demo", ClickHouseInstallationSpec::default());
        assert_eq!(chi.namespace_or("default"), "default");
        assert_eq!(chi.replica_count(), 0);
    }

    #[test]
    fn test_deployment_inherit() {
        let replica = ChiDeployment {
            pod_template: Some("own".into()),
            volume_claim_template: None,
        };
        let parent = ChiDeployment {
            pod_template: Some("parent".into()),
            volume_claim_template: Some("parent-vc".into()),
        };

        let merged = replica.inherit(&parent);
        assert_eq!(merged.pod_template.as_deref(), Some("own"));
        assert_eq!(merged.volume_claim_template.as_deref(), Some("parent-vc"));
    }

    #[test]
    fn test_address_display() {
        let address = ReplicaAddress {
            namespace: "ns1".into(),
            chi_name: "demo".into(),
            cluster_name: "c".into(),
            cluster_index: 0,
            shard_index: 1,
            replica_index: 2,
        };
        assert_eq!(address.to_string(), "ns1/demo/0-1-2");
    }
}
