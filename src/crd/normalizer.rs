//! Installation Normalizer
//!
//! Expands shard/replica counts into explicit shards and replicas, resolves
//! template inheritance and stamps every replica with its address. The
//! input is never modified; a normalized copy is returned.

use crate::crd::installation::{
    ChiCluster, ChiDeployment, ChiReplica, ChiShard, ClickHouseInstallation, ReplicaAddress,
};
use crate::error::{Error, Result};
use kube::ResourceExt;
use std::collections::BTreeSet;
use tracing::debug;

/// Shards generated for a cluster without explicit shards or `shardsCount`
const DEFAULT_SHARDS_COUNT: u32 = 1;

/// Replicas generated for a shard without explicit replicas or `replicasCount`
const DEFAULT_REPLICAS_COUNT: u32 = 1;

/// Return a normalized copy of `chi`
///
/// `fallback_namespace` is used for replica addresses when the
/// installation carries no namespace.
pub fn normalize(
    chi: &ClickHouseInstallation,
    fallback_namespace: &str,
) -> Result<ClickHouseInstallation> {
    let mut normalized = chi.clone();
    let namespace = chi.namespace_or(fallback_namespace);
    let chi_name = chi.name_any();
    let defaults = chi.spec.defaults.deployment.clone();

    let mut seen = BTreeSet::new();
    for cluster in &chi.spec.configuration.clusters {
        if !seen.insert(cluster.name.as_str()) {
            return Err(Error::DuplicateClusterName {
                name: cluster.name.clone(),
            });
        }
    }

    for (cluster_index, cluster) in normalized
        .spec
        .configuration
        .clusters
        .iter_mut()
        .enumerate()
    {
        let cluster_deployment = cluster.deployment.inherit(&defaults);
        expand_shards(cluster);

        let layout_replicas = cluster.layout.replicas_count;
        for (shard_index, shard) in cluster.layout.shards.iter_mut().enumerate() {
            let shard_deployment = shard.deployment.inherit(&cluster_deployment);
            expand_replicas(shard, layout_replicas);

            for (replica_index, replica) in shard.replicas.iter_mut().enumerate() {
                replica.deployment = replica.deployment.inherit(&shard_deployment);
                replica.address = Some(ReplicaAddress {
                    namespace: namespace.clone(),
                    chi_name: chi_name.clone(),
                    cluster_name: cluster.name.clone(),
                    cluster_index,
                    shard_index,
                    replica_index,
                });
            }
        }

        debug!(
            cluster = %cluster.name,
            shards = cluster.layout.shards.len(),
            "Normalized cluster layout"
        );
    }

    Ok(normalized)
}

fn expand_shards(cluster: &mut ChiCluster) {
    if !cluster.layout.shards.is_empty() {
        return;
    }
    let count = cluster.layout.shards_count.unwrap_or(DEFAULT_SHARDS_COUNT);
    cluster.layout.shards = (0..count).map(|_| ChiShard::default()).collect();
}

fn expand_replicas(shard: &mut ChiShard, layout_replicas: Option<u32>) {
    if !shard.replicas.is_empty() {
        return;
    }
    // an explicit zero is kept so compilation can reject the empty shard
    let count = shard
        .replicas_count
        .or(layout_replicas)
        .unwrap_or(DEFAULT_REPLICAS_COUNT);
    shard.replicas = (0..count)
        .map(|_| ChiReplica {
            deployment: ChiDeployment::default(),
            address: None,
        })
        .collect();
}
