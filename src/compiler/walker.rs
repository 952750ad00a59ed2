//! Topology Walker
//!
//! Visits every replica of an installation in cluster → shard → replica
//! order. The whole topology is validated before the first visit, so a
//! malformed installation never yields a partial result.

use crate::crd::{ChiCluster, ChiReplica, ChiShard, ClickHouseInstallation, ReplicaAddress};
use crate::error::{Error, Result};

/// A replica together with its enclosing cluster and shard
#[derive(Debug, Clone, Copy)]
pub struct ReplicaRef<'a> {
    pub cluster: &'a ChiCluster,
    pub shard: &'a ChiShard,
    pub replica: &'a ChiReplica,
    pub address: &'a ReplicaAddress,
}

/// All replicas of `chi` in traversal order
///
/// Fails on the first cluster without shards, shard without replicas or
/// replica without address. Clusters only carry shards once normalized.
pub fn replicas(chi: &ClickHouseInstallation) -> Result<Vec<ReplicaRef<'_>>> {
    let mut refs = Vec::with_capacity(chi.replica_count());

    for (cluster_index, cluster) in chi.spec.configuration.clusters.iter().enumerate() {
        if cluster.layout.shards.is_empty() {
            return Err(Error::EmptyCluster {
                cluster: cluster_index,
            });
        }

        for (shard_index, shard) in cluster.layout.shards.iter().enumerate() {
            if shard.replicas.is_empty() {
                return Err(Error::EmptyShard {
                    cluster: cluster_index,
                    shard: shard_index,
                });
            }

            for (replica_index, replica) in shard.replicas.iter().enumerate() {
                let address = replica.address.as_ref().ok_or(Error::MissingReplicaAddress {
                    cluster: cluster_index,
                    shard: shard_index,
                    replica: replica_index,
                })?;
                refs.push(ReplicaRef {
                    cluster,
                    shard,
                    replica,
                    address,
                });
            }
        }
    }

    Ok(refs)
}

/// Apply `visit` to every replica and collect the results
///
/// Stops at and returns the first error, whether from validation or from
/// the visitor.
pub fn walk_replicas<'a, T, F>(chi: &'a ClickHouseInstallation, visit: F) -> Result<Vec<T>>
where
    F: FnMut(ReplicaRef<'a>) -> Result<T>,
{
    replicas(chi)?.into_iter().map(visit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{normalize, ChiLayout, ClickHouseInstallationSpec};
    use assert_matches::assert_matches;

    fn installation(layouts: &[(u32, u32)]) -> ClickHouseInstallation {
        let mut spec = ClickHouseInstallationSpec::default();
        spec.configuration.clusters = layouts
            .iter()
            .enumerate()
            .map(|(i, &(shards, replicas))| ChiCluster {
                name: format!("cluster-{}", i),
                layout: ChiLayout {
                    shards_count: Some(shards),
                    replicas_count: Some(replicas),
                    shards: vec![],
                },
                ..Default::default()
            })
            .collect();
        let chi = ClickHouseInstallation::new("demo", spec);
        normalize(&chi, "ns1").unwrap()
    }

    #[test]
    fn test_visits_every_replica_in_order() {
        let chi = installation(&[(2, 2), (1, 3)]);

        let visited = walk_replicas(&chi, |r| {
            Ok((
                r.address.cluster_index,
                r.address.shard_index,
                r.address.replica_index,
            ))
        })
        .unwrap();

        assert_eq!(
            visited,
            vec![
                (0, 0, 0),
                (0, 0, 1),
                (0, 1, 0),
                (0, 1, 1),
                (1, 0, 0),
                (1, 0, 1),
                (1, 0, 2),
            ]
        );
    }

    #[test]
    fn test_refs_carry_context() {
        let chi = installation(&[(1, 1), (1, 1)]);
        let refs = replicas(&chi).unwrap();
        assert_eq!(refs[1].cluster.name, "cluster-1");
        assert_eq!(refs[1].address.cluster_name, "cluster-1");
    }

    #[test]
    fn test_no_clusters_is_empty() {
        let chi = ClickHouseInstallation::new("demo", ClickHouseInstallationSpec::default());
        assert!(replicas(&chi).unwrap().is_empty());
    }

    #[test]
    fn test_unexpanded_layout_rejected() {
        let mut chi = installation(&[(1, 1), (2, 2)]);
        let layout = &mut chi.spec.configuration.clusters[1].layout;
        layout.shards.clear();

        let mut visits = 0;
        let result = walk_replicas(&chi, |_| {
            visits += 1;
            Ok(())
        });

        assert_matches!(result, Err(Error::EmptyCluster { cluster: 1 }));
        assert_eq!(visits, 0);
    }

    #[test]
    fn test_zero_shards_rejected() {
        let chi = installation(&[(0, 1)]);
        assert_matches!(replicas(&chi), Err(Error::EmptyCluster { cluster: 0 }));
    }

    #[test]
    fn test_empty_shard_rejected() {
        let mut chi = installation(&[(1, 1), (2, 1)]);
        chi.spec.configuration.clusters[1].layout.shards[1].replicas.clear();

        assert_matches!(
            replicas(&chi),
            Err(Error::EmptyShard {
                cluster: 1,
                shard: 1
            })
        );
    }

    #[test]
    fn test_missing_address_rejected() {
        let mut chi = installation(&[(1, 2)]);
        chi.spec.configuration.clusters[0].layout.shards[0].replicas[1].address = None;

        let mut visits = 0;
        let result = walk_replicas(&chi, |_| {
            visits += 1;
            Ok(())
        });

        assert_matches!(
            result,
            Err(Error::MissingReplicaAddress {
                cluster: 0,
                shard: 0,
                replica: 1
            })
        );
        assert_eq!(visits, 0);
    }

    #[test]
    fn test_visitor_failure_stops_walk() {
        let chi = installation(&[(3, 1)]);

        let mut visits = 0;
        let result = walk_replicas(&chi, |r| {
            visits += 1;
            if r.address.shard_index == 1 {
                Err(Error::Internal("visitor failed".into()))
            } else {
                Ok(())
            }
        });

        assert_matches!(result, Err(Error::Internal(msg)) if msg == "visitor failed");
        assert_eq!(visits, 2);
    }
}
