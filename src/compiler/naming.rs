//! Resource Naming
//!
//! Derives every generated object name, hostname and domain from an
//! installation name or a replica address, using the patterns in
//! [`NamingConfig`].

use crate::config::NamingConfig;
use crate::crd::ReplicaAddress;

/// Name generator over a set of patterns
#[derive(Debug, Clone, Copy)]
pub struct Namer<'a> {
    patterns: &'a NamingConfig,
}

impl<'a> Namer<'a> {
    pub fn new(patterns: &'a NamingConfig) -> Self {
        Self { patterns }
    }

    /// ConfigMap holding the macros of one replica
    pub fn macros_config_map(&self, address: &ReplicaAddress) -> String {
        render_replica(&self.patterns.macros_config_map, address)
    }

    /// ConfigMap shared by all replicas (remote servers, zookeeper, ...)
    pub fn common_config_map(&self, chi_name: &str) -> String {
        render(&self.patterns.common_config_map, &[("{chi}", chi_name)])
    }

    /// ConfigMap shared by all replicas (users, quotas, profiles)
    pub fn common_users_config_map(&self, chi_name: &str) -> String {
        render(&self.patterns.common_users_config_map, &[("{chi}", chi_name)])
    }

    /// Service fronting the whole installation
    pub fn installation_service(&self, chi_name: &str) -> String {
        render(&self.patterns.installation_service, &[("{chi}", chi_name)])
    }

    pub fn stateful_set(&self, address: &ReplicaAddress) -> String {
        render_replica(&self.patterns.stateful_set, address)
    }

    /// Headless service governing one StatefulSet
    pub fn stateful_set_service(&self, address: &ReplicaAddress) -> String {
        render_replica(&self.patterns.stateful_set_service, address)
    }

    pub fn pod_hostname(&self, address: &ReplicaAddress) -> String {
        render_replica(&self.patterns.pod_hostname, address)
    }

    /// e.g. `.my-dev-namespace.svc.cluster.local`
    pub fn namespace_domain(&self, namespace: &str) -> String {
        render(&self.patterns.namespace_domain, &[("{namespace}", namespace)])
    }

    /// e.g. `chi-demo-0-0-1.my-dev-namespace.svc.cluster.local`
    pub fn pod_fqdn(&self, address: &ReplicaAddress) -> String {
        self.pod_hostname(address) + &self.namespace_domain(&address.namespace)
    }
}

fn render_replica(pattern: &str, address: &ReplicaAddress) -> String {
    let cluster = address.cluster_index.to_string();
    let shard = address.shard_index.to_string();
    let replica = address.replica_index.to_string();
    render(
        pattern,
        &[
            ("{chi}", address.chi_name.as_str()),
            ("{cluster}", cluster.as_str()),
            ("{shard}", shard.as_str()),
            ("{replica}", replica.as_str()),
            ("{namespace}", address.namespace.as_str()),
        ],
    )
}

fn render(pattern: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(pattern.to_string(), |name, (placeholder, value)| {
            name.replace(placeholder, value)
        })
}
