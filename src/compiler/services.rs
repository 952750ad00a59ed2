//! Service Assembly
//!
//! One predictably-named service gives access to the whole installation,
//! and one headless service per replica addresses each StatefulSet's pod
//! directly:
//!
//! ```text
//! NAME              TYPE           CLUSTER-IP   PORT(S)
//! demo              LoadBalancer   10.0.0.17    8123/TCP,9000/TCP,9009/TCP
//! chi-demo-0-0-0    ClusterIP      None         8123/TCP,9000/TCP,9009/TCP
//! ```

use crate::compiler::walker::ReplicaRef;
use crate::compiler::CompileContext;
use crate::config::PortConfig;
use crate::error::Result;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

/// Installation-wide service followed by one service per replica
pub fn build_services(ctx: &CompileContext<'_>) -> Result<Vec<Service>> {
    let mut services = vec![installation_service(ctx)];
    services.extend(ctx.walk_replicas(|replica| {
        Ok(replica_service(ctx, &replica))
    })?);
    Ok(services)
}

fn installation_service(ctx: &CompileContext<'_>) -> Service {
    let name = ctx.namer.installation_service(&ctx.chi_name);
    let labels = &ctx.config.labels;
    debug!(service = %name, "Generated installation Service");

    Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(labels.generated(&ctx.chi_name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(service_ports(&ctx.config.ports)),
            selector: Some(labels.installation_selector(&ctx.chi_name)),
            type_: Some(ctx.config.defaults.installation_service_type.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn replica_service(ctx: &CompileContext<'_>, replica: &ReplicaRef<'_>) -> Service {
    let name = ctx.namer.stateful_set_service(replica.address);
    let stateful_set_name = ctx.namer.stateful_set(replica.address);
    let defaults = &ctx.config.defaults;
    debug!(service = %name, stateful_set = %stateful_set_name, "Generated replica Service");

    Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(replica.address.namespace.clone()),
            labels: Some(ctx.config.labels.generated(&ctx.chi_name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(service_ports(&ctx.config.ports)),
            selector: Some(ctx.config.labels.app_selector(&stateful_set_name)),
            cluster_ip: Some(defaults.replica_service_cluster_ip.clone()),
            type_: Some(defaults.replica_service_type.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn service_ports(ports: &PortConfig) -> Vec<ServicePort> {
    ports
        .all()
        .into_iter()
        .map(|port| ServicePort {
            name: Some(port.name.clone()),
            port: port.number,
            ..Default::default()
        })
        .collect()
}
