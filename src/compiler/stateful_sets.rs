//! StatefulSet Assembly
//!
//! Every replica becomes a single-pod StatefulSet built in three steps:
//! 1. Resolve the pod template, falling back to a default one
//! 2. Mount the three config bundles into every container
//! 3. Attach the volume claim template, if one resolves

use crate::compiler::walker::ReplicaRef;
use crate::compiler::CompileContext;
use crate::config::CompilerConfig;
use crate::crd::ChiPodTemplate;
use crate::error::Result;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, PersistentVolumeClaim, PodSpec,
    PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tracing::{debug, warn};

/// One StatefulSet per replica, in traversal order
pub fn build_stateful_sets(ctx: &CompileContext<'_>) -> Result<Vec<StatefulSet>> {
    ctx.walk_replicas(|replica| Ok(stateful_set(ctx, &replica)))
}

/// Single ClickHouse container named `name`, default image, all ports
pub fn default_pod_template(name: &str, config: &CompilerConfig) -> ChiPodTemplate {
    let ports = config
        .ports
        .all()
        .into_iter()
        .map(|port| ContainerPort {
            name: Some(port.name.clone()),
            container_port: port.number,
            ..Default::default()
        })
        .collect();

    ChiPodTemplate {
        name: name.to_string(),
        containers: vec![Container {
            name: name.to_string(),
            image: Some(config.defaults.image.clone()),
            ports: Some(ports),
            ..Default::default()
        }],
        volumes: vec![],
    }
}

fn stateful_set(ctx: &CompileContext<'_>, replica: &ReplicaRef<'_>) -> StatefulSet {
    let name = ctx.namer.stateful_set(replica.address);
    let labels = &ctx.config.labels;

    let mut pod_labels = labels.app_selector(&name);
    pod_labels.extend(labels.generated(&ctx.chi_name));

    let mut pod_spec = resolve_pod_spec(ctx, replica, &name);
    mount_config_maps(ctx, replica, &mut pod_spec);
    let volume_claim_templates = attach_volume_claim(ctx, replica, &name, &mut pod_spec);

    debug!(
        stateful_set = %name,
        containers = pod_spec.containers.len(),
        volume_claim = volume_claim_templates.is_some(),
        "Generated StatefulSet"
    );

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(replica.address.namespace.clone()),
            labels: Some(labels.generated(&ctx.chi_name)),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: ctx.namer.stateful_set_service(replica.address),
            selector: LabelSelector {
                match_labels: Some(labels.app_selector(&name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(name),
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            volume_claim_templates,
            ..Default::default()
        }),
        ..Default::default()
    }
}

// =============================================================================
// Pod Template
// =============================================================================

fn resolve_pod_spec(ctx: &CompileContext<'_>, replica: &ReplicaRef<'_>, name: &str) -> PodSpec {
    let requested = replica.replica.deployment.pod_template.as_deref();

    let template = match ctx.templates.pod_template(requested) {
        Some(template) => {
            debug!(stateful_set = %name, template = %template.name, "Using pod template");
            template.clone()
        }
        None => {
            match requested {
                Some(template) => warn!(
                    stateful_set = %name,
                    template = %template,
                    "Unknown pod template, using default"
                ),
                None => debug!(stateful_set = %name, "No pod template, using default"),
            }
            default_pod_template(name, ctx.config)
        }
    };

    PodSpec {
        containers: template.containers,
        volumes: Some(template.volumes),
        ..Default::default()
    }
}

// =============================================================================
// Config Mounts
// =============================================================================

fn mount_config_maps(ctx: &CompileContext<'_>, replica: &ReplicaRef<'_>, pod_spec: &mut PodSpec) {
    let paths = &ctx.config.paths;
    let bundles = [
        (ctx.namer.common_config_map(&ctx.chi_name), &paths.config_d),
        (ctx.namer.common_users_config_map(&ctx.chi_name), &paths.users_d),
        (ctx.namer.macros_config_map(replica.address), &paths.conf_d),
    ];

    for container in &mut pod_spec.containers {
        let mounts = container.volume_mounts.get_or_insert_with(Vec::new);
        mounts.extend(
            bundles
                .iter()
                .map(|(config_map, path)| volume_mount(config_map, path)),
        );
    }

    pod_spec
        .volumes
        .get_or_insert_with(Vec::new)
        .extend(bundles.iter().map(|(config_map, _)| Volume {
            name: config_map.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(config_map.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }));
}

fn volume_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

// =============================================================================
// Volume Claim
// =============================================================================

fn attach_volume_claim(
    ctx: &CompileContext<'_>,
    replica: &ReplicaRef<'_>,
    name: &str,
    pod_spec: &mut PodSpec,
) -> Option<Vec<PersistentVolumeClaim>> {
    let requested = replica.replica.deployment.volume_claim_template.as_deref();

    let Some(resolved) = ctx.templates.volume_claim(requested) else {
        no_volume_claim(name, requested);
        return None;
    };
    debug!(stateful_set = %name, template = ?requested, "Using volume claim template");

    if resolved.use_default_name {
        let defaults = &ctx.config.defaults;
        match pod_spec.containers.first_mut() {
            Some(container) => container
                .volume_mounts
                .get_or_insert_with(Vec::new)
                .push(volume_mount(&defaults.data_volume_name, &ctx.config.paths.data)),
            None => warn!(
                stateful_set = %name,
                "Pod template has no containers, data volume not mounted"
            ),
        }
    }

    Some(vec![resolved.claim.clone()])
}

fn no_volume_claim(name: &str, requested: Option<&str>) {
    match requested {
        Some(template) => warn!(
            stateful_set = %name,
            template = %template,
            "Unknown volume claim template, no persistent storage"
        ),
        None => debug!(stateful_set = %name, "No volume claim template"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures::installation_with;
    use crate::compiler::XmlSectionGenerator;
    use crate::crd::ClickHouseInstallationSpec;

    const TEMPLATES: &str = r#"
templates:
  podTemplates:
    - name: v18
      containers:
        - name: clickhouse
          image: yandex/clickhouse-server:18.16.2
        - name: sidecar
          image: busybox
      volumes:
        - name: scratch
          emptyDir: {}
  volumeClaimTemplates:
    - name: default
      persistentVolumeClaim:
        metadata:
          name: USE_DEFAULT_NAME
        spec:
          accessModes: [ReadWriteOnce]
    - name: named
      persistentVolumeClaim:
        metadata:
          name: my-data
"#;

    fn compile_with(pod_template: Option<&str>, claim: Option<&str>) -> Vec<StatefulSet> {
        let mut spec: ClickHouseInstallationSpec = serde_yaml::from_str(TEMPLATES).unwrap();
        spec.defaults.deployment.pod_template = pod_template.map(Into::into);
        spec.defaults.deployment.volume_claim_template = claim.map(Into::into);
        let chi = installation_with("demo", &[(1, 1)], spec);
        let config = CompilerConfig::default();
        let ctx = CompileContext::new(&chi, &config, &XmlSectionGenerator);
        build_stateful_sets(&ctx).unwrap()
    }

    fn pod_spec(sts: &StatefulSet) -> &PodSpec {
        sts.spec.as_ref().unwrap().template.spec.as_ref().unwrap()
    }

    fn mount_paths(container: &Container) -> Vec<&str> {
        container
            .volume_mounts
            .iter()
            .flatten()
            .map(|m| m.mount_path.as_str())
            .collect()
    }

    #[test]
    fn test_default_pod_template() {
        let template = default_pod_template("chi-demo-0-0-0", &CompilerConfig::default());

        assert_eq!(template.containers.len(), 1);
        let container = &template.containers[0];
        assert_eq!(container.name, "chi-demo-0-0-0");
        assert_eq!(
            container.image.as_deref(),
            Some("yandex/clickhouse-server:latest")
        );
        let ports: Vec<_> = container
            .ports
            .iter()
            .flatten()
            .map(|p| p.container_port)
            .collect();
        assert_eq!(ports, vec![8123, 9000, 9009]);
        assert!(template.volumes.is_empty());
    }

    #[test]
    fn test_unknown_pod_template_falls_back() {
        let sets = compile_with(Some("missing"), None);
        let pod = pod_spec(&sets[0]);

        assert_eq!(pod.containers.len(), 1);
        assert_eq!(pod.containers[0].name, "chi-demo-0-0-0");
        assert_eq!(
            pod.containers[0].image.as_deref(),
            Some("yandex/clickhouse-server:latest")
        );
    }

    #[test]
    fn test_stateful_set_shape() {
        let sets = compile_with(None, None);
        let sts = &sets[0];
        let spec = sts.spec.as_ref().unwrap();

        assert_eq!(sts.metadata.name.as_deref(), Some("chi-demo-0-0-0"));
        assert_eq!(sts.metadata.namespace.as_deref(), Some("ns1"));
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.service_name, "chi-demo-0-0-0");
        assert_eq!(
            spec.selector.match_labels.as_ref().unwrap()["clickhouse.altinity.com/app"],
            "chi-demo-0-0-0"
        );

        let pod_labels = spec
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.as_ref())
            .unwrap();
        assert_eq!(pod_labels.len(), 3);
        assert_eq!(pod_labels["clickhouse.altinity.com/chi"], "demo");
    }

    #[test]
    fn test_config_maps_mounted_into_every_container() {
        let sets = compile_with(Some("v18"), None);
        let pod = pod_spec(&sets[0]);

        assert_eq!(pod.containers.len(), 2);
        for container in &pod.containers {
            assert_eq!(
                mount_paths(container),
                vec![
                    "/etc/clickhouse-server/config.d/",
                    "/etc/clickhouse-server/users.d/",
                    "/etc/clickhouse-server/conf.d/",
                ]
            );
        }

        let volumes: Vec<_> = pod.volumes.iter().flatten().collect();
        let names: Vec<_> = volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "scratch",
                "demo-common-configd",
                "demo-common-usersd",
                "chi-demo-deploy-confd-0-0-0",
            ]
        );
        for volume in &volumes[1..] {
            let source = volume.config_map.as_ref().unwrap();
            assert_eq!(source.name.as_deref(), Some(volume.name.as_str()));
        }
    }

    #[test]
    fn test_default_name_claim_mounts_first_container_only() {
        let sets = compile_with(Some("v18"), Some("default"));
        let spec = sets[0].spec.as_ref().unwrap();

        let claims = spec.volume_claim_templates.as_ref().unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].metadata.name.as_deref(), Some("clickhouse-data"));

        let pod = pod_spec(&sets[0]);
        let first = pod.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first[3].name, "clickhouse-data");
        assert_eq!(first[3].mount_path, "/var/lib/clickhouse");
        assert_eq!(pod.containers[1].volume_mounts.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_named_claim_adds_no_mount() {
        let sets = compile_with(None, Some("named"));
        let spec = sets[0].spec.as_ref().unwrap();

        let claims = spec.volume_claim_templates.as_ref().unwrap();
        assert_eq!(claims[0].metadata.name.as_deref(), Some("my-data"));
        assert_eq!(mount_paths(&pod_spec(&sets[0]).containers[0]).len(), 3);
    }

    #[test]
    fn test_unknown_claim_is_skipped() {
        let sets = compile_with(None, Some("missing"));
        let spec = sets[0].spec.as_ref().unwrap();

        assert!(spec.volume_claim_templates.is_none());
        let paths = mount_paths(&pod_spec(&sets[0]).containers[0]);
        assert!(!paths.contains(&"/var/lib/clickhouse"));
    }

    #[test]
    fn test_replica_deployment_overrides_defaults() {
        let mut spec: ClickHouseInstallationSpec = serde_yaml::from_str(TEMPLATES).unwrap();
        spec.defaults.deployment.pod_template = Some("v18".into());
        let mut chi = installation_with("demo", &[(1, 2)], spec);
        chi.spec.configuration.clusters[0].layout.shards[0].replicas[1]
            .deployment
            .pod_template = Some("missing".into());

        let config = CompilerConfig::default();
        let ctx = CompileContext::new(&chi, &config, &XmlSectionGenerator);
        let sets = build_stateful_sets(&ctx).unwrap();

        assert_eq!(pod_spec(&sets[0]).containers.len(), 2);
        assert_eq!(pod_spec(&sets[1]).containers.len(), 1);
    }
}
