//! ConfigMap Assembly
//!
//! There are two kinds of config bundles:
//! 1. Common bundles shared by every replica: one with remote servers,
//!    zookeeper, settings and listen sections, one with users, quotas and
//!    profiles.
//! 2. A personal macros bundle for each replica.
//!
//! An installation with N replicas therefore gets N + 2 ConfigMaps.

use crate::compiler::walker::ReplicaRef;
use crate::compiler::CompileContext;
use crate::error::Result;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::debug;

/// Common bundles followed by one macros bundle per replica
pub fn build_config_maps(ctx: &CompileContext<'_>) -> Result<Vec<ConfigMap>> {
    let mut config_maps = vec![common_config_map(ctx), common_users_config_map(ctx)];
    config_maps.extend(ctx.walk_replicas(|replica| {
        Ok(macros_config_map(ctx, &replica))
    })?);
    Ok(config_maps)
}

fn common_config_map(ctx: &CompileContext<'_>) -> ConfigMap {
    let (chi, config, sections) = (ctx.chi, ctx.config, ctx.sections);
    let files = &config.files;

    let mut data = BTreeMap::new();
    include_non_empty(&mut data, &files.remote_servers, sections.remote_servers(chi, config));
    include_non_empty(&mut data, &files.zookeeper, sections.zookeeper(chi, config));
    include_non_empty(&mut data, &files.settings, sections.settings(chi, config));
    include_non_empty(&mut data, &files.listen, sections.listen(chi, config));

    let name = ctx.namer.common_config_map(&ctx.chi_name);
    debug!(config_map = %name, files = data.len(), "Generated common ConfigMap");
    config_map(name, ctx.namespace.clone(), ctx, data)
}

fn common_users_config_map(ctx: &CompileContext<'_>) -> ConfigMap {
    let (chi, config, sections) = (ctx.chi, ctx.config, ctx.sections);
    let files = &config.files;

    let mut data = BTreeMap::new();
    include_non_empty(&mut data, &files.users, sections.users(chi, config));
    include_non_empty(&mut data, &files.quotas, sections.quotas(chi, config));
    include_non_empty(&mut data, &files.profiles, sections.profiles(chi, config));

    let name = ctx.namer.common_users_config_map(&ctx.chi_name);
    debug!(config_map = %name, files = data.len(), "Generated common users ConfigMap");
    config_map(name, ctx.namespace.clone(), ctx, data)
}

fn macros_config_map(ctx: &CompileContext<'_>, replica: &ReplicaRef<'_>) -> ConfigMap {
    let macros = ctx.sections.host_macros(ctx.chi, replica, ctx.config);
    let data = BTreeMap::from([(ctx.config.files.macros.clone(), macros)]);

    let name = ctx.namer.macros_config_map(replica.address);
    debug!(config_map = %name, "Generated macros ConfigMap");
    config_map(name, replica.address.namespace.clone(), ctx, data)
}

fn config_map(
    name: String,
    namespace: String,
    ctx: &CompileContext<'_>,
    data: BTreeMap<String, String>,
) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace),
            labels: Some(ctx.config.labels.generated(&ctx.chi_name)),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// Store `content` under `file` unless it is empty
fn include_non_empty(data: &mut BTreeMap<String, String>, file: &str, content: String) {
    if content.is_empty() {
        return;
    }
    data.insert(file.to_string(), content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures::{installation, installation_with};
    use crate::compiler::XmlSectionGenerator;
    use crate::config::CompilerConfig;
    use crate::crd::ClickHouseInstallationSpec;

    #[test]
    fn test_include_non_empty() {
        let mut data = BTreeMap::new();
        include_non_empty(&mut data, "settings.xml", String::new());
        include_non_empty(&mut data, "listen.xml", "<yandex/>".into());

        assert_eq!(data.len(), 1);
        assert!(data.contains_key("listen.xml"));
    }

    #[test]
    fn test_config_map_names_and_labels() {
        let chi = installation("demo", &[(1, 2)]);
        let config = CompilerConfig::default();
        let ctx = CompileContext::new(&chi, &config, &XmlSectionGenerator);

        let maps = build_config_maps(&ctx).unwrap();
        assert_eq!(maps.len(), 4);

        for cm in &maps {
            assert_eq!(cm.metadata.namespace.as_deref(), Some("ns1"));
            let labels = cm.metadata.labels.as_ref().unwrap();
            assert_eq!(labels["clickhouse.altinity.com/chop"], "demo");
            assert_eq!(labels["clickhouse.altinity.com/chi"], "demo");
        }

        let macros = &maps[3];
        assert_eq!(
            macros.metadata.name.as_deref(),
            Some("chi-demo-deploy-confd-0-0-1")
        );
        let data = macros.data.as_ref().unwrap();
        assert_eq!(data.len(), 1);
        assert!(data["macros.xml"].contains("<replica>chi-demo-0-0-1</replica>"));
    }

    #[test]
    fn test_all_sections_present() {
        let spec: ClickHouseInstallationSpec = serde_yaml::from_str(
            r#"
configuration:
  zookeeper:
    nodes:
      - host: zk-0
  settings:
    max_concurrent_queries: "200"
  users:
    default/password: secret
  profiles:
    default/max_memory_usage: "10000000000"
  quotas:
    default/interval/duration: "3600"
"#,
        )
        .unwrap();
        let chi = installation_with("demo", &[(1, 1)], spec);
        let config = CompilerConfig::default();
        let ctx = CompileContext::new(&chi, &config, &XmlSectionGenerator);

        let maps = build_config_maps(&ctx).unwrap();
        let common = maps[0].data.as_ref().unwrap();
        assert_eq!(
            common.keys().collect::<Vec<_>>(),
            vec!["listen.xml", "remote_servers.xml", "settings.xml", "zookeeper.xml"]
        );
        let users = maps[1].data.as_ref().unwrap();
        assert_eq!(
            users.keys().collect::<Vec<_>>(),
            vec!["profiles.xml", "quotas.xml", "users.xml"]
        );
    }

    #[test]
    fn test_custom_file_names() {
        let chi = installation("demo", &[(1, 1)]);
        let mut config = CompilerConfig::default();
        config.files.macros = "01-macros.xml".into();
        let ctx = CompileContext::new(&chi, &config, &XmlSectionGenerator);

        let maps = build_config_maps(&ctx).unwrap();
        assert!(maps[2].data.as_ref().unwrap().contains_key("01-macros.xml"));
    }
}
