//! Config Section Generators
//!
//! Produces the XML bodies stored in the generated ConfigMaps. Each method
//! returns the complete file content for one section, or an empty string
//! when the section has nothing to say and should be left out.

use crate::compiler::naming::Namer;
use crate::compiler::walker::ReplicaRef;
use crate::config::CompilerConfig;
use crate::crd::ClickHouseInstallation;
use std::collections::BTreeMap;
use tracing::warn;

/// Root element of every ClickHouse config file
const XML_ROOT: &str = "yandex";

const INDENT: &str = "    ";

// =============================================================================
// Section Generator Trait
// =============================================================================

/// Source of config section bodies
pub trait SectionGenerator: Send + Sync {
    /// Cluster topology (`remote_servers`)
    fn remote_servers(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String;

    /// Coordination service endpoints (`zookeeper`)
    fn zookeeper(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String;

    /// Server settings
    fn settings(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String;

    /// Listen addresses
    fn listen(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String;

    fn users(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String;

    fn quotas(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String;

    fn profiles(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String;

    /// Per-host identity macros
    fn host_macros(
        &self,
        chi: &ClickHouseInstallation,
        replica: &ReplicaRef<'_>,
        config: &CompilerConfig,
    ) -> String;
}

// =============================================================================
// XML Section Generator
// =============================================================================

/// Generates ClickHouse XML config files from the installation spec
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlSectionGenerator;

impl XmlSectionGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SectionGenerator for XmlSectionGenerator {
    fn remote_servers(&self, chi: &ClickHouseInstallation, config: &CompilerConfig) -> String {
        let clusters = &chi.spec.configuration.clusters;
        if clusters.is_empty() {
            return String::new();
        }

        let namer = Namer::new(&config.naming);
        let client_port = config.ports.client.number.to_string();
        let mut xml = XmlWriter::new();
        xml.open("remote_servers");
        for cluster in clusters {
            xml.open(&cluster.name);
            for shard in &cluster.layout.shards {
                xml.open("shard");
                if let Some(internal) = shard.internal_replication {
                    xml.element("internal_replication", &internal.to_string());
                }
                if let Some(weight) = shard.weight {
                    xml.element("weight", &weight.to_string());
                }
                for replica in &shard.replicas {
                    let Some(address) = replica.address.as_ref() else {
                        warn!(cluster = %cluster.name, "Replica without address left out of remote_servers");
                        continue;
                    };
                    xml.open("replica");
                    xml.element("host", &namer.pod_fqdn(address));
                    xml.element("port", &client_port);
                    xml.close("replica");
                }
                xml.close("shard");
            }
            xml.close(&cluster.name);
        }
        xml.close("remote_servers");
        xml.finish()
    }

    fn zookeeper(&self, chi: &ClickHouseInstallation, _config: &CompilerConfig) -> String {
        let nodes = &chi.spec.configuration.zookeeper.nodes;
        if nodes.is_empty() {
            return String::new();
        }

        let mut xml = XmlWriter::new();
        xml.open("zookeeper");
        for node in nodes {
            xml.open("node");
            xml.element("host", &node.host);
            xml.element("port", &node.port.to_string());
            xml.close("node");
        }
        xml.close("zookeeper");
        xml.finish()
    }

    fn settings(&self, chi: &ClickHouseInstallation, _config: &CompilerConfig) -> String {
        paths_section(None, &chi.spec.configuration.settings)
    }

    fn listen(&self, _chi: &ClickHouseInstallation, _config: &CompilerConfig) -> String {
        let mut xml = XmlWriter::new();
        xml.element("listen_host", "::");
        xml.element("listen_host", "0.0.0.0");
        xml.element("listen_try", "1");
        xml.finish()
    }

    fn users(&self, chi: &ClickHouseInstallation, _config: &CompilerConfig) -> String {
        paths_section(Some("users"), &chi.spec.configuration.users)
    }

    fn quotas(&self, chi: &ClickHouseInstallation, _config: &CompilerConfig) -> String {
        paths_section(Some("quotas"), &chi.spec.configuration.quotas)
    }

    fn profiles(&self, chi: &ClickHouseInstallation, _config: &CompilerConfig) -> String {
        paths_section(Some("profiles"), &chi.spec.configuration.profiles)
    }

    fn host_macros(
        &self,
        _chi: &ClickHouseInstallation,
        replica: &ReplicaRef<'_>,
        config: &CompilerConfig,
    ) -> String {
        let namer = Namer::new(&config.naming);
        let address = replica.address;

        let mut xml = XmlWriter::new();
        xml.open("macros");
        xml.element("installation", &address.chi_name);
        xml.element("cluster", &address.cluster_name);
        xml.element("shard", &address.shard_index.to_string());
        xml.element("replica", &namer.pod_hostname(address));
        xml.close("macros");
        xml.finish()
    }
}

// =============================================================================
// XML Helpers
// =============================================================================

/// Builds an indented document under the `<yandex>` root
struct XmlWriter {
    buf: String,
    depth: usize,
}

impl XmlWriter {
    fn new() -> Self {
        let mut buf = String::new();
        buf.push_str(&format!("<{}>\n", XML_ROOT));
        Self { buf, depth: 1 }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str(INDENT);
        }
    }

    fn open(&mut self, tag: &str) {
        self.indent();
        self.buf.push_str(&format!("<{}>\n", tag));
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.indent();
        self.buf.push_str(&format!("</{}>\n", tag));
    }

    fn element(&mut self, tag: &str, value: &str) {
        self.indent();
        self.buf
            .push_str(&format!("<{tag}>{}</{tag}>\n", escape(value), tag = tag));
    }

    fn finish(mut self) -> String {
        self.buf.push_str(&format!("</{}>\n", XML_ROOT));
        self.buf
    }
}

/// Tree of elements built from slash-separated paths
#[derive(Default)]
struct PathNode<'a> {
    value: Option<&'a str>,
    children: BTreeMap<&'a str, PathNode<'a>>,
}

impl<'a> PathNode<'a> {
    fn insert(&mut self, path: &'a str, value: &'a str) {
        let node = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self, |node, segment| node.children.entry(segment).or_default());
        node.value = Some(value);
    }

    fn write(&self, xml: &mut XmlWriter) {
        for (tag, node) in &self.children {
            if node.children.is_empty() {
                xml.element(tag, node.value.unwrap_or_default());
                continue;
            }
            if node.value.is_some() {
                warn!(element = %tag, "Value of element with children ignored");
            }
            xml.open(tag);
            node.write(xml);
            xml.close(tag);
        }
    }
}

/// Render `entries` as nested XML, optionally under a `section` element
fn paths_section(section: Option<&str>, entries: &BTreeMap<String, String>) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut root = PathNode::default();
    for (path, value) in entries {
        root.insert(path, value);
    }

    let mut xml = XmlWriter::new();
    match section {
        Some(section) => {
            xml.open(section);
            root.write(&mut xml);
            xml.close(section);
        }
        None => root.write(&mut xml),
    }
    xml.finish()
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
