//! Manifest Compiler
//!
//! Turns a normalized ClickHouseInstallation into the Kubernetes objects
//! that run it:
//!
//! ```text
//!                      ClickHouseInstallation
//!                               │
//!             ┌─────────────────┼──────────────────┐
//!             ▼                 ▼                  ▼
//!         services         config_maps       stateful_sets
//!   1 installation-wide   common + users     1 per replica
//!    + 1 per replica     + 1 macros/replica
//! ```
//!
//! Compilation is a pure function of the installation and the
//! [`CompilerConfig`]: compiling the same input twice yields identical
//! output, element for element.

pub mod config_maps;
pub mod naming;
pub mod sections;
pub mod services;
pub mod stateful_sets;
pub mod templates;
pub mod walker;

pub use naming::Namer;
pub use sections::{SectionGenerator, XmlSectionGenerator};
pub use stateful_sets::default_pod_template;
pub use templates::{ResolvedVolumeClaim, TemplateIndex};
pub use walker::{replicas, walk_replicas, ReplicaRef};

use crate::config::CompilerConfig;
use crate::crd::{ClickHouseInstallation, ReplicaAddress};
use crate::error::{Error, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::ResourceExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

// =============================================================================
// Generated Resource Set
// =============================================================================

/// Every object generated for one installation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResourceSet {
    /// Installation-wide service first, then one per replica
    pub services: Vec<Service>,
    /// Common and common-users bundles first, then one macros bundle per replica
    pub config_maps: Vec<ConfigMap>,
    /// One per replica
    pub stateful_sets: Vec<StatefulSet>,
}

impl GeneratedResourceSet {
    /// Total number of objects
    pub fn len(&self) -> usize {
        self.services.len() + self.config_maps.len() + self.stateful_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render as a multi-document YAML stream
    pub fn to_yaml(&self) -> Result<String> {
        let mut docs = Vec::with_capacity(self.len());
        for service in &self.services {
            docs.push(serde_yaml::to_string(service)?);
        }
        for config_map in &self.config_maps {
            docs.push(serde_yaml::to_string(config_map)?);
        }
        for stateful_set in &self.stateful_sets {
            docs.push(serde_yaml::to_string(stateful_set)?);
        }
        Ok(docs.join("---\n"))
    }

    /// Render as a Kubernetes `List` object
    pub fn to_json(&self) -> Result<String> {
        let mut items = Vec::with_capacity(self.len());
        for service in &self.services {
            items.push(serde_json::to_value(service)?);
        }
        for config_map in &self.config_maps {
            items.push(serde_json::to_value(config_map)?);
        }
        for stateful_set in &self.stateful_sets {
            items.push(serde_json::to_value(stateful_set)?);
        }
        let list = serde_json::json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": items,
        });
        Ok(serde_json::to_string_pretty(&list)?)
    }
}

// =============================================================================
// Compile Context
// =============================================================================

/// Shared state of one compilation run
pub struct CompileContext<'a> {
    pub chi: &'a ClickHouseInstallation,
    pub config: &'a CompilerConfig,
    pub sections: &'a dyn SectionGenerator,
    pub namer: Namer<'a>,
    pub templates: TemplateIndex<'a>,
    pub chi_name: String,
    pub namespace: String,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        chi: &'a ClickHouseInstallation,
        config: &'a CompilerConfig,
        sections: &'a dyn SectionGenerator,
    ) -> Self {
        Self {
            chi,
            config,
            sections,
            namer: Namer::new(&config.naming),
            templates: TemplateIndex::build(&chi.spec.templates, &config.defaults),
            chi_name: chi.name_any(),
            namespace: chi.namespace_or(&config.default_namespace),
        }
    }

    /// Walk the replicas of the installation being compiled
    ///
    /// Every replica must be addressed within this installation's namespace
    /// and name, so that per-replica objects land beside the common ones.
    pub fn walk_replicas<T, F>(&self, visit: F) -> Result<Vec<T>>
    where
        F: FnMut(ReplicaRef<'a>) -> Result<T>,
    {
        for replica in walker::replicas(self.chi)? {
            self.check_address(replica.address)?;
        }
        walker::walk_replicas(self.chi, visit)
    }

    fn check_address(&self, address: &ReplicaAddress) -> Result<()> {
        if address.namespace == self.namespace && address.chi_name == self.chi_name {
            return Ok(());
        }
        Err(Error::ForeignReplica {
            address: address.to_string(),
            namespace: self.namespace.clone(),
            chi: self.chi_name.clone(),
        })
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Compiles installations into Kubernetes objects
#[derive(Clone)]
pub struct Compiler {
    config: CompilerConfig,
    sections: Arc<dyn SectionGenerator>,
}

impl Compiler {
    /// Create a compiler with the XML section generator
    pub fn new(config: CompilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sections: Arc::new(XmlSectionGenerator::new()),
        })
    }

    /// Replace the section generator
    pub fn with_sections(mut self, sections: Arc<dyn SectionGenerator>) -> Self {
        self.sections = sections;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a normalized installation
    ///
    /// Fails without output if any shard has no replicas or any replica
    /// has no address. Unknown template references fall back to defaults.
    pub fn compile(&self, chi: &ClickHouseInstallation) -> Result<GeneratedResourceSet> {
        let ctx = CompileContext::new(chi, &self.config, self.sections.as_ref());

        let services = services::build_services(&ctx)?;
        let config_maps = config_maps::build_config_maps(&ctx)?;
        let stateful_sets = stateful_sets::build_stateful_sets(&ctx)?;

        info!(
            chi = %ctx.chi_name,
            namespace = %ctx.namespace,
            services = services.len(),
            config_maps = config_maps.len(),
            stateful_sets = stateful_sets.len(),
            pod_templates = ctx.templates.pod_template_count(),
            volume_claim_templates = ctx.templates.volume_claim_count(),
            "Compiled installation"
        );

        Ok(GeneratedResourceSet {
            services,
            config_maps,
            stateful_sets,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            config: CompilerConfig::default(),
            sections: Arc::new(XmlSectionGenerator::new()),
        }
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Compile with the default configuration
pub fn compile(chi: &ClickHouseInstallation) -> Result<GeneratedResourceSet> {
    Compiler::default().compile(chi)
}

// =============================================================================
// Test Fixtures
// =============================================================================
