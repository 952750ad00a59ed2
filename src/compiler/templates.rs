//! Template Index
//!
//! Name-keyed lookup over an installation's pod and volume claim templates,
//! built once per compilation. Volume claim templates are resolved while
//! indexing: a claim named with the default-name marker is renamed to the
//! default data volume and flagged so the data directory gets mounted.

use crate::config::DefaultsConfig;
use crate::crd::{ChiPodTemplate, ChiTemplates};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use std::collections::BTreeMap;
use tracing::debug;

/// A volume claim template ready to attach to a StatefulSet
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVolumeClaim {
    pub claim: PersistentVolumeClaim,
    /// Claim was renamed to the default data volume name
    pub use_default_name: bool,
}

/// Lookup tables from template name to template
#[derive(Debug, Clone, Default)]
pub struct TemplateIndex<'a> {
    pod_templates: BTreeMap<&'a str, &'a ChiPodTemplate>,
    volume_claims: BTreeMap<&'a str, ResolvedVolumeClaim>,
}

impl<'a> TemplateIndex<'a> {
    /// Index a template catalog; later duplicates replace earlier ones
    pub fn build(templates: &'a ChiTemplates, defaults: &DefaultsConfig) -> Self {
        let mut pod_templates = BTreeMap::new();
        for template in &templates.pod_templates {
            if pod_templates.insert(template.name.as_str(), template).is_some() {
                debug!(template = %template.name, "Pod template redefined, last one wins");
            }
        }

        let mut volume_claims = BTreeMap::new();
        for template in &templates.volume_claim_templates {
            let resolved = resolve_volume_claim(&template.persistent_volume_claim, defaults);
            if volume_claims.insert(template.name.as_str(), resolved).is_some() {
                debug!(template = %template.name, "Volume claim template redefined, last one wins");
            }
        }

        Self {
            pod_templates,
            volume_claims,
        }
    }

    pub fn pod_template(&self, name: Option<&str>) -> Option<&'a ChiPodTemplate> {
        name.and_then(|name| self.pod_templates.get(name).copied())
    }

    pub fn volume_claim(&self, name: Option<&str>) -> Option<&ResolvedVolumeClaim> {
        name.and_then(|name| self.volume_claims.get(name))
    }

    pub fn pod_template_count(&self) -> usize {
        self.pod_templates.len()
    }

    pub fn volume_claim_count(&self) -> usize {
        self.volume_claims.len()
    }
}

fn resolve_volume_claim(
    claim: &PersistentVolumeClaim,
    defaults: &DefaultsConfig,
) -> ResolvedVolumeClaim {
    let mut claim = claim.clone();
    let use_default_name =
        claim.metadata.name.as_deref() == Some(defaults.default_claim_name_marker.as_str());
    if use_default_name {
        claim.metadata.name = Some(defaults.data_volume_name.clone());
    }
    ResolvedVolumeClaim {
        claim,
        use_default_name,
    }
}
