//! ClickHouse Operator - Manifest Compiler
//!
//! Compiles a `ClickHouseInstallation` custom resource into the Kubernetes
//! objects that run it: Services, ConfigMaps and StatefulSets.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                    ClickHouseInstallation (CRD)                      │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                    Normalizer (layout expansion,                     │
//! │                    deployment inheritance, addresses)                │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌──────────┐  │
//! │  │   Template   │  │    Naming    │  │   Topology   │  │ Section  │  │
//! │  │    Index     │  │  Generator   │  │    Walker    │  │Generator │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘  └────┬─────┘  │
//! │         └─────────────────┴────────┬────────┴───────────────┘        │
//! │                                    │                                 │
//! │      ┌─────────────────┬───────────┴──────────┬─────────────────┐    │
//! │      │    Services     │      ConfigMaps      │  StatefulSets   │    │
//! │      └─────────────────┴──────────────────────┴─────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`compiler`]: Object assembly from a normalized installation
//! - [`config`]: Naming patterns, ports, paths and other compiler settings
//! - [`crd`]: ClickHouseInstallation resource and normalization
//! - [`error`]: Error types and handling

pub mod compiler;
pub mod config;
pub mod crd;
pub mod error;

// Re-export commonly used types
pub use compiler::{
    compile, CompileContext, Compiler, GeneratedResourceSet, Namer, ReplicaRef,
    SectionGenerator, XmlSectionGenerator,
};

pub use config::{
    CompilerConfig, DefaultsConfig, FileNames, LabelConfig, NamingConfig, PathConfig, PortConfig,
};

pub use crd::{
    normalize, ChiCluster, ChiDeployment, ChiPodTemplate, ChiReplica, ChiShard, ChiTemplates,
    ChiVolumeClaimTemplate, ClickHouseInstallation, ClickHouseInstallationSpec, ReplicaAddress,
};

pub use error::{Error, ErrorAction, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
