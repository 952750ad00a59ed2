//! Custom Resource Definitions for the ClickHouse operator
//!
//! This module contains:
//! - ClickHouseInstallation: cluster topology and template catalog
//! - normalize: expansion of layout counts and template inheritance

pub mod installation;
pub mod normalizer;

pub use installation::*;
pub use normalizer::normalize;
