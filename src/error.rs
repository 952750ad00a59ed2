//! Error types for the ClickHouse operator
//!
//! Provides structured error types for topology normalization, manifest
//! compilation and configuration loading.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Topology Errors
    // =========================================================================
    #[error("Malformed topology: cluster {cluster} has no shards")]
    EmptyCluster { cluster: usize },

    #[error("Malformed topology: shard {cluster}/{shard} has no replicas")]
    EmptyShard { cluster: usize, shard: usize },

    #[error("Malformed topology: replica {cluster}/{shard}/{replica} has no address")]
    MissingReplicaAddress {
        cluster: usize,
        shard: usize,
        replica: usize,
    },

    #[error("Duplicate cluster name: {name}")]
    DuplicateClusterName { name: String },

    #[error("Replica {address} does not belong to installation {namespace}/{chi}")]
    ForeignReplica {
        address: String,
        namespace: String,
        chi: String,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action a reconciler should take when compilation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // The installation must be edited before another attempt can succeed
            Error::EmptyCluster { .. }
            | Error::EmptyShard { .. }
            | Error::MissingReplicaAddress { .. }
            | Error::DuplicateClusterName { .. }
            | Error::ForeignReplica { .. }
            | Error::Configuration(_)
            | Error::Yaml(_)
            | Error::JsonParse(_) => ErrorAction::NoRequeue,

            Error::Io(_) | Error::Internal(_) => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;
