//! Error types for the workload volume engine
//!
//! Provides structured error types for cluster listing, aggregation,
//! configuration, and the REST surface.

use crate::domain::ports::ResourceKind;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the engine
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
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// A cluster list call failed. Carried to the caller unchanged.
    #[error("Failed to list {kind}: {source}")]
    ListFailed {
        kind: ResourceKind,
        #[source]
        source: kube::Error,
    },

    // =========================================================================
    // Aggregation Errors
    // =========================================================================
    #[error("Aggregation cancelled")]
    Cancelled,

    #[error("Aggregation deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    // =========================================================================
    // API Errors
    // =========================================================================
    #[error("API request validation failed: {0}")]
    ApiValidation(String),

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is transient (a re-query may succeed)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Kube(_) | Error::ListFailed { .. } | Error::DeadlineExceeded(_)
        )
    }

    /// The resource kind whose listing failed, if any
    pub fn failed_kind(&self) -> Option<ResourceKind> {
        match self {
            Error::ListFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// HTTP status code used by the REST layer for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::ApiValidation(_) => 400,
            Error::Kube(_)
            | Error::ListFailed { .. }
            | Error::DeadlineExceeded(_)
            | Error::Cancelled => 503,
            Error::Internal(_)
            | Error::Configuration(_)
            | Error::Yaml(_)
            | Error::Io(_) => 500,
        }
    }
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;
