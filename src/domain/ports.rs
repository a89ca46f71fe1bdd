//! Domain Ports - Core trait definitions for the volume engine
//!
//! The [`ClusterGateway`] trait is the boundary between the engine and the
//! Kubernetes API. Adapters implement it to provide concrete listing.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Event, PersistentVolume, PersistentVolumeClaim, Pod};
use kube::api::ListParams;
use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Kinds
// =============================================================================

/// Resource kinds the engine lists from the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    PersistentVolume,
    PersistentVolumeClaim,
    Pod,
    Event,
    ReplicaSet,
    Deployment,
}

impl ResourceKind {
    /// All kinds, in declaration order
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::PersistentVolume,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::Pod,
        ResourceKind::Event,
        ResourceKind::ReplicaSet,
        ResourceKind::Deployment,
    ];

    /// Whether objects of this kind live inside a namespace
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ResourceKind::PersistentVolume)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::PersistentVolume => write!(f, "PersistentVolume"),
            ResourceKind::PersistentVolumeClaim => write!(f, "PersistentVolumeClaim"),
            ResourceKind::Pod => write!(f, "Pod"),
            ResourceKind::Event => write!(f, "Event"),
            ResourceKind::ReplicaSet => write!(f, "ReplicaSet"),
            ResourceKind::Deployment => write!(f, "Deployment"),
        }
    }
}

// =============================================================================
// List Scope
// =============================================================================

/// Namespace and label selector narrowing a list call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListScope {
    /// Namespace to list in; `None` lists cluster-wide
    pub namespace: Option<String>,
    /// Label selector in the API server's `key=value,...` syntax
    pub label_selector: Option<String>,
}

impl ListScope {
    /// Cluster-wide, unfiltered
    pub fn all() -> Self {
        Self::default()
    }

    /// Every object in one namespace
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            label_selector: None,
        }
    }

    /// Narrow to objects carrying `key=value`
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        let requirement = format!("{}={}", key, value);
        self.label_selector = Some(match self.label_selector.take() {
            Some(existing) if !existing.is_empty() => format!("{},{}", existing, requirement),
            _ => requirement,
        });
        self
    }

    /// Translate into kube list parameters
    pub fn list_params(&self) -> ListParams {
        match self.label_selector.as_deref() {
            Some(selector) if !selector.is_empty() => ListParams::default().labels(selector),
            _ => ListParams::default(),
        }
    }
}

// =============================================================================
// Cluster Gateway Port
// =============================================================================

/// Port for reading cluster objects
///
/// Each call is an independent point-in-time read. Failures are returned as
/// [`crate::Error::ListFailed`] naming the kind.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// List persistent volumes (cluster-scoped; `scope.namespace` is ignored)
    async fn list_persistent_volumes(&self, scope: &ListScope) -> Result<Vec<PersistentVolume>>;

    /// List persistent volume claims
    async fn list_persistent_volume_claims(
        &self,
        scope: &ListScope,
    ) -> Result<Vec<PersistentVolumeClaim>>;

    /// List pods
    async fn list_pods(&self, scope: &ListScope) -> Result<Vec<Pod>>;

    /// List events
    async fn list_events(&self, scope: &ListScope) -> Result<Vec<Event>>;

    /// List replica sets
    async fn list_replica_sets(&self, scope: &ListScope) -> Result<Vec<ReplicaSet>>;

    /// List deployments
    async fn list_deployments(&self, scope: &ListScope) -> Result<Vec<Deployment>>;

    /// Get gateway name
    fn gateway_name(&self) -> &str;
}
