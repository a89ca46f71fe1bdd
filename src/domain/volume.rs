//! Volume records
//!
//! Transient records built per request from a cluster snapshot. Nothing here
//! is persisted or mutated after the response is produced.

use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quantity key for storage size in capacity/request maps
pub const STORAGE_RESOURCE: &str = "storage";

// =============================================================================
// Ownership
// =============================================================================

/// Label keys a PV carries to name the component that last used it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OwnershipLabels {
    /// Label holding the owning component's name
    pub component: String,
    /// Label holding the owning component's namespace
    pub namespace: String,
}

impl Default for OwnershipLabels {
    fn default() -> Self {
        Self {
            component: "kapp-component".to_string(),
            namespace: "kapp-namespace".to_string(),
        }
    }
}

/// Component that last used a volume, decoded once from PV labels
///
/// Empty label values are read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentOwner {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

impl ComponentOwner {
    /// Decode from a label map using the configured keys
    pub fn from_labels(labels: Option<&BTreeMap<String, String>>, keys: &OwnershipLabels) -> Self {
        let lookup = |key: &str| {
            labels
                .and_then(|l| l.get(key))
                .filter(|v| !v.is_empty())
                .cloned()
        };

        Self {
            name: lookup(&keys.component),
            namespace: lookup(&keys.namespace),
        }
    }

    /// Decode from a PV's labels
    pub fn of_volume(pv: &PersistentVolume, keys: &OwnershipLabels) -> Self {
        Self::from_labels(pv.metadata.labels.as_ref(), keys)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.namespace.is_none()
    }
}

// =============================================================================
// Volume Record
// =============================================================================

/// What a caller rebinds to when reusing a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReuseTarget {
    /// Mount the existing claim directly
    Claim(String),
    /// Create a fresh claim against this persistent volume
    Volume(String),
}

/// Aggregated view of a PV/PVC, as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "VolumeRecord", try_from = "VolumeRecord")]
pub struct Volume {
    pub name: String,
    pub namespace: Option<String>,
    /// Always false for matcher output
    pub in_use: bool,
    pub owner: ComponentOwner,
    /// Size as the API reports it, e.g. `1Gi`; empty if unknown
    pub capacity: String,
    pub reuse: ReuseTarget,
}

impl Volume {
    /// Name of the claim to reuse, if this is claim-identified
    pub fn claim(&self) -> Option<&str> {
        match &self.reuse {
            ReuseTarget::Claim(name) => Some(name),
            ReuseTarget::Volume(_) => None,
        }
    }

    /// Name of the persistent volume to reuse, if this is volume-identified
    pub fn persistent_volume(&self) -> Option<&str> {
        match &self.reuse {
            ReuseTarget::Volume(name) => Some(name),
            ReuseTarget::Claim(_) => None,
        }
    }
}

/// Wire shape of [`Volume`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    is_in_use: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    component_namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    component_name: String,
    #[serde(default)]
    capacity: String,
    #[serde(default)]
    pvc: String,
    #[serde(default)]
    pv: String,
}

impl From<Volume> for VolumeRecord {
    fn from(v: Volume) -> Self {
        let (pvc, pv) = match v.reuse {
            ReuseTarget::Claim(name) => (name, String::new()),
            ReuseTarget::Volume(name) => (String::new(), name),
        };

        Self {
            name: v.name,
            namespace: v.namespace,
            is_in_use: v.in_use,
            component_namespace: v.owner.namespace.unwrap_or_default(),
            component_name: v.owner.name.unwrap_or_default(),
            capacity: v.capacity,
            pvc,
            pv,
        }
    }
}

impl TryFrom<VolumeRecord> for Volume {
    type Error = String;

    fn try_from(r: VolumeRecord) -> Result<Self, Self::Error> {
        let reuse = match (r.pvc.is_empty(), r.pv.is_empty()) {
            (false, true) => ReuseTarget::Claim(r.pvc),
            (true, false) => ReuseTarget::Volume(r.pv),
            _ => {
                return Err(format!(
                    "volume {} must name exactly one of pvc or pv",
                    r.name
                ))
            }
        };

        let non_empty = |s: String| (!s.is_empty()).then_some(s);

        Ok(Self {
            name: r.name,
            namespace: r.namespace,
            in_use: r.is_in_use,
            owner: ComponentOwner {
                name: non_empty(r.component_name),
                namespace: non_empty(r.component_namespace),
            },
            capacity: r.capacity,
            reuse,
        })
    }
}

// =============================================================================
// Volume Pair
// =============================================================================

/// A bound PV together with the claim it resolves to
#[derive(Debug, Clone, Copy)]
pub struct VolumePair<'a> {
    pub pv: &'a PersistentVolume,
    pub pvc: &'a PersistentVolumeClaim,
}

// =============================================================================
// Helpers
// =============================================================================

/// Requested storage of a claim, or empty
pub fn claim_capacity(pvc: &PersistentVolumeClaim) -> String {
    pvc.spec
        .as_ref()
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|req| req.get(STORAGE_RESOURCE))
        .map(|q| q.0.clone())
        .unwrap_or_default()
}

/// Provisioned storage of a volume, or empty
pub fn volume_capacity(pv: &PersistentVolume) -> String {
    pv.spec
        .as_ref()
        .and_then(|s| s.capacity.as_ref())
        .and_then(|c| c.get(STORAGE_RESOURCE))
        .map(|q| q.0.clone())
        .unwrap_or_default()
}

/// Object name, or empty when the API omitted it
pub fn name_of(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

/// Object namespace, or empty for cluster-scoped objects
pub fn namespace_of(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.namespace.as_deref().unwrap_or_default()
}
