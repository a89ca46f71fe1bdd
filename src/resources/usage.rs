//! Usage Oracle
//!
//! Decides whether a claim is mounted by any pod in its namespace.

use crate::domain::volume::{name_of, namespace_of};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use std::collections::HashMap;

/// True iff some pod declares a volume backed by the claim `claim_name`
pub fn pods_mount_claim<'p>(claim_name: &str, pods: impl IntoIterator<Item = &'p Pod>) -> bool {
    pods.into_iter().any(|pod| {
        pod.spec
            .as_ref()
            .and_then(|s| s.volumes.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|v| v.persistent_volume_claim.as_ref())
            .any(|source| source.claim_name == claim_name)
    })
}

/// True iff any of `pods` mounts `pvc`
///
/// `pods` is expected to be the pod list of the claim's namespace.
pub fn is_claim_in_use(pvc: &PersistentVolumeClaim, pods: &[Pod]) -> bool {
    pods_mount_claim(name_of(&pvc.metadata), pods)
}

/// Claim usage lookups over one pod snapshot, indexed by namespace
#[derive(Debug, Default)]
pub struct UsageOracle<'a> {
    by_namespace: HashMap<&'a str, Vec<&'a Pod>>,
}

impl<'a> UsageOracle<'a> {
    pub fn new(pods: &'a [Pod]) -> Self {
        let mut by_namespace: HashMap<&str, Vec<&Pod>> = HashMap::new();
        for pod in pods {
            by_namespace
                .entry(namespace_of(&pod.metadata))
                .or_default()
                .push(pod);
        }
        Self { by_namespace }
    }

    /// Whether a pod in the claim's own namespace mounts it
    pub fn is_in_use(&self, pvc: &PersistentVolumeClaim) -> bool {
        self.by_namespace
            .get(namespace_of(&pvc.metadata))
            .is_some_and(|pods| pods_mount_claim(name_of(&pvc.metadata), pods.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{claim, pod};

    #[test]
    fn test_claim_mounted_by_pod() {
        let pvc = claim("ns1", "data", "1Gi");
        let pods = vec![pod("ns1", "other", &["logs"]), pod("ns1", "web-0", &["data"])];
        assert!(is_claim_in_use(&pvc, &pods));
    }

    #[test]
    fn test_no_pods_is_not_in_use() {
        let pvc = claim("ns1", "data", "1Gi");
        assert!(!is_claim_in_use(&pvc, &[]));
        assert!(!UsageOracle::new(&[]).is_in_use(&pvc));
    }

    #[test]
    fn test_pod_without_volumes() {
        let pvc = claim("ns1", "data", "1Gi");
        let bare = Pod::default();
        assert!(!is_claim_in_use(&pvc, &[bare]));
    }

    #[test]
    fn test_oracle_only_consults_claim_namespace() {
        let pods = vec![pod("ns2", "web-0", &["data"])];
        let oracle = UsageOracle::new(&pods);

        assert!(!oracle.is_in_use(&claim("ns1", "data", "1Gi")));
        assert!(oracle.is_in_use(&claim("ns2", "data", "1Gi")));
    }
}
