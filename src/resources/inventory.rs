//! Volume Inventory
//!
//! Partitions persistent volumes into unbound volumes and bound
//! [`VolumePair`]s against a claim snapshot. A claim reference to a claim
//! that no longer exists counts as unbound, and so does a stale reference to
//! an older claim of the same name.
//!
//! Each claim is paired with at most one volume.

use crate::domain::volume::{name_of, namespace_of, VolumePair};
use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolume, PersistentVolumeClaim};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Bound/unbound split of a volume snapshot, in source order
#[derive(Debug, Default)]
pub struct VolumeInventory<'a> {
    pub unbound: Vec<&'a PersistentVolume>,
    pub bound: Vec<VolumePair<'a>>,
}

impl<'a> VolumeInventory<'a> {
    /// Classify every volume against `claims`
    pub fn build(volumes: &'a [PersistentVolume], claims: &'a [PersistentVolumeClaim]) -> Self {
        let by_identity: HashMap<(&str, &str), &PersistentVolumeClaim> = claims
            .iter()
            .map(|pvc| ((namespace_of(&pvc.metadata), name_of(&pvc.metadata)), pvc))
            .collect();

        let mut inventory = Self::default();
        let mut paired: HashSet<(&str, &str)> = HashSet::new();

        for pv in volumes {
            let pvc = claim_ref(pv)
                .and_then(|r| resolve(r, &by_identity))
                .filter(|&pvc| claim_accepts(pvc, pv))
                .filter(|&pvc| paired.insert((namespace_of(&pvc.metadata), name_of(&pvc.metadata))));

            match pvc {
                Some(pvc) => inventory.bound.push(VolumePair { pv, pvc }),
                None => inventory.unbound.push(pv),
            }
        }

        inventory
    }
}

/// The volume's claim reference, if it names a claim
pub fn claim_ref(pv: &PersistentVolume) -> Option<&ObjectReference> {
    pv.spec
        .as_ref()
        .and_then(|s| s.claim_ref.as_ref())
        .filter(|r| r.name.as_deref().is_some_and(|n| !n.is_empty()))
}

fn resolve<'a>(
    reference: &ObjectReference,
    claims: &HashMap<(&str, &str), &'a PersistentVolumeClaim>,
) -> Option<&'a PersistentVolumeClaim> {
    let namespace = reference.namespace.as_deref().unwrap_or_default();
    let name = reference.name.as_deref().unwrap_or_default();
    let pvc = claims.get(&(namespace, name)).copied()?;

    // Same name, different object: the claim was deleted and re-created
    match (reference.uid.as_deref(), pvc.metadata.uid.as_deref()) {
        (Some(want), Some(have)) if !want.is_empty() && !have.is_empty() && want != have => {
            debug!(namespace, claim = name, "Claim reference is stale, treating volume as unbound");
            None
        }
        _ => Some(pvc),
    }
}

/// A claim bound to some other volume does not belong to `pv`
fn claim_accepts(pvc: &PersistentVolumeClaim, pv: &PersistentVolume) -> bool {
    pvc.spec
        .as_ref()
        .and_then(|s| s.volume_name.as_deref())
        .filter(|v| !v.is_empty())
        .map_or(true, |v| v == name_of(&pv.metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bound_pv, claim, pv, with_claim_ref_uid, with_claim_uid, with_volume_name};

    #[test]
    fn test_partitions_bound_and_unbound() {
        let volumes = vec![
            pv("pv-free", "1Gi"),
            bound_pv("pv-a", "1Gi", "ns1", "pvc-a"),
            bound_pv("pv-b", "2Gi", "ns2", "pvc-b"),
        ];
        let claims = vec![claim("ns1", "pvc-a", "1Gi"), claim("ns2", "pvc-b", "2Gi")];

        let inventory = VolumeInventory::build(&volumes, &claims);

        assert_eq!(inventory.unbound.len(), 1);
        assert_eq!(inventory.unbound[0].metadata.name.as_deref(), Some("pv-free"));
        let bound: Vec<_> = inventory
            .bound
            .iter()
            .map(|p| p.pvc.metadata.name.as_deref().unwrap())
            .collect();
        assert_eq!(bound, vec!["pvc-a", "pvc-b"]);
    }

    #[test]
    fn test_dangling_reference_is_unbound() {
        let volumes = vec![bound_pv("pv-a", "1Gi", "ns1", "deleted")];
        let claims = vec![claim("ns1", "pvc-a", "1Gi")];

        let inventory = VolumeInventory::build(&volumes, &claims);

        assert!(inventory.bound.is_empty());
        assert_eq!(inventory.unbound.len(), 1);
    }

    #[test]
    fn test_reference_matches_namespace_and_name() {
        // Same claim name in another namespace must not resolve
        let volumes = vec![bound_pv("pv-a", "1Gi", "ns1", "data")];
        let claims = vec![claim("ns2", "data", "1Gi")];

        let inventory = VolumeInventory::build(&volumes, &claims);

        assert!(inventory.bound.is_empty());
        assert_eq!(inventory.unbound.len(), 1);
    }

    #[test]
    fn test_stale_reference_to_recreated_claim_is_unbound() {
        let volumes = vec![
            with_claim_ref_uid(bound_pv("pv-old", "1Gi", "ns1", "data"), "uid-gone"),
            with_claim_ref_uid(bound_pv("pv-new", "1Gi", "ns1", "data"), "uid-live"),
        ];
        let claims = vec![with_claim_uid(claim("ns1", "data", "1Gi"), "uid-live")];

        let inventory = VolumeInventory::build(&volumes, &claims);

        assert_eq!(inventory.bound.len(), 1);
        assert_eq!(inventory.bound[0].pv.metadata.name.as_deref(), Some("pv-new"));
        assert_eq!(inventory.unbound.len(), 1);
        assert_eq!(inventory.unbound[0].metadata.name.as_deref(), Some("pv-old"));
    }

    #[test]
    fn test_claim_bound_elsewhere_is_not_paired() {
        // pv-old comes first in source order but the claim names pv-new
        let volumes = vec![
            bound_pv("pv-old", "1Gi", "ns1", "data"),
            bound_pv("pv-new", "1Gi", "ns1", "data"),
        ];
        let claims = vec![with_volume_name(claim("ns1", "data", "1Gi"), "pv-new")];

        let inventory = VolumeInventory::build(&volumes, &claims);

        assert_eq!(inventory.bound.len(), 1);
        assert_eq!(inventory.bound[0].pv.metadata.name.as_deref(), Some("pv-new"));
        assert_eq!(inventory.unbound[0].metadata.name.as_deref(), Some("pv-old"));
    }

    #[test]
    fn test_claim_paired_at_most_once() {
        // Nothing tells the two references apart; the first volume keeps the claim
        let volumes = vec![
            bound_pv("pv-a", "1Gi", "ns1", "data"),
            bound_pv("pv-b", "1Gi", "ns1", "data"),
        ];
        let claims = vec![claim("ns1", "data", "1Gi")];

        let inventory = VolumeInventory::build(&volumes, &claims);

        assert_eq!(inventory.bound.len(), 1);
        assert_eq!(inventory.bound[0].pv.metadata.name.as_deref(), Some("pv-a"));
        assert_eq!(inventory.unbound.len(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        let inventory = VolumeInventory::build(&[], &[]);
        assert!(inventory.bound.is_empty());
        assert!(inventory.unbound.is_empty());
    }
}
