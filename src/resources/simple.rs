//! Simple-Workload Volume Matcher
//!
//! Finds storage a stateless workload in a target namespace can reuse
//! instead of provisioning fresh volumes.
//!
//! Output order:
//! 1. idle claims in the target namespace (reuse the claim)
//! 2. idle claims elsewhere whose volume is retained (reuse the volume)
//! 3. unbound volumes (reuse the volume)
//!
//! Within each group the order of the source listing is kept.

use crate::domain::volume::{
    claim_capacity, name_of, namespace_of, volume_capacity, ComponentOwner, OwnershipLabels,
    ReuseTarget, Volume, VolumePair,
};
use crate::resources::aggregator::ResourceSnapshot;
use crate::resources::inventory::VolumeInventory;
use crate::resources::usage::UsageOracle;
use k8s_openapi::api::core::v1::PersistentVolume;
use tracing::debug;

/// Reclaim policy that keeps a volume after its claim is released
pub const RECLAIM_RETAIN: &str = "Retain";

/// Whether a released volume may be bound by a claim in another namespace
///
/// An unset policy reads as the API default, `Retain`.
pub fn allows_cross_namespace_rebind(pv: &PersistentVolume) -> bool {
    pv.spec
        .as_ref()
        .and_then(|s| s.persistent_volume_reclaim_policy.as_deref())
        .map_or(true, |policy| policy == RECLAIM_RETAIN)
}

/// Reusable volumes for a stateless workload in `namespace`
///
/// Needs persistent volumes, claims and pods in `snapshot`, all
/// cluster-wide.
pub fn match_simple_workload(
    snapshot: &ResourceSnapshot,
    namespace: &str,
    labels: &OwnershipLabels,
) -> Vec<Volume> {
    let inventory = VolumeInventory::build(snapshot.persistent_volumes(), snapshot.claims());
    let oracle = UsageOracle::new(snapshot.pods());

    let (same_ns, other_ns): (Vec<VolumePair<'_>>, Vec<VolumePair<'_>>) = inventory
        .bound
        .iter()
        .copied()
        .filter(|pair| !oracle.is_in_use(pair.pvc))
        .partition(|pair| namespace_of(&pair.pvc.metadata) == namespace);

    let mut rejected = 0usize;
    let retained: Vec<VolumePair<'_>> = other_ns
        .into_iter()
        .filter(|pair| {
            let ok = allows_cross_namespace_rebind(pair.pv);
            if !ok {
                rejected += 1;
            }
            ok
        })
        .collect();

    debug!(
        namespace,
        same_namespace = same_ns.len(),
        cross_namespace = retained.len(),
        cross_namespace_rejected = rejected,
        unbound = inventory.unbound.len(),
        "Matched reusable volumes for simple workload"
    );

    let mut volumes = Vec::with_capacity(same_ns.len() + retained.len() + inventory.unbound.len());

    for pair in same_ns {
        let claim = name_of(&pair.pvc.metadata).to_string();
        volumes.push(Volume {
            name: claim.clone(),
            namespace: Some(namespace.to_string()),
            in_use: false,
            owner: ComponentOwner::of_volume(pair.pv, labels),
            capacity: claim_capacity(pair.pvc),
            reuse: ReuseTarget::Claim(claim),
        });
    }

    for pair in retained {
        volumes.push(Volume {
            name: name_of(&pair.pvc.metadata).to_string(),
            namespace: None,
            in_use: false,
            owner: ComponentOwner::of_volume(pair.pv, labels),
            capacity: claim_capacity(pair.pvc),
            reuse: ReuseTarget::Volume(name_of(&pair.pv.metadata).to_string()),
        });
    }

    for pv in inventory.unbound {
        let name = name_of(&pv.metadata).to_string();
        volumes.push(Volume {
            name: name.clone(),
            namespace: None,
            in_use: false,
            owner: ComponentOwner::of_volume(pv, labels),
            capacity: volume_capacity(pv),
            reuse: ReuseTarget::Volume(name),
        });
    }

    volumes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{ListScope, ResourceKind};
    use crate::gateway::InMemoryGateway;
    use crate::resources::aggregator::{ResourceAggregator, ResourceRequest};
    use crate::testing::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn snapshot_of(gateway: InMemoryGateway) -> ResourceSnapshot {
        let requests = [
            ResourceKind::PersistentVolume,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::Pod,
        ]
        .map(|k| ResourceRequest::new(k, ListScope::all()));

        ResourceAggregator::new(Arc::new(gateway))
            .fetch(&requests, &CancellationToken::new())
            .await
            .unwrap()
    }

    fn labels() -> OwnershipLabels {
        OwnershipLabels::default()
    }

    #[tokio::test]
    async fn test_idle_same_namespace_claim_reused() {
        let gw = InMemoryGateway::new();
        gw.insert_persistent_volume(bound_pv("pv-a", "1Gi", "ns1", "pvc-a"));
        gw.insert_claim(claim("ns1", "pvc-a", "1Gi"));

        let snapshot = snapshot_of(gw).await;
        let volumes = match_simple_workload(&snapshot, "ns1", &labels());

        assert_eq!(volumes.len(), 1);
        let json = serde_json::to_value(&volumes[0]).unwrap();
        assert_eq!(json["name"], "pvc-a");
        assert_eq!(json["isInUse"], false);
        assert_eq!(json["pvc"], "pvc-a");
        assert_eq!(json["pv"], "");
        assert_eq!(json["capacity"], "1Gi");
    }

    #[tokio::test]
    async fn test_all_unbound_volumes_reused_by_volume() {
        let gw = InMemoryGateway::new();
        for i in 0..4 {
            gw.insert_persistent_volume(pv(&format!("pv-{}", i), "10Gi"));
        }

        let snapshot = snapshot_of(gw).await;
        let volumes = match_simple_workload(&snapshot, "anywhere", &labels());

        assert_eq!(volumes.len(), 4);
        for (i, vol) in volumes.iter().enumerate() {
            let name = format!("pv-{}", i);
            assert_eq!(vol.persistent_volume(), Some(name.as_str()));
            assert_eq!(vol.claim(), None);
            assert_eq!(vol.capacity, "10Gi");
        }
    }

    #[tokio::test]
    async fn test_mounted_claims_excluded() {
        let gw = InMemoryGateway::new();
        gw.insert_persistent_volume(bound_pv("pv-a", "1Gi", "ns1", "pvc-a"));
        gw.insert_persistent_volume(bound_pv("pv-b", "1Gi", "ns1", "pvc-b"));
        gw.insert_claim(claim("ns1", "pvc-a", "1Gi"));
        gw.insert_claim(claim("ns1", "pvc-b", "1Gi"));
        gw.insert_pod(pod("ns1", "web-0", &["pvc-b"]));

        let snapshot = snapshot_of(gw).await;
        let volumes = match_simple_workload(&snapshot, "ns1", &labels());

        let names: Vec<_> = volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["pvc-a"]);
        assert!(volumes.iter().all(|v| !v.in_use));
    }

    #[tokio::test]
    async fn test_namespace_split_orders_claims_before_volumes() {
        let gw = InMemoryGateway::new();
        // Interleave source order to check grouping
        gw.insert_persistent_volume(bound_pv("pv-x1", "1Gi", "other", "x1"));
        gw.insert_persistent_volume(bound_pv("pv-s1", "1Gi", "ns1", "s1"));
        gw.insert_persistent_volume(pv("pv-free", "3Gi"));
        gw.insert_persistent_volume(bound_pv("pv-x2", "1Gi", "other", "x2"));
        gw.insert_persistent_volume(bound_pv("pv-s2", "1Gi", "ns1", "s2"));
        for (ns, name) in [("other", "x1"), ("ns1", "s1"), ("other", "x2"), ("ns1", "s2")] {
            gw.insert_claim(claim(ns, name, "1Gi"));
        }

        let snapshot = snapshot_of(gw).await;
        let volumes = match_simple_workload(&snapshot, "ns1", &labels());

        let shape: Vec<_> = volumes
            .iter()
            .map(|v| (v.claim().unwrap_or("-"), v.persistent_volume().unwrap_or("-")))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("s1", "-"),
                ("s2", "-"),
                ("-", "pv-x1"),
                ("-", "pv-x2"),
                ("-", "pv-free"),
            ]
        );
        // Cross-namespace records are named by their claim
        assert_eq!(volumes[2].name, "x1");
    }

    #[tokio::test]
    async fn test_cross_namespace_requires_retain_policy() {
        let gw = InMemoryGateway::new();
        gw.insert_persistent_volume(with_reclaim_policy(
            bound_pv("pv-del", "1Gi", "other", "del"),
            "Delete",
        ));
        gw.insert_persistent_volume(with_reclaim_policy(
            bound_pv("pv-keep", "1Gi", "other", "keep"),
            "Retain",
        ));
        gw.insert_claim(claim("other", "del", "1Gi"));
        gw.insert_claim(claim("other", "keep", "1Gi"));

        let snapshot = snapshot_of(gw).await;
        let volumes = match_simple_workload(&snapshot, "ns1", &labels());

        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].persistent_volume(), Some("pv-keep"));
    }

    #[tokio::test]
    async fn test_owner_labels_copied() {
        let gw = InMemoryGateway::new();
        gw.insert_persistent_volume(with_volume_labels(
            pv("pv-a", "1Gi"),
            &[("kapp-component", "db"), ("kapp-namespace", "shop")],
        ));

        let snapshot = snapshot_of(gw).await;
        let volumes = match_simple_workload(&snapshot, "ns1", &labels());

        assert_eq!(volumes[0].owner.name.as_deref(), Some("db"));
        assert_eq!(volumes[0].owner.namespace.as_deref(), Some("shop"));
    }

    #[tokio::test]
    async fn test_no_duplicates_and_idempotent() {
        let gw = InMemoryGateway::new();
        gw.insert_persistent_volume(bound_pv("pv-a", "1Gi", "ns1", "pvc-a"));
        gw.insert_persistent_volume(bound_pv("pv-b", "1Gi", "ns2", "pvc-b"));
        gw.insert_persistent_volume(bound_pv("pv-c", "1Gi", "ns1", "gone"));
        gw.insert_persistent_volume(pv("pv-d", "1Gi"));
        gw.insert_claim(claim("ns1", "pvc-a", "1Gi"));
        gw.insert_claim(claim("ns2", "pvc-b", "1Gi"));

        let snapshot = snapshot_of(gw).await;
        let first = match_simple_workload(&snapshot, "ns1", &labels());
        let second = match_simple_workload(&snapshot, "ns1", &labels());
        assert_eq!(first, second);

        let mut seen = HashSet::new();
        for vol in &first {
            let key = vol.claim().or(vol.persistent_volume()).unwrap().to_string();
            assert!(seen.insert(key), "duplicate reuse target");
        }
        // pv-c's claim is gone, so it is offered as an unbound volume
        assert_eq!(first.last().and_then(|v| v.persistent_volume()), Some("pv-d"));
        assert_eq!(first.len(), 4);
    }

    #[tokio::test]
    async fn test_stale_reference_does_not_duplicate_claim() {
        let gw = InMemoryGateway::new();
        gw.insert_persistent_volume(with_claim_ref_uid(bound_pv("pv-old", "1Gi", "ns1", "data"), "uid-gone"));
        gw.insert_persistent_volume(with_claim_ref_uid(bound_pv("pv-new", "2Gi", "ns1", "data"), "uid-live"));
        gw.insert_claim(with_volume_name(
            with_claim_uid(claim("ns1", "data", "2Gi"), "uid-live"),
            "pv-new",
        ));

        let snapshot = snapshot_of(gw).await;
        let volumes = match_simple_workload(&snapshot, "ns1", &labels());

        let claims: Vec<_> = volumes.iter().filter_map(|v| v.claim()).collect();
        assert_eq!(claims, vec!["data"]);
        assert_eq!(volumes[0].capacity, "2Gi");
        // pv-old lost its claim and is offered as an unbound volume
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[1].persistent_volume(), Some("pv-old"));
    }
}
