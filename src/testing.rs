//! Object builders for tests and benchmarks

use crate::domain::volume::STORAGE_RESOURCE;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{
    Event, ObjectReference, PersistentVolume, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PersistentVolumeSpec, Pod,
    PodSpec, Volume as PodVolume, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::BTreeMap;

fn storage(capacity: &str) -> BTreeMap<String, Quantity> {
    [(STORAGE_RESOURCE.to_string(), Quantity(capacity.to_string()))]
        .into_iter()
        .collect()
}

fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// Uid assigned to pods built here
pub fn pod_uid(namespace: &str, name: &str) -> String {
    format!("uid-{}-{}", namespace, name)
}

/// Unbound persistent volume
pub fn pv(name: &str, capacity: &str) -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            capacity: Some(storage(capacity)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Persistent volume whose claim reference points at `namespace/claim`
pub fn bound_pv(name: &str, capacity: &str, namespace: &str, claim: &str) -> PersistentVolume {
    let mut volume = pv(name, capacity);
    if let Some(spec) = volume.spec.as_mut() {
        spec.claim_ref = Some(ObjectReference {
            kind: Some("PersistentVolumeClaim".to_string()),
            namespace: Some(namespace.to_string()),
            name: Some(claim.to_string()),
            ..Default::default()
        });
    }
    volume
}

/// Set the reclaim policy of a volume
pub fn with_reclaim_policy(mut volume: PersistentVolume, policy: &str) -> PersistentVolume {
    if let Some(spec) = volume.spec.as_mut() {
        spec.persistent_volume_reclaim_policy = Some(policy.to_string());
    }
    volume
}

/// Set the uid recorded in a volume's claim reference
pub fn with_claim_ref_uid(mut volume: PersistentVolume, uid: &str) -> PersistentVolume {
    if let Some(reference) = volume.spec.as_mut().and_then(|s| s.claim_ref.as_mut()) {
        reference.uid = Some(uid.to_string());
    }
    volume
}

/// Attach labels to a volume
pub fn with_volume_labels(mut volume: PersistentVolume, pairs: &[(&str, &str)]) -> PersistentVolume {
    volume.metadata.labels = labels(pairs);
    volume
}

/// Claim requesting `capacity`
pub fn claim(namespace: &str, name: &str, capacity: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            resources: Some(VolumeResourceRequirements {
                requests: Some(storage(capacity)),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Set a claim's uid
pub fn with_claim_uid(mut pvc: PersistentVolumeClaim, uid: &str) -> PersistentVolumeClaim {
    pvc.metadata.uid = Some(uid.to_string());
    pvc
}

/// Record the volume a claim is bound to
pub fn with_volume_name(mut pvc: PersistentVolumeClaim, volume: &str) -> PersistentVolumeClaim {
    if let Some(spec) = pvc.spec.as_mut() {
        spec.volume_name = Some(volume.to_string());
    }
    pvc
}

/// Pod mounting the named claims
pub fn pod(namespace: &str, name: &str, claims: &[&str]) -> Pod {
    pod_with_labels(namespace, name, &[], claims)
}

/// Labelled pod mounting the named claims
pub fn pod_with_labels(
    namespace: &str,
    name: &str,
    pairs: &[(&str, &str)],
    claims: &[&str],
) -> Pod {
    let volumes = claims
        .iter()
        .enumerate()
        .map(|(i, claim)| PodVolume {
            name: format!("vol-{}", i),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.to_string(),
                read_only: None,
            }),
            ..Default::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(pod_uid(namespace, name)),
            labels: labels(pairs),
            ..Default::default()
        },
        spec: Some(PodSpec {
            volumes: Some(volumes),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Event about the object with `uid`
pub fn event(namespace: &str, name: &str, uid: &str, type_: &str, reason: &str) -> Event {
    Event {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some("Pod".to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        type_: Some(type_.to_string()),
        reason: Some(reason.to_string()),
        message: Some(format!("{} happened", reason)),
        count: Some(1),
        last_timestamp: Some(Time(chrono::Utc::now())),
        ..Default::default()
    }
}

/// Labelled deployment
pub fn deployment(namespace: &str, name: &str, pairs: &[(&str, &str)]) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: labels(pairs),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Labelled replica set
pub fn replica_set(namespace: &str, name: &str, pairs: &[(&str, &str)]) -> ReplicaSet {
    ReplicaSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: labels(pairs),
            ..Default::default()
        },
        ..Default::default()
    }
}
