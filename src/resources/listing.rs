//! Volume Listing
//!
//! Every persistent volume in the cluster as a [`Volume`] record carrying its
//! real usage state.

use crate::domain::volume::{
    name_of, namespace_of, volume_capacity, ComponentOwner, OwnershipLabels, ReuseTarget, Volume,
};
use crate::resources::aggregator::ResourceSnapshot;
use crate::resources::inventory::VolumeInventory;
use crate::resources::usage::UsageOracle;
use std::collections::HashMap;

/// All volumes in source order
///
/// Needs persistent volumes, claims and pods in `snapshot`. Bound volumes are
/// identified by their claim, unbound ones by the volume itself.
pub fn list_volumes(snapshot: &ResourceSnapshot, labels: &OwnershipLabels) -> Vec<Volume> {
    let inventory = VolumeInventory::build(snapshot.persistent_volumes(), snapshot.claims());
    let oracle = UsageOracle::new(snapshot.pods());

    let bound: HashMap<&str, _> = inventory
        .bound
        .iter()
        .map(|pair| (name_of(&pair.pv.metadata), pair.pvc))
        .collect();

    snapshot
        .persistent_volumes()
        .iter()
        .map(|pv| {
            let pv_name = name_of(&pv.metadata);
            let owner = ComponentOwner::of_volume(pv, labels);
            let capacity = volume_capacity(pv);

            match bound.get(pv_name) {
                Some(pvc) => Volume {
                    name: pv_name.to_string(),
                    namespace: Some(namespace_of(&pvc.metadata).to_string()),
                    in_use: oracle.is_in_use(pvc),
                    owner,
                    capacity,
                    reuse: ReuseTarget::Claim(name_of(&pvc.metadata).to_string()),
                },
                None => Volume {
                    name: pv_name.to_string(),
                    namespace: None,
                    in_use: false,
                    owner,
                    capacity,
                    reuse: ReuseTarget::Volume(pv_name.to_string()),
                },
            }
        })
        .collect()
}
