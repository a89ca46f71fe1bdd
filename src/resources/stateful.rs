//! Stateful-Workload Volume Matcher
//!
//! A stateful workload `<name>` with a claim template `<template>` owns claims
//! named `<template>-<name>-<ordinal>`. A template is reusable only when none
//! of its claims is mounted; reuse is granted per template, never per ordinal.

use crate::domain::volume::{claim_capacity, name_of, namespace_of, ComponentOwner, ReuseTarget, Volume};
use crate::resources::aggregator::ResourceSnapshot;
use crate::resources::usage::UsageOracle;
use indexmap::IndexMap;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which stateful workload to match claims for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulWorkloadQuery {
    pub namespace: String,
    pub workload: String,
    /// Replica count, when known. Claims with ordinals outside
    /// `0..replicas` are not members of the workload.
    #[serde(default)]
    pub replicas: Option<u32>,
}

impl StatefulWorkloadQuery {
    pub fn new(namespace: impl Into<String>, workload: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            workload: workload.into(),
            replicas: None,
        }
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// `ordinal` is a string of ASCII digits; too large for `u32` is never below the count
    fn admits(&self, ordinal: &str) -> bool {
        match self.replicas {
            None => true,
            Some(n) => ordinal.parse::<u32>().map_or(false, |o| o < n),
        }
    }
}

/// Split `<template>-<workload>-<ordinal>` into template and ordinal digits
///
/// The last occurrence of `-<workload>-` is the split point. Matching is
/// exact and case-sensitive. The ordinal is any non-empty run of ASCII
/// digits, whatever its magnitude.
pub fn split_claim_name<'n>(claim: &'n str, workload: &str) -> Option<(&'n str, &'n str)> {
    if workload.is_empty() {
        return None;
    }

    let marker = format!("-{}-", workload);
    let split = claim.rfind(&marker)?;
    let template = &claim[..split];
    let ordinal = &claim[split + marker.len()..];

    if template.is_empty() || ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((template, ordinal))
}

struct TemplateClaims<'a> {
    first: &'a PersistentVolumeClaim,
    in_use: bool,
}

/// Reusable claim templates for a stateful workload
///
/// Needs claims and pods of the query namespace in `snapshot`.
pub fn match_stateful_workload(snapshot: &ResourceSnapshot, query: &StatefulWorkloadQuery) -> Vec<Volume> {
    let oracle = UsageOracle::new(snapshot.pods());
    let mut templates: IndexMap<&str, TemplateClaims<'_>> = IndexMap::new();

    for pvc in snapshot.claims() {
        if namespace_of(&pvc.metadata) != query.namespace {
            continue;
        }

        let Some((template, ordinal)) = split_claim_name(name_of(&pvc.metadata), &query.workload) else {
            continue;
        };

        if !query.admits(ordinal) {
            debug!(claim = name_of(&pvc.metadata), ordinal, "Claim ordinal outside replica range");
            continue;
        }

        let in_use = oracle.is_in_use(pvc);
        templates
            .entry(template)
            .and_modify(|t| t.in_use |= in_use)
            .or_insert(TemplateClaims { first: pvc, in_use });
    }

    let total = templates.len();
    let volumes: Vec<Volume> = templates
        .into_iter()
        .filter(|(_, claims)| !claims.in_use)
        .map(|(template, claims)| Volume {
            name: template.to_string(),
            namespace: Some(query.namespace.clone()),
            in_use: false,
            owner: ComponentOwner::default(),
            capacity: claim_capacity(claims.first),
            reuse: ReuseTarget::Claim(template.to_string()),
        })
        .collect();

    debug!(
        namespace = %query.namespace,
        workload = %query.workload,
        templates = total,
        reusable = volumes.len(),
        "Matched reusable claim templates for stateful workload"
    );

    volumes
}
