//! In-memory cluster gateway
//!
//! Holds cluster objects in memory so the engine can be exercised without a
//! Kubernetes cluster. Failures, delays, stalls and panics can be injected per kind.

use crate::domain::ports::{ClusterGateway, ListScope, ResourceKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Event, PersistentVolume, PersistentVolumeClaim, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use kube::Resource;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Default)]
struct ClusterState {
    persistent_volumes: Vec<PersistentVolume>,
    claims: Vec<PersistentVolumeClaim>,
    pods: Vec<Pod>,
    events: Vec<Event>,
    replica_sets: Vec<ReplicaSet>,
    deployments: Vec<Deployment>,
    failures: HashMap<ResourceKind, (u16, String)>,
    delays: HashMap<ResourceKind, Duration>,
    stalled: HashSet<ResourceKind>,
    panicking: HashSet<ResourceKind>,
    calls: Vec<ResourceKind>,
}

/// Kinds the in-memory gateway stores
trait Stored: Resource + Clone {
    const KIND: ResourceKind;
    fn stored(state: &ClusterState) -> &Vec<Self>;
}

macro_rules! stored {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Stored for $ty {
            const KIND: ResourceKind = ResourceKind::$kind;
            fn stored(state: &ClusterState) -> &Vec<Self> {
                &state.$field
            }
        }
    };
}

stored!(PersistentVolume, PersistentVolume, persistent_volumes);
stored!(PersistentVolumeClaim, PersistentVolumeClaim, claims);
stored!(Pod, Pod, pods);
stored!(Event, Event, events);
stored!(ReplicaSet, ReplicaSet, replica_sets);
stored!(Deployment, Deployment, deployments);

/// A gateway that serves objects from memory
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<ClusterState>,
}

impl InMemoryGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_persistent_volume(&self, pv: PersistentVolume) {
        self.state.lock().persistent_volumes.push(pv);
    }

    pub fn insert_claim(&self, pvc: PersistentVolumeClaim) {
        self.state.lock().claims.push(pvc);
    }

    pub fn insert_pod(&self, pod: Pod) {
        self.state.lock().pods.push(pod);
    }

    pub fn insert_event(&self, event: Event) {
        self.state.lock().events.push(event);
    }

    pub fn insert_replica_set(&self, rs: ReplicaSet) {
        self.state.lock().replica_sets.push(rs);
    }

    pub fn insert_deployment(&self, deployment: Deployment) {
        self.state.lock().deployments.push(deployment);
    }

    /// Remove every pod with the given name and namespace
    pub fn remove_pod(&self, namespace: &str, name: &str) {
        self.state.lock().pods.retain(|p| {
            p.metadata.namespace.as_deref() != Some(namespace)
                || p.metadata.name.as_deref() != Some(name)
        });
    }

    /// Make every list of `kind` fail with an API error
    pub fn fail_list(&self, kind: ResourceKind, code: u16, message: impl Into<String>) {
        self.state.lock().failures.insert(kind, (code, message.into()));
    }

    /// Make list calls of `kind` succeed again
    pub fn clear_failure(&self, kind: ResourceKind) {
        self.state.lock().failures.remove(&kind);
    }

    /// Delay list calls of `kind` before they answer
    pub fn delay_list(&self, kind: ResourceKind, delay: Duration) {
        self.state.lock().delays.insert(kind, delay);
    }

    /// Make list calls of `kind` never complete
    pub fn stall_list(&self, kind: ResourceKind) {
        self.state.lock().stalled.insert(kind);
    }

    /// Make list calls of `kind` panic once any delay has passed
    pub fn panic_list(&self, kind: ResourceKind) {
        self.state.lock().panicking.insert(kind);
    }

    /// Number of list calls made for `kind`
    pub fn list_calls(&self, kind: ResourceKind) -> usize {
        self.state.lock().calls.iter().filter(|k| **k == kind).count()
    }

    async fn list<K: Stored>(&self, scope: &ListScope) -> Result<Vec<K>> {
        let kind = K::KIND;
        let (failure, delay, stalled, panics) = {
            let mut state = self.state.lock();
            state.calls.push(kind);
            (
                state.failures.get(&kind).cloned(),
                state.delays.get(&kind).copied(),
                state.stalled.contains(&kind),
                state.panicking.contains(&kind),
            )
        };

        if stalled {
            futures::future::pending::<()>().await;
        }

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if panics {
            panic!("list of {} panicked", kind);
        }

        if let Some((code, message)) = failure {
            return Err(Error::ListFailed {
                kind,
                source: kube::Error::Api(ErrorResponse {
                    status: "Failure".to_string(),
                    message,
                    reason: reason_for(code).to_string(),
                    code,
                }),
            });
        }

        let state = self.state.lock();
        Ok(K::stored(&state)
            .iter()
            .filter(|obj| in_scope(obj.meta(), scope, kind.is_namespaced()))
            .cloned()
            .collect())
    }
}

fn reason_for(code: u16) -> &'static str {
    match code {
        403 => "Forbidden",
        404 => "NotFound",
        409 => "Conflict",
        429 => "TooManyRequests",
        _ => "InternalError",
    }
}

fn in_scope(meta: &ObjectMeta, scope: &ListScope, namespaced: bool) -> bool {
    if namespaced {
        if let Some(ns) = scope.namespace.as_deref() {
            if meta.namespace.as_deref() != Some(ns) {
                return false;
            }
        }
    }

    match scope.label_selector.as_deref() {
        Some(selector) => selector_matches(selector, meta),
        None => true,
    }
}

/// Equality-based selectors only: `k=v`, `k==v`, `k!=v`
fn selector_matches(selector: &str, meta: &ObjectMeta) -> bool {
    let label = |key: &str| meta.labels.as_ref().and_then(|l| l.get(key.trim()));

    selector
        .split(',')
        .map(str::trim)
        .filter(|req| !req.is_empty())
        .all(|req| {
            if let Some((key, value)) = req.split_once("!=") {
                label(key).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = req.split_once("==").or_else(|| req.split_once('=')) {
                label(key).map(String::as_str) == Some(value.trim())
            } else {
                label(req).is_some()
            }
        })
}

#[async_trait]
impl ClusterGateway for InMemoryGateway {
    async fn list_persistent_volumes(&self, scope: &ListScope) -> Result<Vec<PersistentVolume>> {
        self.list(scope).await
    }

    async fn list_persistent_volume_claims(
        &self,
        scope: &ListScope,
    ) -> Result<Vec<PersistentVolumeClaim>> {
        self.list(scope).await
    }

    async fn list_pods(&self, scope: &ListScope) -> Result<Vec<Pod>> {
        self.list(scope).await
    }

    async fn list_events(&self, scope: &ListScope) -> Result<Vec<Event>> {
        self.list(scope).await
    }

    async fn list_replica_sets(&self, scope: &ListScope) -> Result<Vec<ReplicaSet>> {
        self.list(scope).await
    }

    async fn list_deployments(&self, scope: &ListScope) -> Result<Vec<Deployment>> {
        self.list(scope).await
    }

    fn gateway_name(&self) -> &str {
        "in-memory"
    }
}
