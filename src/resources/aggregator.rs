//! Resource Aggregator
//!
//! Fans out one list call per resource kind onto a [`JoinSet`], joins them,
//! and produces a single [`ResourceSnapshot`] or a single error.
//!
//! Errors are reported by request order, not completion order: the call
//! returns as soon as the earliest request that has not succeeded is known to
//! have failed, so a later failure never hides an earlier one. No partial
//! snapshot is ever returned.

use crate::domain::ports::{ClusterGateway, ListScope, ResourceKind};
use crate::error::{Error, Result};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Event, PersistentVolume, PersistentVolumeClaim, Pod};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

// =============================================================================
// Requests
// =============================================================================

/// One list call to fan out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub scope: ListScope,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind, scope: ListScope) -> Self {
        Self { kind, scope }
    }
}

/// A listed collection of one kind
#[derive(Debug)]
enum ResourceList {
    PersistentVolumes(Vec<PersistentVolume>),
    Claims(Vec<PersistentVolumeClaim>),
    Pods(Vec<Pod>),
    Events(Vec<Event>),
    ReplicaSets(Vec<ReplicaSet>),
    Deployments(Vec<Deployment>),
}

impl ResourceList {
    fn len(&self) -> usize {
        match self {
            ResourceList::PersistentVolumes(v) => v.len(),
            ResourceList::Claims(v) => v.len(),
            ResourceList::Pods(v) => v.len(),
            ResourceList::Events(v) => v.len(),
            ResourceList::ReplicaSets(v) => v.len(),
            ResourceList::Deployments(v) => v.len(),
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Joined result of one aggregation
///
/// Kinds that were not requested read as empty.
#[derive(Debug, Clone, Default)]
pub struct ResourceSnapshot {
    persistent_volumes: Option<Vec<PersistentVolume>>,
    claims: Option<Vec<PersistentVolumeClaim>>,
    pods: Option<Vec<Pod>>,
    events: Option<Vec<Event>>,
    replica_sets: Option<Vec<ReplicaSet>>,
    deployments: Option<Vec<Deployment>>,
}

impl ResourceSnapshot {
    pub fn persistent_volumes(&self) -> &[PersistentVolume] {
        self.persistent_volumes.as_deref().unwrap_or_default()
    }

    pub fn claims(&self) -> &[PersistentVolumeClaim] {
        self.claims.as_deref().unwrap_or_default()
    }

    pub fn pods(&self) -> &[Pod] {
        self.pods.as_deref().unwrap_or_default()
    }

    pub fn events(&self) -> &[Event] {
        self.events.as_deref().unwrap_or_default()
    }

    pub fn replica_sets(&self) -> &[ReplicaSet] {
        self.replica_sets.as_deref().unwrap_or_default()
    }

    pub fn deployments(&self) -> &[Deployment] {
        self.deployments.as_deref().unwrap_or_default()
    }

    /// Whether `kind` was part of the aggregation
    pub fn contains(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::PersistentVolume => self.persistent_volumes.is_some(),
            ResourceKind::PersistentVolumeClaim => self.claims.is_some(),
            ResourceKind::Pod => self.pods.is_some(),
            ResourceKind::Event => self.events.is_some(),
            ResourceKind::ReplicaSet => self.replica_sets.is_some(),
            ResourceKind::Deployment => self.deployments.is_some(),
        }
    }

    fn insert(&mut self, list: ResourceList) {
        match list {
            ResourceList::PersistentVolumes(v) => self.persistent_volumes = Some(v),
            ResourceList::Claims(v) => self.claims = Some(v),
            ResourceList::Pods(v) => self.pods = Some(v),
            ResourceList::Events(v) => self.events = Some(v),
            ResourceList::ReplicaSets(v) => self.replica_sets = Some(v),
            ResourceList::Deployments(v) => self.deployments = Some(v),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl ResourceSnapshot {
    /// Snapshot of volumes, claims and pods without going through a gateway
    pub fn from_parts(
        persistent_volumes: Vec<PersistentVolume>,
        claims: Vec<PersistentVolumeClaim>,
        pods: Vec<Pod>,
    ) -> Self {
        Self {
            persistent_volumes: Some(persistent_volumes),
            claims: Some(claims),
            pods: Some(pods),
            ..Default::default()
        }
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = Some(events);
        self
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Concurrent fan-out over a [`ClusterGateway`]
#[derive(Clone)]
pub struct ResourceAggregator {
    gateway: Arc<dyn ClusterGateway>,
    /// Bound on a whole aggregation; `None` waits indefinitely
    timeout: Option<Duration>,
}

impl ResourceAggregator {
    /// Create an aggregator without a deadline
    pub fn new(gateway: Arc<dyn ClusterGateway>) -> Self {
        Self {
            gateway,
            timeout: None,
        }
    }

    /// Bound every aggregation by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch every request concurrently and join the results
    ///
    /// `cancel` is the parent of the token every fetch observes; cancelling
    /// it aborts the whole aggregation with [`Error::Cancelled`].
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub async fn fetch(
        &self,
        requests: &[ResourceRequest],
        cancel: &CancellationToken,
    ) -> Result<ResourceSnapshot> {
        let mut seen = HashSet::with_capacity(requests.len());
        if let Some(dup) = requests.iter().find(|r| !seen.insert(r.kind)) {
            return Err(Error::Configuration(format!(
                "resource kind {} requested more than once",
                dup.kind
            )));
        }

        let group = cancel.child_token();
        let mut tasks = JoinSet::new();
        let mut slot_of: HashMap<task::Id, usize> = HashMap::with_capacity(requests.len());

        for (slot, request) in requests.iter().cloned().enumerate() {
            let gateway = self.gateway.clone();
            let token = group.clone();

            let handle = tasks.spawn(async move {
                let kind = request.kind;
                let result = tokio::select! {
                    _ = token.cancelled() => Err(Error::Cancelled),
                    listed = fetch_one(gateway.as_ref(), &request) => listed,
                };

                if let Ok(list) = &result {
                    debug!(kind = %kind, count = list.len(), "Fetched resource list");
                }

                result
            });
            slot_of.insert(handle.id(), slot);
        }

        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => futures::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut slots: Vec<Option<Result<ResourceList>>> =
            std::iter::repeat_with(|| None).take(requests.len()).collect();

        loop {
            // Earliest request that has not succeeded yet
            match slots.iter().position(|s| !matches!(s, Some(Ok(_)))) {
                None => break,
                Some(slot) if matches!(slots[slot], Some(Err(_))) => {
                    group.cancel();
                    tasks.abort_all();

                    let kind = requests[slot].kind;
                    return match slots[slot].take() {
                        Some(Err(err)) => {
                            warn!(kind = %kind, error = %err, "Resource fetch failed, discarding snapshot");
                            Err(err)
                        }
                        _ => Err(Error::Internal(format!("lost result for {}", kind))),
                    };
                }
                Some(_) => {}
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    debug!("Aggregation cancelled by caller");
                    return Err(Error::Cancelled);
                }
                limit = &mut deadline => {
                    group.cancel();
                    tasks.abort_all();
                    warn!(timeout = ?limit, "Aggregation deadline exceeded");
                    return Err(Error::DeadlineExceeded(limit));
                }
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((id, result))) => {
                        if let Some(&slot) = slot_of.get(&id) {
                            slots[slot] = Some(result);
                        }
                    }
                    Some(Err(e)) => {
                        // A panicked fetch fails its own slot; earlier slots still take precedence
                        let Some(&slot) = slot_of.get(&e.id()) else {
                            return Err(Error::Internal(format!("resource fetch task failed: {}", e)));
                        };
                        slots[slot] = Some(Err(Error::Internal(format!(
                            "fetch of {} failed: {}",
                            requests[slot].kind, e
                        ))));
                    }
                    None => {
                        return Err(Error::Internal("resource fetch tasks ended early".to_string()));
                    }
                },
            }
        }

        let mut snapshot = ResourceSnapshot::default();
        for list in slots.into_iter().flatten() {
            snapshot.insert(list?);
        }

        Ok(snapshot)
    }
}

async fn fetch_one(gateway: &dyn ClusterGateway, request: &ResourceRequest) -> Result<ResourceList> {
    let scope = &request.scope;
    Ok(match request.kind {
        ResourceKind::PersistentVolume => {
            ResourceList::PersistentVolumes(gateway.list_persistent_volumes(scope).await?)
        }
        ResourceKind::PersistentVolumeClaim => {
            ResourceList::Claims(gateway.list_persistent_volume_claims(scope).await?)
        }
        ResourceKind::Pod => ResourceList::Pods(gateway.list_pods(scope).await?),
        ResourceKind::Event => ResourceList::Events(gateway.list_events(scope).await?),
        ResourceKind::ReplicaSet => ResourceList::ReplicaSets(gateway.list_replica_sets(scope).await?),
        ResourceKind::Deployment => ResourceList::Deployments(gateway.list_deployments(scope).await?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::testing::{claim, pod, pv};
    use assert_matches::assert_matches;

    fn gateway() -> Arc<InMemoryGateway> {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.insert_persistent_volume(pv("pv-a", "1Gi"));
        gateway.insert_claim(claim("ns1", "pvc-a", "1Gi"));
        gateway.insert_pod(pod("ns1", "web-0", &["pvc-a"]));
        gateway
    }

    fn requests(kinds: &[ResourceKind]) -> Vec<ResourceRequest> {
        kinds
            .iter()
            .map(|k| ResourceRequest::new(*k, ListScope::all()))
            .collect()
    }

    #[tokio::test]
    async fn test_joins_requested_kinds() {
        let gw = gateway();
        let aggregator = ResourceAggregator::new(gw.clone());

        let snapshot = aggregator
            .fetch(
                &requests(&[
                    ResourceKind::PersistentVolume,
                    ResourceKind::PersistentVolumeClaim,
                    ResourceKind::Pod,
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(snapshot.persistent_volumes().len(), 1);
        assert_eq!(snapshot.claims().len(), 1);
        assert_eq!(snapshot.pods().len(), 1);
        assert!(snapshot.contains(ResourceKind::Pod));
        assert!(!snapshot.contains(ResourceKind::Event));
        assert!(snapshot.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_request_set() {
        let aggregator = ResourceAggregator::new(gateway());
        let snapshot = aggregator
            .fetch(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(ResourceKind::ALL.iter().all(|k| !snapshot.contains(*k)));
    }

    #[tokio::test]
    async fn test_duplicate_kind_rejected_before_launch() {
        let gw = gateway();
        let aggregator = ResourceAggregator::new(gw.clone());

        let err = aggregator
            .fetch(
                &requests(&[ResourceKind::Pod, ResourceKind::Pod]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::Configuration(_));
        assert_eq!(gw.list_calls(ResourceKind::Pod), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_precedence_follows_request_order() {
        let gw = gateway();
        // The first request fails late, the second fails immediately
        gw.delay_list(ResourceKind::Pod, Duration::from_millis(50));
        gw.fail_list(ResourceKind::Pod, 403, "pods is forbidden");
        gw.fail_list(ResourceKind::Event, 500, "etcd unavailable");

        let aggregator = ResourceAggregator::new(gw.clone());
        let err = aggregator
            .fetch(
                &requests(&[ResourceKind::Pod, ResourceKind::Event]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.failed_kind(), Some(ResourceKind::Pod));
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_failure_reported_once_earlier_requests_succeed() {
        let gw = gateway();
        gw.delay_list(ResourceKind::PersistentVolume, Duration::from_millis(50));
        gw.fail_list(ResourceKind::Event, 500, "etcd unavailable");

        let aggregator = ResourceAggregator::new(gw.clone());
        let err = aggregator
            .fetch(
                &requests(&[ResourceKind::PersistentVolume, ResourceKind::Event]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.failed_kind(), Some(ResourceKind::Event));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_fetch_does_not_mask_earlier_failure() {
        let gw = gateway();
        gw.delay_list(ResourceKind::Pod, Duration::from_millis(50));
        gw.fail_list(ResourceKind::Pod, 403, "pods is forbidden");
        gw.panic_list(ResourceKind::Event);

        let aggregator = ResourceAggregator::new(gw.clone());
        let err = aggregator
            .fetch(
                &requests(&[ResourceKind::Pod, ResourceKind::Event]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.failed_kind(), Some(ResourceKind::Pod));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_fetch_reported_as_internal() {
        let gw = gateway();
        gw.delay_list(ResourceKind::PersistentVolume, Duration::from_millis(50));
        gw.panic_list(ResourceKind::Pod);

        let aggregator = ResourceAggregator::new(gw.clone());
        let err = aggregator
            .fetch(
                &requests(&[ResourceKind::PersistentVolume, ResourceKind::Pod]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::Internal(msg) if msg.contains("Pod"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_fast_without_waiting_for_stalled_fetch() {
        let gw = gateway();
        gw.fail_list(ResourceKind::Pod, 403, "pods is forbidden");
        gw.stall_list(ResourceKind::Event);

        let aggregator = ResourceAggregator::new(gw.clone());
        let err = aggregator
            .fetch(
                &requests(&[ResourceKind::Pod, ResourceKind::Event]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.failed_kind(), Some(ResourceKind::Pod));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_stalled_fetch() {
        let gw = gateway();
        gw.stall_list(ResourceKind::PersistentVolume);

        let aggregator =
            ResourceAggregator::new(gw.clone()).with_timeout(Some(Duration::from_secs(5)));
        let err = aggregator
            .fetch(
                &requests(&[ResourceKind::PersistentVolume, ResourceKind::Pod]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::DeadlineExceeded(d) if d == Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancellation() {
        let gw = gateway();
        gw.stall_list(ResourceKind::Pod);

        let aggregator = ResourceAggregator::new(gw.clone());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = aggregator
            .fetch(&requests(&[ResourceKind::Pod]), &cancel)
            .await
            .unwrap_err();

        assert_matches!(err, Error::Cancelled);
    }
}
