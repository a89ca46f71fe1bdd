//! Volume Engine
//!
//! Facade over the cluster gateway. Each public operation:
//! - builds the list requests it needs
//! - fetches them as one snapshot through the [`ResourceAggregator`]
//! - runs a single pure computation over that snapshot
//!
//! Results reflect the snapshot, not the live cluster. Callers that act on
//! them rely on the API server's optimistic concurrency and re-query on
//! conflict.

use crate::config::EngineConfig;
use crate::domain::ports::{ClusterGateway, ListScope, ResourceKind};
use crate::domain::volume::{OwnershipLabels, Volume};
use crate::error::{Error, Result};
use crate::metrics::{EngineMetrics, WORKLOAD_SIMPLE, WORKLOAD_STATEFUL};
use crate::resources::aggregator::{ResourceAggregator, ResourceRequest, ResourceSnapshot};
use crate::resources::application::{application_requests, summarize, ApplicationSummary};
use crate::resources::listing::list_volumes;
use crate::resources::simple::match_simple_workload;
use crate::resources::stateful::{match_stateful_workload, StatefulWorkloadQuery};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Volume reuse engine
pub struct VolumeEngine {
    config: EngineConfig,
    labels: OwnershipLabels,
    gateway: Arc<dyn ClusterGateway>,
    aggregator: ResourceAggregator,
    metrics: EngineMetrics,
    /// Parent of every aggregation's cancellation token
    shutdown: CancellationToken,
}

impl VolumeEngine {
    /// Create a new engine
    pub fn new(config: EngineConfig, gateway: Arc<dyn ClusterGateway>) -> Result<Arc<Self>> {
        let aggregator =
            ResourceAggregator::new(gateway.clone()).with_timeout(config.aggregation_timeout());

        Ok(Arc::new(Self {
            labels: config.ownership_labels(),
            config,
            gateway,
            aggregator,
            metrics: EngineMetrics::new()?,
            shutdown: CancellationToken::new(),
        }))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.gateway_name()
    }

    /// Cancel every in-flight aggregation; later calls fail with [`Error::Cancelled`]
    pub fn shutdown(&self) {
        info!("Cancelling in-flight aggregations");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Volumes a stateless workload in `namespace` can reuse
    #[instrument(skip(self))]
    pub async fn simple_workload_volumes(&self, namespace: &str) -> Result<Vec<Volume>> {
        require("namespace", namespace)?;

        let requests = [
            ResourceKind::PersistentVolume,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::Pod,
        ]
        .map(|kind| ResourceRequest::new(kind, ListScope::all()));

        let snapshot = self.snapshot(&requests).await?;
        let volumes = match_simple_workload(&snapshot, namespace, &self.labels);

        self.metrics.record_reusable(WORKLOAD_SIMPLE, volumes.len());
        info!(namespace, reusable = volumes.len(), "Found reusable volumes for simple workload");
        Ok(volumes)
    }

    /// Claim templates a stateful workload can reuse
    #[instrument(skip(self), fields(namespace = %query.namespace, workload = %query.workload))]
    pub async fn stateful_workload_volumes(&self, query: &StatefulWorkloadQuery) -> Result<Vec<Volume>> {
        require("namespace", &query.namespace)?;
        require("workload name", &query.workload)?;

        let requests = [ResourceKind::PersistentVolumeClaim, ResourceKind::Pod]
            .map(|kind| ResourceRequest::new(kind, ListScope::namespaced(query.namespace.as_str())));

        let snapshot = self.snapshot(&requests).await?;
        let volumes = match_stateful_workload(&snapshot, query);

        self.metrics.record_reusable(WORKLOAD_STATEFUL, volumes.len());
        info!(
            namespace = %query.namespace,
            workload = %query.workload,
            reusable = volumes.len(),
            "Found reusable claim templates for stateful workload"
        );
        Ok(volumes)
    }

    /// Every persistent volume with its usage state
    #[instrument(skip(self))]
    pub async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let requests = [
            ResourceKind::PersistentVolume,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::Pod,
        ]
        .map(|kind| ResourceRequest::new(kind, ListScope::all()));

        let snapshot = self.snapshot(&requests).await?;
        Ok(list_volumes(&snapshot, &self.labels))
    }

    /// Workload objects and pod warnings of an application
    #[instrument(skip(self))]
    pub async fn application_resources(
        &self,
        namespace: &str,
        application: &str,
    ) -> Result<ApplicationSummary> {
        require("namespace", namespace)?;
        require("application name", application)?;

        let requests = application_requests(namespace, &self.config.application_label, application);
        let snapshot = self.snapshot(&requests).await?;
        Ok(summarize(&snapshot, namespace, application))
    }

    async fn snapshot(&self, requests: &[ResourceRequest]) -> Result<ResourceSnapshot> {
        let started = Instant::now();
        let result = self
            .aggregator
            .fetch(requests, &self.shutdown.child_token())
            .await;
        self.metrics.record_aggregation(&result, started.elapsed());

        if let Err(e) = &result {
            warn!(error = %e, transient = e.is_transient(), "Aggregation failed");
        }
        result
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::ApiValidation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::testing::*;
    use assert_matches::assert_matches;

    fn engine_with(gateway: Arc<InMemoryGateway>) -> Arc<VolumeEngine> {
        VolumeEngine::new(EngineConfig::default(), gateway).unwrap()
    }

    fn cluster() -> Arc<InMemoryGateway> {
        let gw = Arc::new(InMemoryGateway::new());
        gw.insert_persistent_volume(bound_pv("pv-a", "1Gi", "ns1", "pvc-a"));
        gw.insert_persistent_volume(pv("pv-free", "5Gi"));
        gw.insert_claim(claim("ns1", "pvc-a", "1Gi"));
        gw.insert_claim(claim("ns1", "data-db-0", "2Gi"));
        gw.insert_claim(claim("ns1", "data-db-1", "2Gi"));
        gw
    }

    #[tokio::test]
    async fn test_simple_workload_volumes() {
        let engine = engine_with(cluster());

        let volumes = engine.simple_workload_volumes("ns1").await.unwrap();

        let names: Vec<_> = volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["pvc-a", "pv-free"]);
        assert!(engine
            .metrics()
            .encode()
            .unwrap()
            .contains(r#"workload_volumes_reusable_total{workload="simple"} 2"#));
    }

    #[tokio::test]
    async fn test_stateful_workload_volumes() {
        let gw = cluster();
        let engine = engine_with(gw.clone());
        let query = StatefulWorkloadQuery::new("ns1", "db");

        let volumes = engine.stateful_workload_volumes(&query).await.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].claim(), Some("data"));

        // Re-query after a replica starts mounting its claim
        gw.insert_pod(pod("ns1", "db-1", &["data-db-1"]));
        let volumes = engine.stateful_workload_volumes(&query).await.unwrap();
        assert!(volumes.is_empty());

        gw.remove_pod("ns1", "db-1");
        let volumes = engine.stateful_workload_volumes(&query).await.unwrap();
        assert_eq!(volumes.len(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_propagated() {
        let gw = cluster();
        gw.fail_list(ResourceKind::Pod, 403, "pods is forbidden");
        let engine = engine_with(gw);

        let err = engine.simple_workload_volumes("ns1").await.unwrap_err();

        assert_matches!(err, Error::ListFailed { kind: ResourceKind::Pod, .. });
        assert!(engine
            .metrics()
            .encode()
            .unwrap()
            .contains(r#"workload_volumes_aggregations_total{outcome="list_failed"} 1"#));
    }

    #[tokio::test]
    async fn test_empty_namespace_rejected_without_listing() {
        let gw = cluster();
        let engine = engine_with(gw.clone());

        let err = engine.simple_workload_volumes("  ").await.unwrap_err();

        assert_matches!(err, Error::ApiValidation(_));
        assert_eq!(gw.list_calls(ResourceKind::PersistentVolume), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_aggregations() {
        let engine = engine_with(cluster());
        engine.shutdown();

        assert!(engine.is_shut_down());
        assert_matches!(engine.list_volumes().await, Err(Error::Cancelled));
    }

    #[tokio::test]
    async fn test_application_resources() {
        let gw = Arc::new(InMemoryGateway::new());
        let label = [("kapp-application", "cart")];
        gw.insert_deployment(deployment("shop", "cart", &label));
        gw.insert_pod(pod_with_labels("shop", "cart-0", &label, &[]));
        gw.insert_event(event("shop", "e1", &pod_uid("shop", "cart-0"), "Warning", "BackOff"));
        let engine = engine_with(gw);

        let summary = engine.application_resources("shop", "cart").await.unwrap();

        assert_eq!(summary.deployments, 1);
        assert_eq!(summary.pods, 1);
        assert_eq!(summary.warnings.len(), 1);
    }
}
