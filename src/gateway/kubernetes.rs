//! Kubernetes API Gateway
//!
//! Lists cluster objects through `kube::Api`, using in-cluster config or
//! kubeconfig.

use crate::domain::ports::{ClusterGateway, ListScope, ResourceKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Event, PersistentVolume, PersistentVolumeClaim, Pod};
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Gateway backed by a live Kubernetes client
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    /// Connect using in-cluster config or the local kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// Api handle for a namespaced kind, cluster-wide when no namespace is set
    fn scoped_api<K>(&self, scope: &ListScope) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match scope.namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Run one list call and tag failures with the kind
async fn list_items<K>(kind: ResourceKind, api: Api<K>, scope: &ListScope) -> Result<Vec<K>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let list = api
        .list(&scope.list_params())
        .await
        .map_err(|source| Error::ListFailed { kind, source })?;

    debug!(
        kind = %kind,
        namespace = scope.namespace.as_deref().unwrap_or("*"),
        count = list.items.len(),
        "Listed cluster objects"
    );

    Ok(list.items)
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_persistent_volumes(&self, scope: &ListScope) -> Result<Vec<PersistentVolume>> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        list_items(ResourceKind::PersistentVolume, api, scope).await
    }

    async fn list_persistent_volume_claims(
        &self,
        scope: &ListScope,
    ) -> Result<Vec<PersistentVolumeClaim>> {
        let api = self.scoped_api::<PersistentVolumeClaim>(scope);
        list_items(ResourceKind::PersistentVolumeClaim, api, scope).await
    }

    async fn list_pods(&self, scope: &ListScope) -> Result<Vec<Pod>> {
        let api = self.scoped_api::<Pod>(scope);
        list_items(ResourceKind::Pod, api, scope).await
    }

    async fn list_events(&self, scope: &ListScope) -> Result<Vec<Event>> {
        let api = self.scoped_api::<Event>(scope);
        list_items(ResourceKind::Event, api, scope).await
    }

    async fn list_replica_sets(&self, scope: &ListScope) -> Result<Vec<ReplicaSet>> {
        let api = self.scoped_api::<ReplicaSet>(scope);
        list_items(ResourceKind::ReplicaSet, api, scope).await
    }

    async fn list_deployments(&self, scope: &ListScope) -> Result<Vec<Deployment>> {
        let api = self.scoped_api::<Deployment>(scope);
        list_items(ResourceKind::Deployment, api, scope).await
    }

    fn gateway_name(&self) -> &str {
        "kubernetes"
    }
}
