//! Cluster Gateway Adapters
//!
//! Provides adapters implementing [`ClusterGateway`]:
//! - Kubernetes: live cluster via `kube::Api`
//! - In-memory: fixture-backed, for tests and benchmarks

pub mod kubernetes;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use kubernetes::*;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::*;

use crate::domain::ports::ClusterGateway;
use crate::error::Result;
use std::sync::Arc;

/// Factory for creating cluster gateways
pub struct GatewayFactory;

impl GatewayFactory {
    /// Connect to the cluster the process is configured for
    pub async fn connect() -> Result<Arc<dyn ClusterGateway>> {
        Ok(Arc::new(KubeGateway::try_default().await?))
    }
}
