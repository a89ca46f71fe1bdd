//! Workload Volumes - Storage Reuse Engine
//!
//! Finds idle persistent volumes and claims on a Kubernetes cluster that a
//! new or replaced application workload can reuse, on top of a concurrent
//! resource-aggregation layer that fetches consistent cluster snapshots.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                             REST API (axum)                                 │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                              Volume Engine                                  │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │  Simple Matcher │  │ Stateful Matcher│  │  Listing / App Summary      │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! │           │                    │                         │                  │
//! │  ┌────────┴────────────────────┴───────┐  ┌──────────────┴───────────────┐  │
//! │  │  Volume Inventory  ·  Usage Oracle  │  │       Event Correlator       │  │
//! │  └──────────────────┬──────────────────┘  └──────────────┬───────────────┘  │
//! │                     └──────────────┬─────────────────────┘                  │
//! │                        ┌───────────┴───────────┐                            │
//! │                        │  Resource Aggregator  │                            │
//! │                        │  (JoinSet fan-out)    │                            │
//! │                        └───────────┬───────────┘                            │
//! ├────────────────────────────────────┼────────────────────────────────────────┤
//! │                       Cluster Gateway (port)                                │
//! │  ┌─────────────────────────────┐  ┌─────────────────────────────────────┐   │
//! │  │     Kubernetes (kube)       │  │      In-memory (tests/benches)      │   │
//! │  └─────────────────────────────┘  └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: Volume engine facade and REST API
//! - [`resources`]: Aggregation and the pure matching logic
//! - [`gateway`]: Cluster gateway adapters
//! - [`domain`]: Core domain types and the gateway port
//! - [`config`]: Engine configuration
//! - [`metrics`]: Prometheus metrics
//! - [`error`]: Error types and handling

pub mod config;
pub mod controlplane;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod resources;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types
pub use config::EngineConfig;

pub use controlplane::{ApiServer, ApiServerConfig, RestRouter, VolumeEngine};

pub use domain::ports::{ClusterGateway, ListScope, ResourceKind};
pub use domain::volume::{ComponentOwner, OwnershipLabels, ReuseTarget, Volume, VolumePair};

pub use error::{Error, Result};

pub use gateway::{GatewayFactory, KubeGateway};
#[cfg(any(test, feature = "test-utils"))]
pub use gateway::InMemoryGateway;

pub use metrics::EngineMetrics;

pub use resources::{
    ApplicationSummary, EventRecord, ResourceAggregator, ResourceRequest, ResourceSnapshot,
    StatefulWorkloadQuery,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
