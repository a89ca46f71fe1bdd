//! Resource aggregation and volume reuse logic
//!
//! [`aggregator`] fetches a consistent snapshot from the cluster gateway;
//! everything else is a pure computation over that snapshot:
//! - [`inventory`]: bound/unbound classification of volumes
//! - [`usage`]: whether a claim is mounted
//! - [`simple`] and [`stateful`]: reusable-volume matching
//! - [`listing`]: every volume with its usage state
//! - [`events`] and [`application`]: pod event correlation

pub mod aggregator;
pub mod application;
pub mod events;
pub mod inventory;
pub mod listing;
pub mod simple;
pub mod stateful;
pub mod usage;

pub use aggregator::{ResourceAggregator, ResourceRequest, ResourceSnapshot};
pub use application::{application_requests, summarize, ApplicationSummary, EventRecord, InvolvedObject};
pub use events::{filter_pod_events, filter_pod_warning_events, EVENT_TYPE_NORMAL, EVENT_TYPE_WARNING};
pub use inventory::VolumeInventory;
pub use listing::list_volumes;
pub use simple::match_simple_workload;
pub use stateful::{match_stateful_workload, split_claim_name, StatefulWorkloadQuery};
pub use usage::{is_claim_in_use, UsageOracle};
