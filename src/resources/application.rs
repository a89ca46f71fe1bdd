//! Application Resource Summary
//!
//! Collects the workload objects labelled as belonging to an application and
//! reports the warning events raised against its pods.

use crate::domain::ports::{ListScope, ResourceKind};
use crate::resources::aggregator::{ResourceRequest, ResourceSnapshot};
use crate::resources::events::filter_pod_warning_events;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, ObjectReference};
use serde::{Deserialize, Serialize};

/// Object an event was reported about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedObject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

impl From<&ObjectReference> for InvolvedObject {
    fn from(r: &ObjectReference) -> Self {
        Self {
            kind: r.kind.clone().unwrap_or_default(),
            namespace: r.namespace.clone().unwrap_or_default(),
            name: r.name.clone().unwrap_or_default(),
            uid: r.uid.clone().unwrap_or_default(),
        }
    }
}

/// Serializable view of a cluster event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub reason: String,
    pub message: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub involved_object: InvolvedObject,
    pub count: i32,
    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl From<&Event> for EventRecord {
    fn from(e: &Event) -> Self {
        Self {
            reason: e.reason.clone().unwrap_or_default(),
            message: e.message.clone().unwrap_or_default(),
            event_type: e.type_.clone().unwrap_or_default(),
            involved_object: InvolvedObject::from(&e.involved_object),
            count: e.count.unwrap_or(1),
            last_timestamp: e.last_timestamp.as_ref().map(|t| t.0),
        }
    }
}

/// Workload objects and pod warnings of one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub namespace: String,
    pub application: String,
    pub deployments: usize,
    pub replica_sets: usize,
    pub pods: usize,
    pub warnings: Vec<EventRecord>,
}

/// List calls needed to summarize `application` in `namespace`
///
/// Workload kinds are selected by `label=application`; events are listed for
/// the whole namespace and correlated afterwards.
pub fn application_requests(namespace: &str, label: &str, application: &str) -> Vec<ResourceRequest> {
    let selected = ListScope::namespaced(namespace).with_label(label, application);

    vec![
        ResourceRequest::new(ResourceKind::Deployment, selected.clone()),
        ResourceRequest::new(ResourceKind::ReplicaSet, selected.clone()),
        ResourceRequest::new(ResourceKind::Pod, selected),
        ResourceRequest::new(ResourceKind::Event, ListScope::namespaced(namespace)),
    ]
}

/// Summarize a snapshot fetched with [`application_requests`]
pub fn summarize(snapshot: &ResourceSnapshot, namespace: &str, application: &str) -> ApplicationSummary {
    let warnings = filter_pod_warning_events(snapshot.events(), snapshot.pods())
        .iter()
        .map(EventRecord::from)
        .collect();

    ApplicationSummary {
        namespace: namespace.to_string(),
        application: application.to_string(),
        deployments: snapshot.deployments().len(),
        replica_sets: snapshot.replica_sets().len(),
        pods: snapshot.pods().len(),
        warnings,
    }
}
