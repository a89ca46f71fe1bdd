//! Event Correlator

use k8s_openapi::api::core::v1::{Event, Pod};
use std::collections::HashSet;

/// Event type reported for abnormal conditions
pub const EVENT_TYPE_WARNING: &str = "Warning";

/// Event type reported for routine conditions
pub const EVENT_TYPE_NORMAL: &str = "Normal";

/// Events whose involved object is one of `pods`, optionally of one type
///
/// Pods are matched by uid; pods without a uid never match.
pub fn filter_pod_events(events: &[Event], pods: &[Pod], event_type: Option<&str>) -> Vec<Event> {
    if events.is_empty() || pods.is_empty() {
        return Vec::new();
    }

    let uids: HashSet<&str> = pods
        .iter()
        .filter_map(|p| p.metadata.uid.as_deref())
        .filter(|uid| !uid.is_empty())
        .collect();

    events
        .iter()
        .filter(|e| {
            e.involved_object
                .uid
                .as_deref()
                .is_some_and(|uid| uids.contains(uid))
        })
        .filter(|e| event_type.map_or(true, |t| e.type_.as_deref() == Some(t)))
        .cloned()
        .collect()
}

/// Warning events of `pods`
pub fn filter_pod_warning_events(events: &[Event], pods: &[Pod]) -> Vec<Event> {
    filter_pod_events(events, pods, Some(EVENT_TYPE_WARNING))
}
