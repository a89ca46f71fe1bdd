//! Prometheus Metrics
//!
//! Metrics tracked:
//! - `workload_volumes_aggregations_total` - counter of aggregations by outcome
//! - `workload_volumes_aggregation_duration_seconds` - histogram of aggregation times
//! - `workload_volumes_reusable_total` - counter of reusable volumes emitted by workload type
//!
//! Metrics live in a registry owned by the engine rather than the process-wide
//! default registry, so several engines can coexist in one process.

use crate::error::{Error, Result};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Outcome label for a successful aggregation
pub const OUTCOME_OK: &str = "ok";

/// Workload label values for `workload_volumes_reusable_total`
pub const WORKLOAD_SIMPLE: &str = "simple";
pub const WORKLOAD_STATEFUL: &str = "stateful";

/// Engine metrics and the registry they are exported from
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    aggregations: IntCounterVec,
    aggregation_duration: Histogram,
    reusable: IntCounterVec,
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let aggregations = IntCounterVec::new(
            Opts::new(
                "workload_volumes_aggregations_total",
                "Total number of resource aggregations by outcome",
            ),
            &["outcome"],
        )
        .map_err(metrics_error)?;

        let aggregation_duration = Histogram::with_opts(HistogramOpts::new(
            "workload_volumes_aggregation_duration_seconds",
            "Duration of resource aggregations in seconds",
        ))
        .map_err(metrics_error)?;

        let reusable = IntCounterVec::new(
            Opts::new(
                "workload_volumes_reusable_total",
                "Total number of reusable volumes reported by workload type",
            ),
            &["workload"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(aggregations.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(aggregation_duration.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(reusable.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            aggregations,
            aggregation_duration,
            reusable,
        })
    }

    /// Record one finished aggregation
    pub fn record_aggregation<T>(&self, result: &Result<T>, elapsed: Duration) {
        let outcome = match result {
            Ok(_) => OUTCOME_OK,
            Err(e) => outcome_of(e),
        };
        self.aggregations.with_label_values(&[outcome]).inc();
        self.aggregation_duration.observe(elapsed.as_secs_f64());
    }

    /// Record volumes offered for reuse
    pub fn record_reusable(&self, workload: &str, count: usize) {
        self.reusable
            .with_label_values(&[workload])
            .inc_by(count as u64);
    }

    /// Render every metric in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics are not UTF-8: {}", e)))
    }
}

fn outcome_of(error: &Error) -> &'static str {
    match error {
        Error::Cancelled => "cancelled",
        Error::DeadlineExceeded(_) => "deadline_exceeded",
        Error::ListFailed { .. } | Error::Kube(_) => "list_failed",
        _ => "error",
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_outcomes() {
        let metrics = EngineMetrics::new().unwrap();

        metrics.record_aggregation(&Ok(()), Duration::from_millis(5));
        metrics.record_aggregation::<()>(&Err(Error::Cancelled), Duration::from_millis(1));
        metrics.record_reusable(WORKLOAD_SIMPLE, 3);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"workload_volumes_aggregations_total{outcome="ok"} 1"#));
        assert!(text.contains(r#"workload_volumes_aggregations_total{outcome="cancelled"} 1"#));
        assert!(text.contains("workload_volumes_aggregation_duration_seconds_count 2"));
        assert!(text.contains(r#"workload_volumes_reusable_total{workload="simple"} 3"#));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.record_reusable(WORKLOAD_STATEFUL, 1);

        assert!(!b.encode().unwrap().contains("workload=\"stateful\""));
    }
}
