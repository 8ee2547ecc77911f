//! # Process Metrics Sink
//!
//! `router_core::observability::MetricsCollector` is the seam; this
//! implementation emits every observation as a `tracing` event rather
//! than pushing to a real time-series backend, matching the teacher's
//! own posture of logging rather than wiring a metrics exporter. A real
//! deployment would swap this for a Prometheus/StatsD sink behind the
//! same trait.

use router_core::observability::MetricsCollector;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsCollector;

fn labels_string(labels: &[(&str, &str)]) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl MetricsCollector for TracingMetricsCollector {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        tracing::debug!(metric = name, labels = %labels_string(labels), kind = "counter");
    }

    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        tracing::debug!(metric = name, value, labels = %labels_string(labels), kind = "gauge");
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        tracing::debug!(metric = name, value, labels = %labels_string(labels), kind = "histogram");
    }
}
