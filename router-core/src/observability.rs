//! # Observability Sinks
//!
//! Write-only collaborators per `spec.md` §6. Structured logging uses
//! `tracing` spans directly (fields `request_id`, `rule_id`) rather than
//! an injected `Logger` object — the teacher's modules call `log`/
//! `tracing` macros inline rather than threading a logger handle, and
//! the core follows suit. Metrics, which do need to be swappable for a
//! real sink, stay behind the `MetricsCollector` trait.

/// A metrics sink: counter increments, gauge sets, histogram
/// observations. `spec.md` §6 lists the concrete series names the core
/// emits; callers are expected to pass those names through unchanged.
pub trait MetricsCollector: Send + Sync {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
    fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// A `MetricsCollector` that discards every observation. Used in tests
/// and as the default when no real sink is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
    fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
    fn observe_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

/// Metric series names emitted by the core, per `spec.md` §6.
pub mod metrics {
    pub const DISPATCH_MODE: &str = "dispatch_mode";
    pub const UPSTREAM_DURATION: &str = "upstream_duration";
    pub const COMPARISON_MATCH_RATE: &str = "comparison_match_rate";
    pub const CIRCUIT_BREAKER_STATE: &str = "circuit_breaker_state";
    pub const TRANSITION: &str = "transition";
    pub const COMPARISON_DROPPED: &str = "comparison_dropped";
    pub const ROUTE_NOT_FOUND: &str = "route_not_found";
}
