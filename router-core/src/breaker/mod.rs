//! # CircuitBreaker
//!
//! Per-endpoint failure-rate tripping with three states (`spec.md`
//! §4.5): Closed (traffic flows, failures counted), Open (fail-fast,
//! network untouched), HalfOpen (limited probes after `open_timeout`).
//! Breaker identity is per `endpoint_id`, so the same endpoint
//! referenced by multiple rules shares one state — `BreakerRegistry`
//! keeps that single state behind a short critical section, with the
//! rolling counters themselves kept minimal to stay cheap under high
//! concurrency.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::error::CoreError;
use crate::observability::{metrics, MetricsCollector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Outcome {
    at: Instant,
    success: bool,
}

struct BreakerInner {
    state: BreakerState,
    window: VecDeque<Outcome>,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_probes_in_flight: u32,
    half_open_probes_seen: u32,
    half_open_failed: bool,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            window: VecDeque::new(),
            consecutive_failures: 0,
            opened_at: None,
            half_open_probes_in_flight: 0,
            half_open_probes_seen: 0,
            half_open_failed: false,
        }
    }

    fn prune(&mut self, interval: Duration, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.duration_since(front.at) > interval {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

fn state_value(state: BreakerState) -> f64 {
    match state {
        BreakerState::Closed => 0.0,
        BreakerState::HalfOpen => 1.0,
        BreakerState::Open => 2.0,
    }
}

/// A single endpoint's breaker state machine.
pub struct CircuitBreaker {
    endpoint_id: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    metrics: Arc<dyn MetricsCollector>,
}

impl CircuitBreaker {
    pub fn new(endpoint_id: impl Into<String>, config: CircuitBreakerConfig, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
            metrics,
        }
    }

    fn report_state(&self, state: BreakerState) {
        self.metrics.set_gauge(
            metrics::CIRCUIT_BREAKER_STATE,
            state_value(state),
            &[("endpoint_id", self.endpoint_id.as_str())],
        );
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        self.transition_if_due(&mut inner);
        inner.state
    }

    /// Call this before invoking the network. Returns `Err(BreakerOpen)`
    /// without touching the network if the breaker is tripped, or
    /// admits the call (incrementing the half-open probe counter if
    /// applicable).
    pub fn admit(&self) -> Result<BreakerPermit<'_>, CoreError> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        self.transition_if_due(&mut inner);

        match inner.state {
            BreakerState::Open => Err(CoreError::BreakerOpen {
                endpoint_id: self.endpoint_id.clone(),
            }),
            BreakerState::HalfOpen => {
                if inner.half_open_probes_in_flight >= self.config.max_probe_requests {
                    return Err(CoreError::BreakerOpen {
                        endpoint_id: self.endpoint_id.clone(),
                    });
                }
                inner.half_open_probes_in_flight += 1;
                Ok(BreakerPermit { breaker: self })
            }
            BreakerState::Closed => Ok(BreakerPermit { breaker: self }),
        }
    }

    fn transition_if_due(&self, inner: &mut BreakerInner) {
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_probes_in_flight = 0;
                    inner.half_open_probes_seen = 0;
                    inner.half_open_failed = false;
                    self.report_state(BreakerState::HalfOpen);
                }
            }
        }
    }

    fn record(&self, success: bool) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let now = Instant::now();

        match inner.state {
            BreakerState::HalfOpen => {
                inner.half_open_probes_in_flight = inner.half_open_probes_in_flight.saturating_sub(1);
                inner.half_open_probes_seen += 1;
                if !success {
                    inner.half_open_failed = true;
                }
                let probe_round_done = inner.half_open_probes_seen >= self.config.max_probe_requests
                    || inner.half_open_probes_in_flight == 0 && inner.half_open_probes_seen > 0;
                if probe_round_done {
                    if inner.half_open_failed {
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(now);
                        self.report_state(BreakerState::Open);
                    } else {
                        inner.state = BreakerState::Closed;
                        inner.window.clear();
                        inner.consecutive_failures = 0;
                        self.report_state(BreakerState::Closed);
                    }
                }
            }
            BreakerState::Closed => {
                inner.window.push_back(Outcome { at: now, success });
                inner.prune(self.config.interval, now);

                if success {
                    inner.consecutive_failures = 0;
                } else {
                    inner.consecutive_failures += 1;
                }

                let total = inner.window.len() as u32;
                let failures = inner.window.iter().filter(|o| !o.success).count() as u32;
                let ratio_tripped = total >= self.config.max_requests
                    && (failures as f64 / total as f64) >= self.config.failure_ratio_threshold;
                let consecutive_tripped =
                    inner.consecutive_failures >= self.config.consecutive_failure_threshold;

                if ratio_tripped || consecutive_tripped {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                    self.report_state(BreakerState::Open);
                }
            }
            BreakerState::Open => {
                // Outcomes recorded while already open (e.g. a race with
                // transition_if_due) don't change anything further.
            }
        }
    }
}

/// RAII-ish guard returned by `admit`: callers must report the outcome
/// through `succeeded`/`failed` exactly once.
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
}

impl<'a> BreakerPermit<'a> {
    pub fn succeeded(self) {
        self.breaker.record(true);
    }

    pub fn failed(self) {
        self.breaker.record(false);
    }
}

/// Shares one [`CircuitBreaker`] per `endpoint_id` across every rule
/// that references it.
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    metrics: Arc<dyn MetricsCollector>,
}

impl BreakerRegistry {
    pub fn new(metrics: Arc<dyn MetricsCollector>) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    pub fn get_or_create(&self, endpoint_id: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        breakers
            .entry(endpoint_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(endpoint_id, config.clone(), self.metrics.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_requests: 5,
            interval: Duration::from_secs(10),
            timeout: Duration::from_millis(20),
            failure_ratio_threshold: 0.6,
            consecutive_failure_threshold: 5,
            max_probe_requests: 2,
        }
    }

    #[test]
    fn trips_after_five_consecutive_failures() {
        let breaker = CircuitBreaker::new("e1", config(), Arc::new(crate::observability::NoopMetricsCollector));
        for _ in 0..5 {
            let permit = breaker.admit().unwrap();
            permit.failed();
        }
        assert!(matches!(breaker.admit(), Err(CoreError::BreakerOpen { .. })));
    }

    #[test]
    fn recovers_after_timeout_and_one_successful_probe() {
        let breaker = CircuitBreaker::new("e1", config(), Arc::new(crate::observability::NoopMetricsCollector));
        for _ in 0..5 {
            breaker.admit().unwrap().failed();
        }
        assert!(breaker.admit().is_err());

        std::thread::sleep(Duration::from_millis(30));
        let permit = breaker.admit().expect("half-open should admit a probe");
        permit.succeeded();

        let permit = breaker.admit().expect("closed again, should admit");
        permit.succeeded();
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("e1", config(), Arc::new(crate::observability::NoopMetricsCollector));
        for _ in 0..5 {
            breaker.admit().unwrap().failed();
        }
        std::thread::sleep(Duration::from_millis(30));
        let permit = breaker.admit().unwrap();
        permit.failed();

        assert!(matches!(breaker.admit(), Err(CoreError::BreakerOpen { .. })));
    }

    #[test]
    fn registry_shares_state_per_endpoint() {
        let registry = BreakerRegistry::new(Arc::new(crate::observability::NoopMetricsCollector));
        let cfg = config();
        let a = registry.get_or_create("e1", &cfg);
        let b = registry.get_or_create("e1", &cfg);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
