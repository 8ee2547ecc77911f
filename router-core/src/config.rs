//! # Core Configuration
//!
//! `CoreConfig` mirrors `spec.md` §6 exactly: every default documented
//! there is reproduced here via `Default`. `router-api` deserializes
//! this from the process's YAML config file (the teacher's own
//! `serde_yaml` dependency) merged with environment overrides, rather
//! than through the teacher's `mini-config` key/value store — this
//! config is nested and structural, which a plain serde struct fits
//! better than a flat KV registry. See `DESIGN.md` for that decision.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub rule_cache: RuleCacheConfig,
    pub background_executor: BackgroundExecutorConfig,
    pub comparison: ComparisonDefaults,
    pub circuit_breaker: CircuitBreakerConfig,
    pub upstream: UpstreamConfig,
    pub transition: TransitionGuardConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            rule_cache: RuleCacheConfig::default(),
            background_executor: BackgroundExecutorConfig::default(),
            comparison: ComparisonDefaults::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            upstream: UpstreamConfig::default(),
            transition: TransitionGuardConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleCacheConfig {
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl Default for RuleCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundExecutorConfig {
    pub workers: usize,
    pub queue_size: usize,
}

impl Default for BackgroundExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonDefaults {
    pub default_ignore_fields: Vec<String>,
    pub default_allowable_numeric_difference: f64,
    pub array_element_cap: usize,
}

impl Default for ComparisonDefaults {
    fn default() -> Self {
        Self {
            default_ignore_fields: vec![
                "timestamp".to_string(),
                "requestId".to_string(),
                "request_id".to_string(),
            ],
            default_allowable_numeric_difference: 0.01,
            array_element_cap: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub max_requests: u32,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub failure_ratio_threshold: f64,
    pub consecutive_failure_threshold: u32,
    pub max_probe_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
            failure_ratio_threshold: 0.6,
            consecutive_failure_threshold: 5,
            max_probe_requests: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPoolConfig {
    pub max_idle_connections_total: usize,
    pub max_idle_connections_per_host: usize,
    pub max_connections_per_host: usize,
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,
    pub keep_alive: bool,
    pub prefer_http2: bool,
    pub response_header_limit_bytes: usize,
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_connections_total: 200,
            max_idle_connections_per_host: 50,
            max_connections_per_host: 100,
            idle_timeout: Duration::from_secs(90),
            keep_alive: true,
            prefer_http2: true,
            response_header_limit_bytes: 1024 * 1024,
            read_buffer_bytes: 32 * 1024,
            write_buffer_bytes: 32 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub connection_pool: ConnectionPoolConfig,
    /// Linear backoff base delay: attempt *k* sleeps `k * base_delay`.
    #[serde(with = "duration_secs")]
    pub retry_base_delay: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connection_pool: ConnectionPoolConfig::default(),
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionGuardConfig {
    #[serde(with = "duration_secs")]
    pub flap_guard_interval: Duration,
}

impl Default for TransitionGuardConfig {
    fn default() -> Self {
        Self {
            flap_guard_interval: Duration::from_secs(60),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.rule_cache.ttl, Duration::from_secs(60));
        assert_eq!(cfg.background_executor.workers, 8);
        assert_eq!(cfg.background_executor.queue_size, 1024);
        assert_eq!(cfg.comparison.array_element_cap, 10);
        assert_eq!(cfg.circuit_breaker.max_requests, 5);
        assert_eq!(cfg.circuit_breaker.failure_ratio_threshold, 0.6);
        assert_eq!(cfg.transition.flap_guard_interval, Duration::from_secs(60));
    }

    #[test]
    fn round_trips_through_yaml() {
        let cfg = CoreConfig::default();
        let yaml = serde_yaml_stub_serialize(&cfg);
        assert!(yaml.contains("workers"));
    }

    // Avoids a serde_yaml dev-dependency purely for this smoke test;
    // router-api exercises the real round trip against its config file.
    fn serde_yaml_stub_serialize(cfg: &CoreConfig) -> String {
        serde_json::to_string(cfg).unwrap()
    }
}
