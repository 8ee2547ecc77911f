//! Wire-level request/response shapes for the admin CRUD surface.
//!
//! `router_core::domain` types are not `Serialize`/`Deserialize` (they
//! carry internals like `RoutingRule`'s compiled-regex cache), so every
//! admin handler round-trips through one of these instead.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use router_core::domain::{ComparisonConfig, Endpoint, Mode, OrchestrationRule, RoutingRule, TransitionConfig};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct RoutingRuleDto {
    pub rule_id: String,
    pub name: String,
    pub path_pattern: String,
    pub method_pattern: String,
    #[serde(default)]
    pub header_match: HashMap<String, String>,
    #[serde(default)]
    pub query_match: HashMap<String, String>,
    pub priority: i64,
    pub is_active: bool,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: Option<u64>,
    pub legacy_endpoint_id: String,
    pub modern_endpoint_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl From<&RoutingRule> for RoutingRuleDto {
    fn from(r: &RoutingRule) -> Self {
        Self {
            rule_id: r.rule_id.clone(),
            name: r.name.clone(),
            path_pattern: r.path_pattern.clone(),
            method_pattern: r.method_pattern.clone(),
            header_match: r.header_match.clone(),
            query_match: r.query_match.clone(),
            priority: r.priority,
            is_active: r.is_active,
            cache_enabled: r.cache_enabled,
            cache_ttl_seconds: r.cache_ttl_seconds,
            legacy_endpoint_id: r.legacy_endpoint_id.clone(),
            modern_endpoint_id: r.modern_endpoint_id.clone(),
            created_at: r.created_at,
        }
    }
}

impl From<RoutingRuleDto> for RoutingRule {
    fn from(d: RoutingRuleDto) -> Self {
        RoutingRule::new(
            d.rule_id,
            d.name,
            d.path_pattern,
            d.method_pattern,
            d.header_match,
            d.query_match,
            d.priority,
            d.is_active,
            d.cache_enabled,
            d.cache_ttl_seconds,
            d.legacy_endpoint_id,
            d.modern_endpoint_id,
            d.created_at,
        )
    }
}

#[derive(Serialize, Deserialize)]
pub struct EndpointDto {
    pub endpoint_id: String,
    pub base_url: String,
    pub health_probe_path: Option<String>,
    pub is_active: bool,
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub is_legacy: bool,
    pub is_default: bool,
}

impl From<&Endpoint> for EndpointDto {
    fn from(e: &Endpoint) -> Self {
        Self {
            endpoint_id: e.endpoint_id.clone(),
            base_url: e.base_url.clone(),
            health_probe_path: e.health_probe_path.clone(),
            is_active: e.is_active,
            timeout_ms: e.timeout.as_millis() as u64,
            retry_count: e.retry_count,
            is_legacy: e.is_legacy,
            is_default: e.is_default,
        }
    }
}

impl From<EndpointDto> for Endpoint {
    fn from(d: EndpointDto) -> Self {
        Endpoint {
            endpoint_id: d.endpoint_id,
            base_url: d.base_url,
            health_probe_path: d.health_probe_path,
            is_active: d.is_active,
            timeout: std::time::Duration::from_millis(d.timeout_ms),
            retry_count: d.retry_count,
            is_legacy: d.is_legacy,
            is_default: d.is_default,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct TransitionConfigDto {
    pub auto_enabled: bool,
    pub match_rate_threshold: f64,
    pub stability_period_secs: u64,
    pub min_requests_for_transition: usize,
    pub rollback_threshold: f64,
}

impl From<&TransitionConfig> for TransitionConfigDto {
    fn from(c: &TransitionConfig) -> Self {
        Self {
            auto_enabled: c.auto_enabled,
            match_rate_threshold: c.match_rate_threshold,
            stability_period_secs: c.stability_period.as_secs(),
            min_requests_for_transition: c.min_requests_for_transition,
            rollback_threshold: c.rollback_threshold,
        }
    }
}

impl From<TransitionConfigDto> for TransitionConfig {
    fn from(d: TransitionConfigDto) -> Self {
        Self {
            auto_enabled: d.auto_enabled,
            match_rate_threshold: d.match_rate_threshold,
            stability_period: std::time::Duration::from_secs(d.stability_period_secs),
            min_requests_for_transition: d.min_requests_for_transition,
            rollback_threshold: d.rollback_threshold,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ComparisonConfigDto {
    pub enabled: bool,
    pub ignore_fields: Vec<String>,
    pub allowable_numeric_difference: f64,
    pub strict_mode: bool,
    pub save_history: bool,
}

impl From<&ComparisonConfig> for ComparisonConfigDto {
    fn from(c: &ComparisonConfig) -> Self {
        Self {
            enabled: c.enabled,
            ignore_fields: c.ignore_fields.clone(),
            allowable_numeric_difference: c.allowable_numeric_difference,
            strict_mode: c.strict_mode,
            save_history: c.save_history,
        }
    }
}

impl From<ComparisonConfigDto> for ComparisonConfig {
    fn from(d: ComparisonConfigDto) -> Self {
        Self {
            enabled: d.enabled,
            ignore_fields: d.ignore_fields,
            allowable_numeric_difference: d.allowable_numeric_difference,
            strict_mode: d.strict_mode,
            save_history: d.save_history,
        }
    }
}

#[derive(Serialize)]
pub struct OrchestrationRuleDto {
    pub rule_id: String,
    pub mode: Mode,
    pub transition: TransitionConfigDto,
    pub comparison: ComparisonConfigDto,
    pub last_mode_change: Option<DateTime<Utc>>,
}

impl From<&OrchestrationRule> for OrchestrationRuleDto {
    fn from(o: &OrchestrationRule) -> Self {
        Self {
            rule_id: o.rule_id.clone(),
            mode: o.mode,
            transition: TransitionConfigDto::from(&o.transition),
            comparison: ComparisonConfigDto::from(&o.comparison),
            last_mode_change: o.last_mode_change,
        }
    }
}

#[derive(Deserialize)]
pub struct SetModeRequest {
    pub mode: Mode,
}

#[derive(Deserialize)]
pub struct UpdateOrchestrationRequest {
    pub mode: Option<Mode>,
    pub transition: Option<TransitionConfigDto>,
    pub comparison: Option<ComparisonConfigDto>,
}

#[derive(Serialize)]
pub struct DiffEntryDto {
    pub kind: String,
    pub path: String,
    pub legacy_value: Option<serde_json::Value>,
    pub modern_value: Option<serde_json::Value>,
    pub message: Option<String>,
}

impl From<&router_core::domain::DiffEntry> for DiffEntryDto {
    fn from(d: &router_core::domain::DiffEntry) -> Self {
        Self {
            kind: format!("{:?}", d.kind),
            path: d.path.clone(),
            legacy_value: d.legacy_value.clone(),
            modern_value: d.modern_value.clone(),
            message: d.message.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct ComparisonDto {
    pub comparison_id: String,
    pub request_id: String,
    pub rule_id: String,
    pub match_rate: f64,
    pub is_successful: bool,
    pub compared_fields: u64,
    pub matched_fields: u64,
    pub duration_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub diffs: Vec<DiffEntryDto>,
}

impl From<&router_core::domain::APIComparison> for ComparisonDto {
    fn from(c: &router_core::domain::APIComparison) -> Self {
        Self {
            comparison_id: c.comparison_id.clone(),
            request_id: c.request_id.clone(),
            rule_id: c.rule_id.clone(),
            match_rate: c.match_rate,
            is_successful: c.is_successful(),
            compared_fields: c.compared_fields,
            matched_fields: c.matched_fields,
            duration_ms: c.duration.as_millis(),
            timestamp: c.timestamp,
            diffs: c.diffs.iter().map(DiffEntryDto::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ComparisonStatisticsDto {
    pub sample_count: u64,
    pub mean_match_rate: f64,
    pub min_match_rate: f64,
    pub max_match_rate: f64,
}

impl From<router_core::repository::ComparisonStatistics> for ComparisonStatisticsDto {
    fn from(s: router_core::repository::ComparisonStatistics) -> Self {
        Self {
            sample_count: s.sample_count,
            mean_match_rate: s.mean_match_rate,
            min_match_rate: s.min_match_rate,
            max_match_rate: s.max_match_rate,
        }
    }
}
