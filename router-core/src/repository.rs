//! # Repository Interfaces
//!
//! The core never touches persistent storage directly — `spec.md` §1
//! names storage an external collaborator. These traits are the seam;
//! `router-api` provides SQLite-backed implementations, tests provide
//! in-memory ones. All polymorphism here is through explicit capability
//! interfaces, matching `spec.md` §9's note that there is no
//! source-language-specific interface inheritance to preserve.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{APIComparison, Endpoint, OrchestrationRule, RoutingRule};
use crate::error::CoreResult;

#[async_trait]
pub trait RoutingRuleRepository: Send + Sync {
    /// All active rules whose coarse indexes plausibly match this
    /// `method:path`, ordered by ascending priority and, for ties, by
    /// ascending creation time.
    async fn find_matching(&self, method: &str, path: &str) -> CoreResult<Vec<RoutingRule>>;
    async fn get(&self, rule_id: &str) -> CoreResult<Option<RoutingRule>>;
    async fn create(&self, rule: RoutingRule) -> CoreResult<()>;
    async fn update(&self, rule: RoutingRule) -> CoreResult<()>;
    async fn delete(&self, rule_id: &str) -> CoreResult<()>;
}

#[async_trait]
pub trait EndpointRepository: Send + Sync {
    async fn find_by_id(&self, endpoint_id: &str) -> CoreResult<Option<Endpoint>>;
    async fn find_default_legacy(&self) -> CoreResult<Option<Endpoint>>;
    async fn find_default_modern(&self) -> CoreResult<Option<Endpoint>>;
    async fn list_active(&self) -> CoreResult<Vec<Endpoint>>;
}

#[async_trait]
pub trait OrchestrationRepository: Send + Sync {
    async fn find_by_rule_id(&self, rule_id: &str) -> CoreResult<Option<OrchestrationRule>>;
    async fn update(&self, rule: OrchestrationRule) -> CoreResult<()>;
}

#[async_trait]
pub trait ComparisonRepository: Send + Sync {
    async fn save(&self, comparison: APIComparison) -> CoreResult<()>;
    /// Descending by timestamp, most recent first.
    async fn find_recent(&self, rule_id: &str, limit: usize) -> CoreResult<Vec<APIComparison>>;
    async fn statistics(
        &self,
        rule_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<ComparisonStatistics>;
}

/// Aggregate statistics over a time window, as surfaced by the admin
/// API's `/comparisons/{rule_id}` endpoint.
#[derive(Debug, Clone, Default)]
pub struct ComparisonStatistics {
    pub sample_count: u64,
    pub mean_match_rate: f64,
    pub min_match_rate: f64,
    pub max_match_rate: f64,
}
