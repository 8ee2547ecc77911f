//! # TransitionEvaluator
//!
//! Rolling statistics per rule, threshold-and-stability check, mode
//! change application (`spec.md` §4.7). Runs off the dispatch hot path,
//! invoked by [`crate::background::BackgroundExecutor`] after a
//! comparison is recorded. Mode changes are linearized per `rule_id` by
//! an async mutex so overlapping evaluations for the same rule never
//! race each other or apply two changes out of order.
//!
//! Rollback (MODERN_ONLY → PARALLEL) is implemented here exactly as
//! specified, but note the caveat `spec.md` §8 itself raises: once a
//! rule is MODERN_ONLY, the dispatcher no longer calls the legacy side,
//! so no new comparisons accumulate to drive an automatic rollback in
//! ordinary operation. The check below still fires if comparisons exist
//! (e.g. an operator-triggered shadow sampling), but the common path
//! back from MODERN_ONLY is the manual `orchestration set-mode` CLI
//! command — see `DESIGN.md`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::RuleCache;
use crate::domain::Mode;
use crate::error::CoreResult;
use crate::observability::{metrics, MetricsCollector};
use crate::repository::{ComparisonRepository, OrchestrationRepository};

/// Records which way a rule moved, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
}

pub struct TransitionEvaluator {
    comparisons: Arc<dyn ComparisonRepository>,
    orchestration: Arc<dyn OrchestrationRepository>,
    rule_cache: Arc<RuleCache>,
    metrics: Arc<dyn MetricsCollector>,
    flap_guard_interval: Duration,
    per_rule_locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TransitionEvaluator {
    pub fn new(
        comparisons: Arc<dyn ComparisonRepository>,
        orchestration: Arc<dyn OrchestrationRepository>,
        rule_cache: Arc<RuleCache>,
        metrics: Arc<dyn MetricsCollector>,
        flap_guard_interval: Duration,
    ) -> Self {
        Self {
            comparisons,
            orchestration,
            rule_cache,
            metrics,
            flap_guard_interval,
            per_rule_locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, rule_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.per_rule_locks.lock().expect("transition lock map poisoned");
        locks
            .entry(rule_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Evaluates and, if warranted, applies a mode change for `rule_id`.
    /// Returns `Ok(None)` when no change is warranted — including when
    /// there's no orchestration record, auto-transition is disabled, the
    /// rule is `LEGACY_ONLY`, the sample is too small, the flap guard is
    /// still active, or the stability period hasn't elapsed.
    pub async fn evaluate(&self, rule_id: &str) -> CoreResult<Option<ModeChange>> {
        let lock = self.lock_for(rule_id);
        let _guard = lock.lock().await;

        let Some(mut rule) = self.orchestration.find_by_rule_id(rule_id).await? else {
            return Ok(None);
        };

        if !rule.transition.auto_enabled || rule.mode == Mode::LegacyOnly {
            return Ok(None);
        }

        let now = Utc::now();

        if let Some(last_change) = rule.last_mode_change {
            let elapsed = now.signed_duration_since(last_change);
            if elapsed < chrono::Duration::from_std(self.flap_guard_interval).unwrap_or_default() {
                return Ok(None);
            }
        }

        let min_requests = rule.transition.min_requests_for_transition;
        let recent = self
            .comparisons
            .find_recent(rule_id, min_requests)
            .await?;

        if recent.len() < min_requests {
            return Ok(None);
        }

        let mean: f64 = recent.iter().map(|c| c.match_rate).sum::<f64>() / recent.len() as f64;

        let decision = match rule.mode {
            Mode::Parallel => {
                let oldest = recent.iter().map(|c| c.timestamp).min().expect("non-empty");
                let stability_start = now
                    - chrono::Duration::from_std(rule.transition.stability_period).unwrap_or_default();
                if mean >= rule.transition.match_rate_threshold && oldest >= stability_start {
                    Some(Mode::ModernOnly)
                } else {
                    None
                }
            }
            Mode::ModernOnly => {
                if mean < rule.transition.rollback_threshold {
                    Some(Mode::Parallel)
                } else {
                    None
                }
            }
            Mode::LegacyOnly => None,
        };

        let Some(to) = decision else {
            return Ok(None);
        };

        let from = rule.mode;
        rule.mode = to;
        rule.last_mode_change = Some(now);
        self.orchestration.update(rule).await?;
        self.rule_cache.invalidate_rule(rule_id);

        self.metrics.increment_counter(
            metrics::TRANSITION,
            &[("from", mode_label(from)), ("to", mode_label(to))],
        );
        tracing::info!(rule_id, from = mode_label(from), to = mode_label(to), "orchestration mode changed");

        Ok(Some(ModeChange { from, to }))
    }
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::LegacyOnly => "legacy_only",
        Mode::ModernOnly => "modern_only",
        Mode::Parallel => "parallel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{APIComparison, OrchestrationRule};
    use crate::observability::NoopMetricsCollector;
    use crate::repository::ComparisonStatistics;
    use async_trait::async_trait;
    use std::sync::Mutex as StdSyncMutex;
    use std::time::Duration as StdDuration;

    struct FakeComparisons(StdSyncMutex<Vec<APIComparison>>);

    #[async_trait]
    impl ComparisonRepository for FakeComparisons {
        async fn save(&self, comparison: APIComparison) -> CoreResult<()> {
            self.0.lock().unwrap().push(comparison);
            Ok(())
        }
        async fn find_recent(&self, _rule_id: &str, limit: usize) -> CoreResult<Vec<APIComparison>> {
            let all = self.0.lock().unwrap();
            let mut sorted = all.clone();
            sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            sorted.truncate(limit);
            Ok(sorted)
        }
        async fn statistics(
            &self,
            _rule_id: &str,
            _from: chrono::DateTime<Utc>,
            _to: chrono::DateTime<Utc>,
        ) -> CoreResult<ComparisonStatistics> {
            Ok(ComparisonStatistics::default())
        }
    }

    struct FakeOrchestration(StdSyncMutex<Option<OrchestrationRule>>);

    #[async_trait]
    impl OrchestrationRepository for FakeOrchestration {
        async fn find_by_rule_id(&self, _rule_id: &str) -> CoreResult<Option<OrchestrationRule>> {
            Ok(self.0.lock().unwrap().clone())
        }
        async fn update(&self, rule: OrchestrationRule) -> CoreResult<()> {
            *self.0.lock().unwrap() = Some(rule);
            Ok(())
        }
    }

    fn comparison(match_rate: f64, timestamp: chrono::DateTime<Utc>) -> APIComparison {
        APIComparison {
            comparison_id: uuid::Uuid::new_v4().to_string(),
            request_id: "r".to_string(),
            rule_id: "rule1".to_string(),
            legacy_response: None,
            modern_response: None,
            match_rate,
            diffs: vec![],
            compared_fields: 1,
            matched_fields: 1,
            duration: StdDuration::from_millis(1),
            timestamp,
        }
    }

    fn evaluator(
        comparisons: Vec<APIComparison>,
        orchestration: OrchestrationRule,
    ) -> (TransitionEvaluator, Arc<FakeOrchestration>) {
        let comparisons_repo = Arc::new(FakeComparisons(StdSyncMutex::new(comparisons)));
        let orchestration_repo = Arc::new(FakeOrchestration(StdSyncMutex::new(Some(orchestration))));
        let cache = Arc::new(RuleCache::new(StdDuration::from_secs(60)));
        let evaluator = TransitionEvaluator::new(
            comparisons_repo,
            orchestration_repo.clone(),
            cache,
            Arc::new(NoopMetricsCollector),
            StdDuration::from_secs(60),
        );
        (evaluator, orchestration_repo)
    }

    fn auto_parallel_rule() -> OrchestrationRule {
        let mut rule = OrchestrationRule::new("rule1", Mode::Parallel);
        rule.transition.auto_enabled = true;
        rule.transition.min_requests_for_transition = 100;
        rule.transition.match_rate_threshold = 0.95;
        rule.transition.stability_period = StdDuration::from_secs(24 * 60 * 60);
        rule
    }

    #[tokio::test]
    async fn insufficient_samples_does_not_transition() {
        let old_enough = Utc::now() - chrono::Duration::days(2);
        let comparisons: Vec<_> = (0..99).map(|_| comparison(1.0, old_enough)).collect();
        let (evaluator, _) = evaluator(comparisons, auto_parallel_rule());

        let result = evaluator.evaluate("rule1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn hundredth_high_match_sample_transitions_to_modern_only() {
        let old_enough = Utc::now() - chrono::Duration::days(2);
        let comparisons: Vec<_> = (0..100).map(|_| comparison(1.0, old_enough)).collect();
        let (evaluator, repo) = evaluator(comparisons, auto_parallel_rule());

        let result = evaluator.evaluate("rule1").await.unwrap();
        assert_eq!(
            result,
            Some(ModeChange {
                from: Mode::Parallel,
                to: Mode::ModernOnly
            })
        );
        assert_eq!(repo.0.lock().unwrap().as_ref().unwrap().mode, Mode::ModernOnly);
    }

    #[tokio::test]
    async fn stability_period_not_yet_elapsed_blocks_transition() {
        let too_recent = Utc::now() - chrono::Duration::minutes(5);
        let comparisons: Vec<_> = (0..100).map(|_| comparison(1.0, too_recent)).collect();
        let (evaluator, _) = evaluator(comparisons, auto_parallel_rule());

        let result = evaluator.evaluate("rule1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn rollback_when_mean_below_threshold() {
        let old_enough = Utc::now() - chrono::Duration::days(2);
        let comparisons: Vec<_> = (0..100).map(|_| comparison(0.85, old_enough)).collect();
        let mut rule = auto_parallel_rule();
        rule.mode = Mode::ModernOnly;
        rule.transition.rollback_threshold = 0.90;
        let (evaluator, repo) = evaluator(comparisons, rule);

        let result = evaluator.evaluate("rule1").await.unwrap();
        assert_eq!(
            result,
            Some(ModeChange {
                from: Mode::ModernOnly,
                to: Mode::Parallel
            })
        );
        assert_eq!(repo.0.lock().unwrap().as_ref().unwrap().mode, Mode::Parallel);
    }

    #[tokio::test]
    async fn flap_guard_rejects_second_change_within_interval() {
        let old_enough = Utc::now() - chrono::Duration::days(2);
        let comparisons: Vec<_> = (0..100).map(|_| comparison(1.0, old_enough)).collect();
        let mut rule = auto_parallel_rule();
        rule.last_mode_change = Some(Utc::now() - chrono::Duration::seconds(5));
        let (evaluator, _) = evaluator(comparisons, rule);

        let result = evaluator.evaluate("rule1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn legacy_only_rules_are_never_touched() {
        let old_enough = Utc::now() - chrono::Duration::days(2);
        let comparisons: Vec<_> = (0..100).map(|_| comparison(1.0, old_enough)).collect();
        let mut rule = auto_parallel_rule();
        rule.mode = Mode::LegacyOnly;
        let (evaluator, _) = evaluator(comparisons, rule);

        let result = evaluator.evaluate("rule1").await.unwrap();
        assert!(result.is_none());
    }
}
