//! # Router
//!
//! Resolves a [`Request`] to at most one [`RoutingRule`], or fails with
//! [`CoreError::RouteNotFound`]. `spec.md` §4.1's algorithm: consult the
//! [`RuleCache`] first; on miss or stale entry, query the repository,
//! order by priority then creation time, populate the cache, then scan
//! for the first matching rule. No retry on failure — it is a terminal
//! 404-class outcome.

use std::sync::Arc;

use crate::cache::RuleCache;
use crate::domain::{Request, RoutingRule};
use crate::error::{CoreError, CoreResult};
use crate::observability::{metrics, MetricsCollector};
use crate::repository::RoutingRuleRepository;

pub struct Router {
    repository: Arc<dyn RoutingRuleRepository>,
    cache: Arc<RuleCache>,
    metrics: Arc<dyn MetricsCollector>,
}

impl Router {
    pub fn new(repository: Arc<dyn RoutingRuleRepository>, cache: Arc<RuleCache>, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self { repository, cache, metrics }
    }

    pub async fn resolve(&self, request: &Request) -> CoreResult<Arc<RoutingRule>> {
        let key = request.cache_key();

        let candidates = match self.cache.get(&key) {
            Some(rules) => rules,
            None => {
                let mut rules = self
                    .repository
                    .find_matching(request.method(), request.path())
                    .await?;
                rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
                let rules: Vec<Arc<RoutingRule>> = rules.into_iter().map(Arc::new).collect();
                self.cache.put(key, rules.clone());
                rules
            }
        };

        candidates
            .iter()
            .find(|rule| {
                rule.matches(
                    request.method(),
                    request.path(),
                    request.headers(),
                    request.query(),
                )
            })
            .cloned()
            .ok_or_else(|| {
                self.metrics.increment_counter(
                    metrics::ROUTE_NOT_FOUND,
                    &[("method", request.method()), ("path", request.path())],
                );
                CoreError::RouteNotFound {
                    method: request.method().to_string(),
                    path: request.path().to_string(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::cache::RuleCache;
    use crate::observability::NoopMetricsCollector;
    use crate::repository::RoutingRuleRepository;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FakeRepo(Vec<(&'static str, &'static str, i64)>);

    #[async_trait]
    impl RoutingRuleRepository for FakeRepo {
        async fn find_matching(&self, _method: &str, _path: &str) -> CoreResult<Vec<RoutingRule>> {
            Ok(self
                .0
                .iter()
                .map(|(pattern, method, priority)| {
                    RoutingRule::new(
                        format!("{pattern}{method}"),
                        "rule",
                        *pattern,
                        *method,
                        HashMap::new(),
                        HashMap::new(),
                        *priority,
                        true,
                        true,
                        None,
                        "legacy",
                        "modern",
                        Utc::now(),
                    )
                })
                .collect())
        }

        async fn get(&self, _rule_id: &str) -> CoreResult<Option<RoutingRule>> {
            unimplemented!()
        }
        async fn create(&self, _rule: RoutingRule) -> CoreResult<()> {
            unimplemented!()
        }
        async fn update(&self, _rule: RoutingRule) -> CoreResult<()> {
            unimplemented!()
        }
        async fn delete(&self, _rule_id: &str) -> CoreResult<()> {
            unimplemented!()
        }
    }

    fn request(method: &str, path: &str) -> Request {
        Request::new(method, path, HashMap::new(), HashMap::new(), vec![])
    }

    #[tokio::test]
    async fn higher_priority_rule_wins() {
        let repo = Arc::new(FakeRepo(vec![("/a/*", "GET", 5), ("/a/*", "GET", 1)]));
        let cache = Arc::new(RuleCache::new(Duration::from_secs(60)));
        let router = Router::new(repo, cache, Arc::new(NoopMetricsCollector));

        let resolved = router.resolve(&request("GET", "/a/x")).await.unwrap();
        assert_eq!(resolved.priority, 1);
    }

    #[tokio::test]
    async fn route_not_found_is_terminal() {
        let repo = Arc::new(FakeRepo(vec![("/a/*", "GET", 5)]));
        let cache = Arc::new(RuleCache::new(Duration::from_secs(60)));
        let router = Router::new(repo, cache, Arc::new(NoopMetricsCollector));

        let err = router.resolve(&request("GET", "/b")).await.unwrap_err();
        assert!(matches!(err, CoreError::RouteNotFound { .. }));
    }

    #[tokio::test]
    async fn resolution_is_deterministic_across_calls() {
        let repo = Arc::new(FakeRepo(vec![("/a/*", "GET", 5), ("/a/*", "GET", 1)]));
        let cache = Arc::new(RuleCache::new(Duration::from_secs(60)));
        let router = Router::new(repo, cache, Arc::new(NoopMetricsCollector));

        let first = router.resolve(&request("GET", "/a/x")).await.unwrap();
        let second = router.resolve(&request("GET", "/a/x")).await.unwrap();
        assert_eq!(first.rule_id, second.rule_id);
    }
}
