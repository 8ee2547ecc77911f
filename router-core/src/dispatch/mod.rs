//! # Dispatcher
//!
//! Executes a resolved rule according to its current orchestration mode
//! and returns a client-facing [`Response`] (`spec.md` §4.3). LEGACY_ONLY
//! and MODERN_ONLY are a single CircuitBreaker-wrapped call; PARALLEL
//! spawns two independent tasks, rendezvous on a capacity-2 channel, and
//! never blocks the client response on the comparison work it fires off
//! afterward.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::background::BackgroundExecutor;
use crate::breaker::BreakerRegistry;
use crate::compare::Comparator;
use crate::config::CircuitBreakerConfig;
use crate::domain::{Endpoint, Mode, OrchestrationRule, Request, Response, RoutingRule};
use crate::error::{CoreError, CoreResult};
use crate::observability::{metrics, MetricsCollector};
use crate::repository::{ComparisonRepository, EndpointRepository, OrchestrationRepository};
use crate::router::Router;
use crate::transition::TransitionEvaluator;
use crate::upstream::UpstreamClient;

enum Side {
    Legacy,
    Modern,
}

struct SideResult {
    side: Side,
    response: Option<Response>,
    error: Option<CoreError>,
}

pub struct Dispatcher {
    router: Router,
    endpoints: Arc<dyn EndpointRepository>,
    orchestration: Arc<dyn OrchestrationRepository>,
    comparisons: Arc<dyn ComparisonRepository>,
    upstream: UpstreamClient,
    breakers: Arc<BreakerRegistry>,
    breaker_config: CircuitBreakerConfig,
    background: Arc<BackgroundExecutor>,
    comparator: Arc<Comparator>,
    transition: Arc<TransitionEvaluator>,
    metrics: Arc<dyn MetricsCollector>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router: Router,
        endpoints: Arc<dyn EndpointRepository>,
        orchestration: Arc<dyn OrchestrationRepository>,
        comparisons: Arc<dyn ComparisonRepository>,
        upstream: UpstreamClient,
        breakers: Arc<BreakerRegistry>,
        breaker_config: CircuitBreakerConfig,
        background: Arc<BackgroundExecutor>,
        comparator: Arc<Comparator>,
        transition: Arc<TransitionEvaluator>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            router,
            endpoints,
            orchestration,
            comparisons,
            upstream,
            breakers,
            breaker_config,
            background,
            comparator,
            transition,
            metrics,
        }
    }

    /// The core's one entry point (`spec.md` §6): `Dispatch(Request) ->
    /// Response`. `cancel` is the inbound request's deadline/cancellation
    /// signal, supplied by the HTTP adapter at the boundary.
    pub async fn dispatch(&self, request: Request, cancel: CancellationToken) -> CoreResult<Response> {
        let rule = self.router.resolve(&request).await?;

        let orchestration = match self.orchestration.find_by_rule_id(&rule.rule_id).await? {
            Some(o) => o,
            None => {
                tracing::warn!(rule_id = %rule.rule_id, "no orchestration record, defaulting to legacy_only");
                OrchestrationRule::new(rule.rule_id.clone(), Mode::LegacyOnly)
            }
        };

        self.metrics
            .increment_counter(metrics::DISPATCH_MODE, &[("mode", mode_label(orchestration.mode))]);

        match orchestration.mode {
            Mode::LegacyOnly => self.dispatch_single(&rule, &request, true, &cancel).await,
            Mode::ModernOnly => self.dispatch_single(&rule, &request, false, &cancel).await,
            Mode::Parallel => self.dispatch_parallel(&rule, &orchestration, &request, &cancel).await,
        }
    }

    async fn resolve_endpoint(&self, rule: &RoutingRule, is_legacy: bool) -> CoreResult<Endpoint> {
        let preferred_id = if is_legacy {
            &rule.legacy_endpoint_id
        } else {
            &rule.modern_endpoint_id
        };

        if let Some(endpoint) = self.endpoints.find_by_id(preferred_id).await? {
            if endpoint.is_active {
                return Ok(endpoint);
            }
        }

        let actives = self.endpoints.list_active().await?;
        Endpoint::select(&actives, is_legacy)
            .cloned()
            .ok_or_else(|| CoreError::EndpointUnavailable {
                rule_id: rule.rule_id.clone(),
            })
    }

    async fn dispatch_single(
        &self,
        rule: &RoutingRule,
        request: &Request,
        is_legacy: bool,
        cancel: &CancellationToken,
    ) -> CoreResult<Response> {
        let endpoint = self.resolve_endpoint(rule, is_legacy).await?;
        self.call_endpoint(&endpoint, request, cancel).await
    }

    async fn call_endpoint(
        &self,
        endpoint: &Endpoint,
        request: &Request,
        cancel: &CancellationToken,
    ) -> CoreResult<Response> {
        let breaker = self.breakers.get_or_create(&endpoint.endpoint_id, &self.breaker_config);
        let permit = breaker.admit()?;

        let start = std::time::Instant::now();
        let result = self.upstream.call(endpoint, request, cancel).await;
        self.metrics.observe_histogram(
            metrics::UPSTREAM_DURATION,
            start.elapsed().as_secs_f64(),
            &[("endpoint_id", endpoint.endpoint_id.as_str())],
        );

        match &result {
            Ok(response) if response.is_server_error() => permit.failed(),
            Ok(_) => permit.succeeded(),
            Err(_) => permit.failed(),
        }

        result
    }

    async fn dispatch_parallel(
        &self,
        rule: &RoutingRule,
        orchestration: &OrchestrationRule,
        request: &Request,
        cancel: &CancellationToken,
    ) -> CoreResult<Response> {
        let legacy_endpoint = self.resolve_endpoint(rule, true).await.ok();
        let modern_endpoint = self.resolve_endpoint(rule, false).await.ok();

        let (legacy_endpoint, modern_endpoint) = match (legacy_endpoint, modern_endpoint) {
            (None, None) => {
                return Err(CoreError::EndpointUnavailable {
                    rule_id: rule.rule_id.clone(),
                })
            }
            (Some(l), None) => {
                tracing::warn!(rule_id = %rule.rule_id, "modern endpoint unavailable, degrading to legacy-only");
                return self.call_endpoint(&l, request, cancel).await;
            }
            (None, Some(m)) => {
                tracing::warn!(rule_id = %rule.rule_id, "legacy endpoint unavailable, degrading to modern-only");
                return self.call_endpoint(&m, request, cancel).await;
            }
            (Some(l), Some(m)) => (l, m),
        };

        let (tx, mut rx) = mpsc::channel::<SideResult>(2);
        let child_cancel = cancel.child_token();

        self.spawn_side(Side::Legacy, legacy_endpoint, request.clone(), child_cancel.clone(), tx.clone());
        self.spawn_side(Side::Modern, modern_endpoint, request.clone(), child_cancel.clone(), tx);

        let mut legacy_result = None;
        let mut modern_result = None;
        for _ in 0..2 {
            match rx.recv().await {
                Some(result) => match result.side {
                    Side::Legacy => legacy_result = Some((result.response, result.error)),
                    Side::Modern => modern_result = Some((result.response, result.error)),
                },
                None => break,
            }
        }

        let (legacy_response, legacy_error) = legacy_result.unwrap_or((None, None));
        let (modern_response, modern_error) = modern_result.unwrap_or((None, None));

        if orchestration.comparison.enabled {
            if let (Some(legacy), Some(modern)) = (&legacy_response, &modern_response) {
                self.submit_comparison(request.request_id(), &rule.rule_id, legacy, modern, orchestration);
            }
        }

        if let Some(response) = legacy_response {
            return Ok(response);
        }
        if let Some(response) = modern_response {
            return Ok(response);
        }

        Err(CoreError::BothUpstreamsFailed {
            legacy: legacy_error.map(|e| e.to_string()).unwrap_or_default(),
            modern: modern_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn spawn_side(
        &self,
        side: Side,
        endpoint: Endpoint,
        request: Request,
        cancel: CancellationToken,
        tx: mpsc::Sender<SideResult>,
    ) {
        let breaker = self.breakers.get_or_create(&endpoint.endpoint_id, &self.breaker_config);
        let upstream = self.upstream.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let admitted = breaker.admit();
            let permit = match admitted {
                Ok(permit) => permit,
                Err(err) => {
                    let _ = tx
                        .send(SideResult {
                            side,
                            response: None,
                            error: Some(err),
                        })
                        .await;
                    return;
                }
            };

            let start = std::time::Instant::now();
            let result = upstream.call(&endpoint, &request, &cancel).await;
            metrics.observe_histogram(
                metrics::UPSTREAM_DURATION,
                start.elapsed().as_secs_f64(),
                &[("endpoint_id", endpoint.endpoint_id.as_str())],
            );

            let (response, error) = match result {
                Ok(response) => {
                    if response.is_server_error() {
                        permit.failed();
                    } else {
                        permit.succeeded();
                    }
                    (Some(response), None)
                }
                Err(err) => {
                    permit.failed();
                    (None, Some(err))
                }
            };

            let _ = tx.send(SideResult { side, response, error }).await;
        });
    }

    fn submit_comparison(
        &self,
        request_id: &str,
        rule_id: &str,
        legacy: &Response,
        modern: &Response,
        orchestration: &OrchestrationRule,
    ) {
        let request_id = request_id.to_string();
        let rule_id = rule_id.to_string();
        let legacy = legacy.clone();
        let modern = modern.clone();
        let config = orchestration.comparison.clone();
        let comparator = self.comparator.clone();
        let comparisons = self.comparisons.clone();
        let transition = self.transition.clone();
        let metrics = self.metrics.clone();

        self.background.submit(metrics.clone().as_ref(), async move {
            let comparison = comparator.compare(&request_id, &rule_id, &legacy, &modern, &config);
            metrics.observe_histogram(metrics::COMPARISON_MATCH_RATE, comparison.match_rate, &[("rule_id", rule_id.as_str())]);

            if config.save_history {
                if let Err(err) = comparisons.save(comparison).await {
                    tracing::warn!(rule_id = %rule_id, error = %err, "failed to persist comparison");
                }
            }

            if let Err(err) = transition.evaluate(&rule_id).await {
                tracing::warn!(rule_id = %rule_id, error = %err, "transition evaluation failed");
            }
        });
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
    use crate::cache::RuleCache;
    use crate::config::ComparisonDefaults;
    use crate::domain::{APIComparison, ComparisonConfig};
    use crate::observability::NoopMetricsCollector;
    use crate::repository::{ComparisonStatistics, RoutingRuleRepository};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeRules(RoutingRule);

    #[async_trait]
    impl RoutingRuleRepository for FakeRules {
        async fn find_matching(&self, _method: &str, _path: &str) -> CoreResult<Vec<RoutingRule>> {
            Ok(vec![clone_rule(&self.0)])
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

    fn clone_rule(rule: &RoutingRule) -> RoutingRule {
        RoutingRule::new(
            rule.rule_id.clone(),
            rule.name.clone(),
            rule.path_pattern.clone(),
            rule.method_pattern.clone(),
            rule.header_match.clone(),
            rule.query_match.clone(),
            rule.priority,
            rule.is_active,
            rule.cache_enabled,
            rule.cache_ttl_seconds,
            rule.legacy_endpoint_id.clone(),
            rule.modern_endpoint_id.clone(),
            rule.created_at,
        )
    }

    struct FakeEndpoints(Vec<Endpoint>);

    #[async_trait]
    impl EndpointRepository for FakeEndpoints {
        async fn find_by_id(&self, endpoint_id: &str) -> CoreResult<Option<Endpoint>> {
            Ok(self.0.iter().find(|e| e.endpoint_id == endpoint_id).cloned())
        }
        async fn find_default_legacy(&self) -> CoreResult<Option<Endpoint>> {
            Ok(self.0.iter().find(|e| e.is_legacy && e.is_default).cloned())
        }
        async fn find_default_modern(&self) -> CoreResult<Option<Endpoint>> {
            Ok(self.0.iter().find(|e| !e.is_legacy && e.is_default).cloned())
        }
        async fn list_active(&self) -> CoreResult<Vec<Endpoint>> {
            Ok(self.0.iter().filter(|e| e.is_active).cloned().collect())
        }
    }

    struct FakeOrchestration(OrchestrationRule);

    #[async_trait]
    impl OrchestrationRepository for FakeOrchestration {
        async fn find_by_rule_id(&self, _rule_id: &str) -> CoreResult<Option<OrchestrationRule>> {
            Ok(Some(self.0.clone()))
        }
        async fn update(&self, _rule: OrchestrationRule) -> CoreResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeComparisons(StdMutex<Vec<APIComparison>>);

    #[async_trait]
    impl ComparisonRepository for FakeComparisons {
        async fn save(&self, comparison: APIComparison) -> CoreResult<()> {
            self.0.lock().unwrap().push(comparison);
            Ok(())
        }
        async fn find_recent(&self, _rule_id: &str, _limit: usize) -> CoreResult<Vec<APIComparison>> {
            Ok(self.0.lock().unwrap().clone())
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

    fn endpoint(id: &str, base_url: String, is_legacy: bool) -> Endpoint {
        Endpoint {
            endpoint_id: id.to_string(),
            base_url,
            health_probe_path: None,
            is_active: true,
            timeout: std::time::Duration::from_secs(2),
            retry_count: 0,
            is_legacy,
            is_default: true,
        }
    }

    fn rule() -> RoutingRule {
        RoutingRule::new(
            "rule1", "rule", "/a", "GET", HashMap::new(), HashMap::new(), 0, true, true, None, "legacy", "modern",
            Utc::now(),
        )
    }

    fn dispatcher(endpoints: Vec<Endpoint>, mode: Mode) -> Dispatcher {
        let mut orchestration = OrchestrationRule::new("rule1", mode);
        orchestration.comparison = ComparisonConfig {
            enabled: true,
            ignore_fields: vec![],
            allowable_numeric_difference: 0.01,
            strict_mode: false,
            save_history: true,
        };

        let metrics: Arc<dyn MetricsCollector> = Arc::new(NoopMetricsCollector);
        let router = Router::new(
            Arc::new(FakeRules(rule())),
            Arc::new(RuleCache::new(std::time::Duration::from_secs(60))),
            metrics.clone(),
        );
        let comparisons: Arc<dyn ComparisonRepository> = Arc::new(FakeComparisons::default());
        let orchestration_repo: Arc<dyn OrchestrationRepository> = Arc::new(FakeOrchestration(orchestration));
        let rule_cache = Arc::new(RuleCache::new(std::time::Duration::from_secs(60)));
        let transition = Arc::new(TransitionEvaluator::new(
            comparisons.clone(),
            orchestration_repo.clone(),
            rule_cache,
            metrics.clone(),
            std::time::Duration::from_secs(60),
        ));

        Dispatcher::new(
            router,
            Arc::new(FakeEndpoints(endpoints)),
            orchestration_repo,
            comparisons,
            UpstreamClient::default_for_tests(std::time::Duration::from_millis(1)),
            Arc::new(BreakerRegistry::new(metrics.clone())),
            CircuitBreakerConfig {
                max_requests: 100,
                interval: std::time::Duration::from_secs(10),
                timeout: std::time::Duration::from_secs(5),
                failure_ratio_threshold: 0.99,
                consecutive_failure_threshold: 100,
                max_probe_requests: 5,
            },
            Arc::new(BackgroundExecutor::start(2, 16, metrics.clone())),
            Arc::new(Comparator::new(&ComparisonDefaults {
                default_ignore_fields: vec![],
                default_allowable_numeric_difference: 0.01,
                array_element_cap: 10,
            })),
            transition,
            metrics,
        )
    }

    fn request() -> Request {
        Request::new("GET", "/a", HashMap::new(), HashMap::new(), vec![])
    }

    #[tokio::test]
    async fn legacy_only_mode_calls_only_legacy() {
        let legacy_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("legacy"))
            .mount(&legacy_server)
            .await;

        let endpoints = vec![endpoint("legacy", legacy_server.uri(), true), endpoint("modern", "http://127.0.0.1:1".to_string(), false)];
        let dispatcher = dispatcher(endpoints, Mode::LegacyOnly);

        let response = dispatcher.dispatch(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(response.body(), b"legacy");
    }

    #[tokio::test]
    async fn parallel_prefers_legacy_response_when_present() {
        let legacy_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("legacy"))
            .mount(&legacy_server)
            .await;
        let modern_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("modern"))
            .mount(&modern_server)
            .await;

        let endpoints = vec![
            endpoint("legacy", legacy_server.uri(), true),
            endpoint("modern", modern_server.uri(), false),
        ];
        let dispatcher = dispatcher(endpoints, Mode::Parallel);

        let response = dispatcher.dispatch(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(response.body(), b"legacy");
    }

    #[tokio::test]
    async fn parallel_falls_back_to_modern_when_legacy_unreachable() {
        let modern_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("modern"))
            .mount(&modern_server)
            .await;

        let endpoints = vec![
            endpoint("legacy", "http://127.0.0.1:1".to_string(), true),
            endpoint("modern", modern_server.uri(), false),
        ];
        let dispatcher = dispatcher(endpoints, Mode::Parallel);

        let response = dispatcher.dispatch(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(response.body(), b"modern");
    }

    #[tokio::test]
    async fn both_upstreams_unreachable_is_a_terminal_failure() {
        let endpoints = vec![
            endpoint("legacy", "http://127.0.0.1:1".to_string(), true),
            endpoint("modern", "http://127.0.0.1:1".to_string(), false),
        ];
        let dispatcher = dispatcher(endpoints, Mode::Parallel);

        let err = dispatcher.dispatch(request(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::BothUpstreamsFailed { .. }));
    }

    #[tokio::test]
    async fn degrades_to_single_dispatch_when_one_endpoint_missing() {
        let legacy_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("legacy-only"))
            .mount(&legacy_server)
            .await;

        let endpoints = vec![endpoint("legacy", legacy_server.uri(), true)];
        let dispatcher = dispatcher(endpoints, Mode::Parallel);

        let response = dispatcher.dispatch(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(response.body(), b"legacy-only");
    }
}
