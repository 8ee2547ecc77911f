//! # router-core
//!
//! The dispatch core of the legacy/modern migration broker. Exposes one
//! entry point — [`Dispatcher::dispatch`] — that resolves a routing
//! rule, executes it under the rule's current orchestration mode, and
//! fires off structural comparison and transition evaluation work
//! without blocking the client response.
//!
//! Persistence, the HTTP listener, authentication, and process lifecycle
//! live in `router-api`; this crate only defines the seams
//! ([`repository`], [`observability`]) those collaborators implement.

pub mod background;
pub mod breaker;
pub mod cache;
pub mod compare;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod observability;
pub mod repository;
pub mod router;
pub mod transition;
pub mod upstream;

use std::sync::Arc;

use background::BackgroundExecutor;
use breaker::BreakerRegistry;
use cache::RuleCache;
use compare::Comparator;
use config::CoreConfig;
use dispatch::Dispatcher;
use observability::MetricsCollector;
use repository::{ComparisonRepository, EndpointRepository, OrchestrationRepository, RoutingRuleRepository};
use router::Router;
use transition::TransitionEvaluator;
use upstream::UpstreamClient;

/// Wires every component described in `spec.md` §2's flow — UpstreamClient
/// wrapped by CircuitBreaker, Router+RuleCache feeding the Dispatcher,
/// Comparator and TransitionEvaluator running off BackgroundExecutor —
/// into one [`Dispatcher`], from a loaded [`CoreConfig`] and the four
/// repository implementations supplied by `router-api`.
///
/// Also returns the [`RuleCache`] handle the `Router` was built with, so
/// the admin CRUD surface can invalidate it on rule mutation (`spec.md`
/// §4.2) without `Dispatcher` needing to expose its internals.
#[allow(clippy::too_many_arguments)]
pub fn build_dispatcher(
    config: &CoreConfig,
    rules: Arc<dyn RoutingRuleRepository>,
    endpoints: Arc<dyn EndpointRepository>,
    orchestration: Arc<dyn OrchestrationRepository>,
    comparisons: Arc<dyn ComparisonRepository>,
    metrics: Arc<dyn MetricsCollector>,
) -> (Dispatcher, Arc<RuleCache>) {
    let rule_cache = Arc::new(RuleCache::new(config.rule_cache.ttl));
    let router = Router::new(rules, rule_cache.clone(), metrics.clone());

    let upstream = UpstreamClient::new(&config.upstream);
    let breakers = Arc::new(BreakerRegistry::new(metrics.clone()));

    let background = Arc::new(BackgroundExecutor::start(
        config.background_executor.workers,
        config.background_executor.queue_size,
        metrics.clone(),
    ));

    let comparator = Arc::new(Comparator::new(&config.comparison));

    let transition = Arc::new(TransitionEvaluator::new(
        comparisons.clone(),
        orchestration.clone(),
        rule_cache.clone(),
        metrics.clone(),
        config.transition.flap_guard_interval,
    ));

    let dispatcher = Dispatcher::new(
        router,
        endpoints,
        orchestration,
        comparisons,
        upstream,
        breakers,
        config.circuit_breaker.clone(),
        background,
        comparator,
        transition,
        metrics,
    );

    (dispatcher, rule_cache)
}
