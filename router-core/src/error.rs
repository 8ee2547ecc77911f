//! # Error Types for the Dispatch Core
//!
//! Mirrors `spec.md` §7: one variant per failure kind the core exposes,
//! with the HTTP status class it maps to noted in the doc comment so the
//! inbound adapter (`router-api`) can translate without re-deriving the
//! policy. Follows the teacher's `DatabaseError`/`ClientError` style —
//! `thiserror` messages, `#[from]` wrapping of underlying errors.

use thiserror::Error;

/// Errors the dispatch core can surface to its caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No rule matched the inbound request. 404-class.
    #[error("no routing rule matched {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// The resolved rule references endpoint(s) that are missing or
    /// inactive. 503-class.
    #[error("no active endpoint available for rule {rule_id}")]
    EndpointUnavailable { rule_id: String },

    /// Deadline exhausted, including retries. 504-class.
    #[error("upstream {endpoint_id} timed out")]
    UpstreamTimeout { endpoint_id: String },

    /// 502-class.
    #[error("upstream {endpoint_id} refused the connection")]
    UpstreamConnectionRefused { endpoint_id: String },

    /// 502-class.
    #[error("upstream {endpoint_id} reset the connection")]
    UpstreamConnectionReset { endpoint_id: String },

    /// Upstream returned a body and status; not an error at the
    /// dispatch layer in single-upstream mode, only an internal signal
    /// to the circuit breaker.
    #[error("upstream {endpoint_id} returned HTTP {status}")]
    UpstreamHttpError { endpoint_id: String, status: u16 },

    /// A transport failure that doesn't match the timeout/refused/reset
    /// taxonomy `spec.md` §4.4 names as retryable — DNS failure, TLS
    /// error, malformed URL. Not retried. 502-class.
    #[error("upstream {endpoint_id} transport error: {message}")]
    UpstreamError { endpoint_id: String, message: String },

    /// Local short-circuit; in PARALLEL mode this is one side failing,
    /// in single-mode it surfaces as 503-class.
    #[error("circuit breaker open for endpoint {endpoint_id}")]
    BreakerOpen { endpoint_id: String },

    /// PARALLEL mode with neither side yielding a response. 502-class.
    #[error("both upstreams failed: legacy={legacy}, modern={modern}")]
    BothUpstreamsFailed { legacy: String, modern: String },

    /// Not propagated to the client; recorded on the comparison and
    /// logged.
    #[error("failed to decode response body as JSON: {0}")]
    ComparisonDecodeFailed(String),

    /// A request to a repository failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl CoreError {
    /// The HTTP status class `spec.md` §7 assigns to this error, for
    /// adapters that want a quick default without re-deriving policy.
    pub fn status_class(&self) -> u16 {
        match self {
            CoreError::RouteNotFound { .. } => 404,
            CoreError::EndpointUnavailable { .. } => 503,
            CoreError::UpstreamTimeout { .. } => 504,
            CoreError::UpstreamConnectionRefused { .. } => 502,
            CoreError::UpstreamConnectionReset { .. } => 502,
            CoreError::UpstreamHttpError { status, .. } => *status,
            CoreError::UpstreamError { .. } => 502,
            CoreError::BreakerOpen { .. } => 503,
            CoreError::BothUpstreamsFailed { .. } => 502,
            CoreError::ComparisonDecodeFailed(_) => 500,
            CoreError::Repository(_) => 500,
        }
    }

    /// Transient transport failures that `spec.md` §4.4 says are
    /// retryable at the upstream-client layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::UpstreamTimeout { .. }
                | CoreError::UpstreamConnectionRefused { .. }
                | CoreError::UpstreamConnectionReset { .. }
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
