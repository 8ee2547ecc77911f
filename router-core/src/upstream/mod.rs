//! # UpstreamClient
//!
//! Performs a single HTTP exchange with retry (`spec.md` §4.4). Wraps a
//! process-wide `reqwest::Client` built once at startup and injected —
//! `spec.md` §9's "the HTTP transport's connection pool is process-wide;
//! it is created at startup and injected" — configured from
//! [`UpstreamConfig`]. Retries are linear-backoff and apply only to the
//! transient transport failures `spec.md` enumerates; HTTP 5xx is
//! surfaced to the caller untouched so [`crate::breaker::CircuitBreaker`]
//! can see it.

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::UpstreamConfig;
use crate::domain::{Endpoint, Request, Response};
use crate::error::{CoreError, CoreResult};

/// Thin wrapper around a shared `reqwest::Client`.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    retry_base_delay: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        let pool = &config.connection_pool;
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(pool.max_idle_connections_per_host)
            .pool_idle_timeout(pool.idle_timeout)
            .tcp_keepalive(pool.keep_alive.then_some(Duration::from_secs(60)));
        if pool.prefer_http2 {
            builder = builder.http2_prior_knowledge();
        }
        let http = builder
            .build()
            .expect("reqwest client configuration is always valid");

        Self {
            http,
            retry_base_delay: config.retry_base_delay,
        }
    }

    /// For tests: an `UpstreamClient` built on a plain default client,
    /// so http2-prior-knowledge doesn't get forced against a wiremock
    /// HTTP/1.1 server.
    #[cfg(test)]
    pub fn default_for_tests(retry_base_delay: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            retry_base_delay,
        }
    }

    /// Performs the exchange against `endpoint`, honoring its timeout
    /// and retry count, cancellable via `cancel`.
    pub async fn call(
        &self,
        endpoint: &Endpoint,
        request: &Request,
        cancel: &CancellationToken,
    ) -> CoreResult<Response> {
        let max_attempts = 1 + endpoint.retry_count;
        let mut last_err = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(last_err.unwrap_or(CoreError::UpstreamTimeout {
                    endpoint_id: endpoint.endpoint_id.clone(),
                }));
            }

            match self.attempt(endpoint, request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    last_err = Some(err);
                    let backoff = self.retry_base_delay * attempt;
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => {
                            return Err(last_err.unwrap());
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.expect("loop always attempts at least once"))
    }

    async fn attempt(&self, endpoint: &Endpoint, request: &Request) -> CoreResult<Response> {
        let url = build_url(&endpoint.base_url, request);

        let mut builder = self
            .http
            .request(
                reqwest::Method::from_bytes(request.method().as_bytes())
                    .unwrap_or(reqwest::Method::GET),
                url,
            )
            .timeout(endpoint.timeout)
            .body(request.body().to_vec());

        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        let result = builder.send().await;

        let response = match result {
            Ok(resp) => resp,
            Err(err) => return Err(classify_transport_error(&endpoint.endpoint_id, &err)),
        };

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| classify_transport_error(&endpoint.endpoint_id, &err))?
            .to_vec();

        Ok(Response::new(status, headers, body))
    }
}

fn build_url(base_url: &str, request: &Request) -> String {
    let mut url = format!("{}{}", base_url.trim_end_matches('/'), request.path());
    if !request.query().is_empty() {
        let encoded: Vec<String> = request
            .query()
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect();
        url.push('?');
        url.push_str(&encoded.join("&"));
    }
    url
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn classify_transport_error(endpoint_id: &str, err: &reqwest::Error) -> CoreError {
    if err.is_timeout() {
        return CoreError::UpstreamTimeout {
            endpoint_id: endpoint_id.to_string(),
        };
    }
    let text = err.to_string().to_lowercase();
    if text.contains("connection refused") {
        CoreError::UpstreamConnectionRefused {
            endpoint_id: endpoint_id.to_string(),
        }
    } else if text.contains("connection reset") || text.contains("reset by peer") {
        CoreError::UpstreamConnectionReset {
            endpoint_id: endpoint_id.to_string(),
        }
    } else if text.contains("timeout") || text.contains("timed out") {
        CoreError::UpstreamTimeout {
            endpoint_id: endpoint_id.to_string(),
        }
    } else {
        CoreError::UpstreamError {
            endpoint_id: endpoint_id.to_string(),
            message: err.to_string(),
        }
    }
}
