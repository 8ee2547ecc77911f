//! The one unauthenticated route: forwards an inbound call into
//! `Dispatcher::dispatch` and writes the resulting `Response` back onto
//! the wire. `spec.md` §4.10's HTTP adapter boundary — everything past
//! this module is `router_core` domain types, not actix ones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use router_core::dispatch::Dispatcher;
use router_core::domain::Request;
use tokio_util::sync::CancellationToken;

use crate::error::ApiResult;

fn headers_to_map(req: &HttpRequest) -> HashMap<String, String> {
    req.headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

fn query_to_map(req: &HttpRequest) -> HashMap<String, String> {
    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(|q| q.into_inner())
        .unwrap_or_default()
}

/// Eight hex characters, matching `router_core::domain::Request`'s own
/// format — minted here since `spec.md` §4.2 assigns request-id
/// generation to the HTTP adapter, not the core.
fn generate_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// `spec.md` §4.4's request deadline — the cancellation token handed to
/// the dispatcher ties the inbound call's lifetime to this, not to the
/// per-endpoint timeout the core applies on the upstream leg.
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

#[actix_web::route("/dispatch/{tail:.*}", method = "GET", method = "POST", method = "PUT", method = "PATCH", method = "DELETE")]
pub async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    tail: web::Path<String>,
    dispatcher: web::Data<Arc<Dispatcher>>,
) -> ApiResult<HttpResponse> {
    let path = format!("/{}", tail.into_inner());
    let request = Request::with_id(
        generate_request_id(),
        req.method().as_str(),
        path,
        headers_to_map(&req),
        query_to_map(&req),
        body.to_vec(),
    );

    let cancel = CancellationToken::new();
    let deadline_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(REQUEST_DEADLINE).await;
        deadline_cancel.cancel();
    });

    let response = dispatcher.dispatch(request, cancel).await?;

    let mut builder = HttpResponse::build(
        actix_web::http::StatusCode::from_u16(response.status()).unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
    );
    for (name, value) in response.headers() {
        builder.insert_header((name.as_str(), value.as_str()));
    }
    Ok(builder.body(response.body().to_vec()))
}
