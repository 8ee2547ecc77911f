use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use router_core::cache::RuleCache;
use router_core::repository::RoutingRuleRepository;

use crate::api::dto::RoutingRuleDto;
use crate::error::{ApiError, ApiResult};
use crate::repository::SqliteRoutingRuleRepository;

#[get("")]
pub async fn list(repo: web::Data<SqliteRoutingRuleRepository>) -> ApiResult<HttpResponse> {
    let rules = repo.list()?;
    let dtos: Vec<RoutingRuleDto> = rules.iter().map(RoutingRuleDto::from).collect();
    Ok(HttpResponse::Ok().json(dtos))
}

#[get("/{rule_id}")]
pub async fn get(
    repo: web::Data<SqliteRoutingRuleRepository>,
    rule_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let rule = repo.get(&rule_id).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(RoutingRuleDto::from(&rule)))
}

#[post("")]
pub async fn create(
    repo: web::Data<SqliteRoutingRuleRepository>,
    rule_cache: web::Data<Arc<RuleCache>>,
    body: web::Json<RoutingRuleDto>,
) -> ApiResult<HttpResponse> {
    let rule = router_core::domain::RoutingRule::from(body.into_inner());
    repo.create(rule).await?;
    // A new rule could match a `method:path` key the cache already
    // populated from an earlier miss; a targeted invalidation can't know
    // which keys without re-running every cached rule's pattern, so this
    // clears the whole cache rather than leaving a stale negative/partial
    // result in place.
    rule_cache.clear();
    Ok(HttpResponse::Created().finish())
}

#[put("/{rule_id}")]
pub async fn update(
    repo: web::Data<SqliteRoutingRuleRepository>,
    rule_cache: web::Data<Arc<RuleCache>>,
    rule_id: web::Path<String>,
    body: web::Json<RoutingRuleDto>,
) -> ApiResult<HttpResponse> {
    let mut dto = body.into_inner();
    dto.rule_id = rule_id.into_inner();
    let rule_id = dto.rule_id.clone();
    repo.update(router_core::domain::RoutingRule::from(dto)).await?;
    rule_cache.invalidate_rule(&rule_id);
    Ok(HttpResponse::Ok().finish())
}

#[delete("/{rule_id}")]
pub async fn remove(
    repo: web::Data<SqliteRoutingRuleRepository>,
    rule_cache: web::Data<Arc<RuleCache>>,
    rule_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    repo.delete(&rule_id).await?;
    rule_cache.invalidate_rule(&rule_id);
    Ok(HttpResponse::NoContent().finish())
}
