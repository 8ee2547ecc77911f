use std::sync::Arc;

use actix_web::{get, put, web, HttpResponse};
use router_core::cache::RuleCache;
use router_core::domain::OrchestrationRule;
use router_core::repository::OrchestrationRepository;

use crate::api::dto::{OrchestrationRuleDto, SetModeRequest, UpdateOrchestrationRequest};
use crate::error::{ApiError, ApiResult};
use crate::repository::SqliteOrchestrationRepository;

#[get("/{rule_id}")]
pub async fn get(
    repo: web::Data<SqliteOrchestrationRepository>,
    rule_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let record = repo.find_by_rule_id(&rule_id).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(OrchestrationRuleDto::from(&record)))
}

#[put("/{rule_id}")]
pub async fn update(
    repo: web::Data<SqliteOrchestrationRepository>,
    rule_cache: web::Data<Arc<RuleCache>>,
    rule_id: web::Path<String>,
    body: web::Json<UpdateOrchestrationRequest>,
) -> ApiResult<HttpResponse> {
    let rule_id = rule_id.into_inner();
    let mut record = repo
        .find_by_rule_id(&rule_id)
        .await?
        .unwrap_or_else(|| OrchestrationRule::new(rule_id.clone(), router_core::domain::Mode::LegacyOnly));

    let body = body.into_inner();
    let mut mode_changed = false;
    if let Some(mode) = body.mode {
        if mode != record.mode {
            record.last_mode_change = Some(chrono::Utc::now());
            mode_changed = true;
        }
        record.mode = mode;
    }
    if let Some(transition) = body.transition {
        record.transition = transition.into();
    }
    if let Some(comparison) = body.comparison {
        record.comparison = comparison.into();
    }

    repo.update(record).await?;
    // RuleCache doesn't cache orchestration mode itself (Dispatcher
    // refetches it every call), but a mode change still invalidates the
    // rule's cached entries per the cache's own invalidation contract.
    if mode_changed {
        rule_cache.invalidate_rule(&rule_id);
    }
    Ok(HttpResponse::Ok().finish())
}

#[put("/{rule_id}/mode")]
pub async fn set_mode(
    repo: web::Data<SqliteOrchestrationRepository>,
    rule_cache: web::Data<Arc<RuleCache>>,
    rule_id: web::Path<String>,
    body: web::Json<SetModeRequest>,
) -> ApiResult<HttpResponse> {
    let rule_id = rule_id.into_inner();
    let mut record = repo
        .find_by_rule_id(&rule_id)
        .await?
        .unwrap_or_else(|| OrchestrationRule::new(rule_id.clone(), router_core::domain::Mode::LegacyOnly));

    if body.mode != record.mode {
        record.mode = body.mode;
        record.last_mode_change = Some(chrono::Utc::now());
        repo.update(record).await?;
        rule_cache.invalidate_rule(&rule_id);
    } else {
        repo.update(record).await?;
    }

    Ok(HttpResponse::Ok().finish())
}
