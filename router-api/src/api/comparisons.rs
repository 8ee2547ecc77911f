use actix_web::{get, web, HttpResponse};
use chrono::{Duration, Utc};
use router_core::repository::ComparisonRepository;
use serde::Deserialize;

use crate::api::dto::{ComparisonDto, ComparisonStatisticsDto};
use crate::error::ApiResult;
use crate::repository::SqliteComparisonRepository;

#[derive(Deserialize)]
pub struct RecentQuery {
    limit: Option<usize>,
}

#[get("/{rule_id}")]
pub async fn recent(
    repo: web::Data<SqliteComparisonRepository>,
    rule_id: web::Path<String>,
    query: web::Query<RecentQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query.limit.unwrap_or(50);
    let comparisons = repo.find_recent(&rule_id, limit).await?;
    let dtos: Vec<ComparisonDto> = comparisons.iter().map(ComparisonDto::from).collect();
    Ok(HttpResponse::Ok().json(dtos))
}

#[derive(Deserialize)]
pub struct StatisticsQuery {
    window_secs: Option<i64>,
}

#[get("/{rule_id}/statistics")]
pub async fn statistics(
    repo: web::Data<SqliteComparisonRepository>,
    rule_id: web::Path<String>,
    query: web::Query<StatisticsQuery>,
) -> ApiResult<HttpResponse> {
    let window = Duration::seconds(query.window_secs.unwrap_or(24 * 60 * 60));
    let to = Utc::now();
    let from = to - window;
    let stats = repo.statistics(&rule_id, from, to).await?;
    Ok(HttpResponse::Ok().json(ComparisonStatisticsDto::from(stats)))
}
