use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::api::dto::EndpointDto;
use crate::error::{ApiError, ApiResult};
use crate::repository::SqliteEndpointRepository;

#[get("")]
pub async fn list(repo: web::Data<SqliteEndpointRepository>) -> ApiResult<HttpResponse> {
    let endpoints = repo.list()?;
    let dtos: Vec<EndpointDto> = endpoints.iter().map(EndpointDto::from).collect();
    Ok(HttpResponse::Ok().json(dtos))
}

#[get("/{endpoint_id}")]
pub async fn get(
    repo: web::Data<SqliteEndpointRepository>,
    endpoint_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    use router_core::repository::EndpointRepository;
    let endpoint = repo.find_by_id(&endpoint_id).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(EndpointDto::from(&endpoint)))
}

#[post("")]
pub async fn create(
    repo: web::Data<SqliteEndpointRepository>,
    body: web::Json<EndpointDto>,
) -> ApiResult<HttpResponse> {
    let endpoint = router_core::domain::Endpoint::from(body.into_inner());
    repo.save(&endpoint)?;
    Ok(HttpResponse::Created().finish())
}

#[put("/{endpoint_id}")]
pub async fn update(
    repo: web::Data<SqliteEndpointRepository>,
    endpoint_id: web::Path<String>,
    body: web::Json<EndpointDto>,
) -> ApiResult<HttpResponse> {
    let mut dto = body.into_inner();
    dto.endpoint_id = endpoint_id.into_inner();
    repo.save(&router_core::domain::Endpoint::from(dto))?;
    Ok(HttpResponse::Ok().finish())
}

#[delete("/{endpoint_id}")]
pub async fn remove(
    repo: web::Data<SqliteEndpointRepository>,
    endpoint_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    repo.delete(&endpoint_id)?;
    Ok(HttpResponse::NoContent().finish())
}
