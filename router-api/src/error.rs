//! # API Error Type
//!
//! Wraps `router_core::error::CoreError` plus the ambient failures the
//! HTTP surface introduces on top of it (persistence, auth, request
//! validation), mirroring the teacher's `DatabaseError` style: one
//! variant per failure kind, `#[from]` wrapping of underlying errors,
//! mapped to status codes via `actix_web::ResponseError`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use router_core::error::CoreError;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => StatusCode::from_u16(err.status_class()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidCredentials | ApiError::Token(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
