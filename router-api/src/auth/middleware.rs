//! Actix middleware gating the admin CRUD surface. `JwtAuth` only checks
//! that the bearer token is valid; `RoleAuth` additionally requires a
//! minimum role. Dispatch traffic (`/api/v1/dispatch`) never wears
//! either — it is proxied client traffic, not administration.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{self, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;

use super::token::{self, AuthConfig, Claims};

fn bearer_token(req: &ServiceRequest) -> Result<String, Error> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| ErrorUnauthorized("missing Authorization header"))?;
    let header = header.to_str().map_err(|_| ErrorUnauthorized("invalid Authorization header"))?;
    header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| ErrorUnauthorized("expected a Bearer token"))
}

pub struct JwtAuth {
    auth_config: Rc<AuthConfig>,
}

impl JwtAuth {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Rc::new(auth_config),
        }
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            auth_config: self.auth_config.clone(),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    auth_config: Rc<AuthConfig>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_config = self.auth_config.clone();
        let srv = self.service.clone();

        Box::pin(async move {
            let raw_token = bearer_token(&req)?;
            let claims = token::validate_token(&raw_token, &auth_config)
                .map_err(|_| ErrorUnauthorized("invalid or expired token"))?;
            req.extensions_mut().insert(claims);
            srv.call(req).await
        })
    }
}

/// Required role for an endpoint. Checked against the claims `JwtAuth`
/// already placed in request extensions, so `RoleAuth` must always wrap
/// inside a `JwtAuth`.
#[derive(Clone, Copy)]
pub enum RequiredRole {
    Admin,
    StaffOrAdmin,
}

pub struct RoleAuth {
    required: RequiredRole,
}

impl RoleAuth {
    pub fn admin() -> Self {
        Self {
            required: RequiredRole::Admin,
        }
    }

    pub fn staff_or_admin() -> Self {
        Self {
            required: RequiredRole::StaffOrAdmin,
        }
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for RoleAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RoleAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RoleAuthMiddleware {
            service: Rc::new(service),
            required: self.required,
        }))
    }
}

pub struct RoleAuthMiddleware<S> {
    service: Rc<S>,
    required: RequiredRole,
}

impl<S, B> Service<ServiceRequest> for RoleAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let required = self.required;
        let srv = self.service.clone();

        Box::pin(async move {
            let claims = req
                .extensions()
                .get::<Claims>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("missing authentication"))?;

            let allowed = match required {
                RequiredRole::Admin => token::is_admin(&claims.role),
                RequiredRole::StaffOrAdmin => token::is_staff_or_admin(&claims.role),
            };
            if !allowed {
                return Err(ErrorUnauthorized("insufficient privileges"));
            }

            srv.call(req).await
        })
    }
}

pub trait ClaimsFromRequest {
    fn get_claims(&self) -> Option<Claims>;
}

impl ClaimsFromRequest for actix_web::HttpRequest {
    fn get_claims(&self) -> Option<Claims> {
        self.extensions().get::<Claims>().cloned()
    }
}
