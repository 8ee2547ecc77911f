//! # Admin HTTP Surface
//!
//! Registers `/api/v1`'s routes: an unauthenticated `/dispatch` and
//! `/health`, a `/auth/login` issuer, and JWT-gated CRUD scopes for
//! rules, endpoints, orchestration and comparisons. Follows the
//! teacher's `api/mod.rs` top-level scope plus per-resource
//! `configure(cfg)` pattern.

pub mod comparisons;
pub mod dispatch;
pub mod dto;
pub mod endpoints;
pub mod health;
pub mod orchestration;
pub mod rules;

use actix_web::web;

use crate::auth::middleware::{JwtAuth, RoleAuth};
use crate::auth::AuthConfig;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(dispatch::dispatch)
        .service(web::scope("/auth").service(crate::auth::login));
}

/// Wired separately from [`configure`] because the JWT/role middleware
/// need an `AuthConfig` that isn't available until `main` has loaded
/// one; `ServiceConfig::configure` doesn't carry extra arguments.
pub fn configure_admin(cfg: &mut web::ServiceConfig, auth_config: AuthConfig) {
    cfg.service(
        web::scope("/rules")
            .wrap(RoleAuth::staff_or_admin())
            .wrap(JwtAuth::new(auth_config.clone()))
            .service(rules::list)
            .service(rules::get)
            .service(rules::create)
            .service(rules::update)
            .service(rules::remove),
    )
    .service(
        web::scope("/endpoints")
            .wrap(RoleAuth::staff_or_admin())
            .wrap(JwtAuth::new(auth_config.clone()))
            .service(endpoints::list)
            .service(endpoints::get)
            .service(endpoints::create)
            .service(endpoints::update)
            .service(endpoints::remove),
    )
    .service(
        web::scope("/orchestration")
            .wrap(RoleAuth::admin())
            .wrap(JwtAuth::new(auth_config.clone()))
            .service(orchestration::get)
            .service(orchestration::update)
            .service(orchestration::set_mode),
    )
    .service(
        web::scope("/comparisons")
            .wrap(RoleAuth::staff_or_admin())
            .wrap(JwtAuth::new(auth_config))
            .service(comparisons::recent)
            .service(comparisons::statistics),
    );
}
