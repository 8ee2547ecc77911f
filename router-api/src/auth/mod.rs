//! # Authentication
//!
//! JWT bearer auth following the teacher's `auth_middleware`/
//! `auth_token` pair: a `users` table holding an id/username/password
//! hash/role, a `/auth/login` handler issuing tokens, and the
//! `JwtAuth`/`RoleAuth` middleware pair gating the admin CRUD surface
//! (`spec.md` §4.11's `SPEC_FULL.md` counterpart).

pub mod middleware;
pub mod models;
pub mod token;

use actix_web::{post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::db::{Database, DatabaseResult};
use models::{Role, User};
pub use token::AuthConfig;

/// Creates the `users` table and seeds a default administrator when the
/// table is empty, so a fresh deployment always has a way in.
pub fn init_database(db: &Database) -> DatabaseResult<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'staff', 'user'))
        )",
        [],
    )?;

    let count: i64 = db
        .query_one("SELECT COUNT(*) FROM users", [], |row| row.get(0))?
        .unwrap_or(0);

    if count == 0 {
        let admin = User::new("admin".to_string(), "adminpassword".to_string(), Role::Admin);
        db.execute(
            "INSERT INTO users (id, username, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
            [&admin.id, &admin.username, &admin.password_hash, &admin.role.to_string()],
        )?;
        log::warn!("seeded default administrator (username: admin, password: adminpassword) — change this before exposing the API");
    }

    Ok(())
}

fn find_user_by_username(db: &Database, username: &str) -> DatabaseResult<Option<User>> {
    db.query_one(
        "SELECT id, username, password_hash, role FROM users WHERE username = ?1",
        [username],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                role: Role::from(row.get::<_, String>(3)?),
            })
        },
    )
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub role: String,
}

#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<Database>,
    auth_config: web::Data<AuthConfig>,
) -> actix_web::Result<impl Responder> {
    let user = find_user_by_username(&db, &body.username)
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("invalid username or password"))?;

    if user.password_hash != models::hash_password(&body.password) {
        return Err(actix_web::error::ErrorUnauthorized("invalid username or password"));
    }

    let jwt = token::generate_token(&user, &auth_config)
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.to_string()))?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        token: jwt,
        user_id: user.id,
        username: user.username,
        role: user.role.to_string(),
    }))
}
