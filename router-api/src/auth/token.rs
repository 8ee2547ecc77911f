//! JWT issuance and validation. Each service start either loads a fixed
//! secret from config/environment or generates a random one, matching
//! the teacher's posture of forcing re-login after a restart unless an
//! operator pins a key.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::models::{Role, User};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: u64,
    pub iat: u64,
}

#[derive(Clone)]
pub struct AuthConfig {
    secret_key: String,
    token_validity_minutes: u64,
}

impl AuthConfig {
    pub fn new(secret_key: String, token_validity_minutes: u64) -> Self {
        Self {
            secret_key,
            token_validity_minutes,
        }
    }

    pub fn random(token_validity_minutes: u64) -> Self {
        let secret_key = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        Self {
            secret_key,
            token_validity_minutes,
        }
    }
}

pub fn generate_token(user: &User, config: &AuthConfig) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_secs();
    let exp = now + config.token_validity_minutes * 60;

    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        role: user.role.to_string(),
        exp,
        iat: now,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.secret_key.as_bytes()))
}

pub fn validate_token(token: &str, config: &AuthConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(config.secret_key.as_bytes()), &validation)?;
    Ok(data.claims)
}

pub fn is_admin(role: &str) -> bool {
    role == Role::Admin.to_string()
}

pub fn is_staff_or_admin(role: &str) -> bool {
    role == Role::Admin.to_string() || role == Role::Staff.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;

    #[test]
    fn round_trips_a_token() {
        let config = AuthConfig::new("test-secret".to_string(), 60);
        let user = User::new("alice".to_string(), "pw".to_string(), Role::Staff);
        let token = generate_token(&user, &config).unwrap();
        let claims = validate_token(&token, &config).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, "staff");
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let a = AuthConfig::new("secret-a".to_string(), 60);
        let b = AuthConfig::new("secret-b".to_string(), 60);
        let user = User::new("bob".to_string(), "pw".to_string(), Role::User);
        let token = generate_token(&user, &a).unwrap();
        assert!(validate_token(&token, &b).is_err());
    }

    #[test]
    fn role_checks_respect_the_hierarchy() {
        assert!(is_admin("admin"));
        assert!(!is_admin("staff"));
        assert!(is_staff_or_admin("staff"));
        assert!(is_staff_or_admin("admin"));
        assert!(!is_staff_or_admin("user"));
    }
}
