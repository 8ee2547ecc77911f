//! # API Process Configuration
//!
//! Loaded from a YAML file (default `config.yaml` in the working
//! directory, overridable with `--config`) and then patched with
//! environment variables, the way the teacher's CLI patches flags with
//! `GWRS_USER`/`GWRS_PASS`. `router_core::config::CoreConfig` nests
//! inside unchanged — it is already a serde struct with its own
//! `Default`, so this layer only adds the ambient settings `spec.md`
//! leaves to the surrounding system: bind address, database path, and
//! JWT signing parameters.

use std::path::PathBuf;

use router_core::config::CoreConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthSettings,
    pub core: CoreConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthSettings::default(),
            core: CoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 24042,
            workers: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/router-api/data/core.sqlite3"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// When unset, a random key is generated at startup and tokens are
    /// invalidated on every restart — the teacher's default posture.
    pub secret_key: Option<String>,
    pub token_validity_minutes: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            token_validity_minutes: 60,
        }
    }
}

impl ApiConfig {
    /// Loads the YAML file at `path` if it exists, falling back to
    /// defaults otherwise, then applies environment overrides.
    pub fn load(path: &std::path::Path) -> Self {
        let mut config = if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_yaml::from_str(&contents) {
                    Ok(config) => config,
                    Err(err) => {
                        log::warn!("failed to parse {}: {err}; using defaults", path.display());
                        ApiConfig::default()
                    }
                },
                Err(err) => {
                    log::warn!("failed to read {}: {err}; using defaults", path.display());
                    ApiConfig::default()
                }
            }
        } else {
            ApiConfig::default()
        };

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("ROUTER_API_HOST") {
            self.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("ROUTER_API_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("ROUTER_API_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(secret) = std::env::var("ROUTER_API_JWT_SECRET") {
            self.auth.secret_key = Some(secret);
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_the_documented_port() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:24042");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ApiConfig::load(std::path::Path::new("/nonexistent/config.yaml"));
        assert_eq!(config.server.port, 24042);
    }
}
