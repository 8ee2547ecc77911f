//! # router-api
//!
//! Process entry point: loads [`config::ApiConfig`], opens the SQLite
//! database, wires the four `router_core::repository` implementations
//! and a [`router_core::observability::MetricsCollector`] into
//! [`router_core::build_dispatcher`], and serves the admin CRUD surface
//! plus the unauthenticated dispatch/health routes over actix-web.

mod api;
mod auth;
mod config;
mod db;
mod error;
mod observability;
mod repository;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use router_core::build_dispatcher;

use auth::AuthConfig;
use config::ApiConfig;
use db::Database;
use observability::TracingMetricsCollector;
use repository::{SqliteComparisonRepository, SqliteEndpointRepository, SqliteOrchestrationRepository, SqliteRoutingRuleRepository};

/// Runs the legacy/modern migration broker's admin API and dispatch
/// surface.
#[derive(Parser, Debug)]
#[command(name = "router-api", version)]
struct Args {
    /// Path to the YAML config file. Missing files fall back to defaults.
    #[arg(long, default_value = "config.yaml")]
    config: std::path::PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = ApiConfig::load(&args.config);

    let db = Database::open(&config.database.path).unwrap_or_else(|err| {
        panic!("failed to open database at {}: {err}", config.database.path.display());
    });

    repository::ensure_schema(&db).expect("failed to initialize repository schema");
    auth::init_database(&db).expect("failed to initialize users table");

    let auth_config = match &config.auth.secret_key {
        Some(secret) => AuthConfig::new(secret.clone(), config.auth.token_validity_minutes),
        None => {
            log::warn!("no auth.secret_key configured; generating a random key for this run — tokens won't survive a restart");
            AuthConfig::random(config.auth.token_validity_minutes)
        }
    };

    let rules_repo = SqliteRoutingRuleRepository::new(db.clone());
    let endpoints_repo = SqliteEndpointRepository::new(db.clone());
    let orchestration_repo = SqliteOrchestrationRepository::new(db.clone());
    let comparisons_repo = SqliteComparisonRepository::new(db.clone());
    let metrics = Arc::new(TracingMetricsCollector);

    let (dispatcher, rule_cache) = build_dispatcher(
        &config.core,
        Arc::new(rules_repo.clone()),
        Arc::new(endpoints_repo.clone()),
        Arc::new(orchestration_repo.clone()),
        Arc::new(comparisons_repo.clone()),
        metrics,
    );
    let dispatcher = Arc::new(dispatcher);

    let bind_address = config.bind_address();
    let workers = config.server.workers;
    log::info!("router-api listening on {bind_address}");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(auth_config.clone()))
            .app_data(web::Data::new(dispatcher.clone()))
            .app_data(web::Data::new(rule_cache.clone()))
            .app_data(web::Data::new(rules_repo.clone()))
            .app_data(web::Data::new(endpoints_repo.clone()))
            .app_data(web::Data::new(orchestration_repo.clone()))
            .app_data(web::Data::new(comparisons_repo.clone()))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure)
                    .configure(|cfg| api::configure_admin(cfg, auth_config.clone())),
            )
    })
    .bind(&bind_address)?
    .workers(workers)
    .run()
    .await
}
