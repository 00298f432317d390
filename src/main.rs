use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;
use docs::ApiDoc;
use store::correction::MySqlCorrectionStore;
use utils::{payroll_cache::PayrollCache, username_index::UsernameIndex};

#[get("/")]
async fn index() -> impl Responder {
    "HRM attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    if let Err(e) = config.payroll_policy().validate() {
        // Payroll endpoints will answer 500 until this is fixed.
        warn!(error = %e, "Payroll policy is invalid");
    }

    let pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to MySQL")?;

    let username_index = Data::new(UsernameIndex::new());
    let payroll_cache = Data::new(PayrollCache::new(Duration::from_secs(
        config.payroll_cache_ttl_secs,
    )));
    let correction_store = Data::new(MySqlCorrectionStore::new(pool.clone()));

    {
        let usernames: Arc<UsernameIndex> = username_index.clone().into_inner();
        let pool = pool.clone();
        actix_web::rt::spawn(async move {
            if let Err(e) = usernames.warmup_filter(&pool, 100).await {
                error!(error = ?e, "Failed to warm up username filter");
            }
            // Warm up last 30 days of recent users in batches of 250
            if let Err(e) = usernames.warmup_recent(&pool, 30, 250).await {
                error!(error = ?e, "Failed to warm up username cache");
            }
        });
    }

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);
    let pool_data = Data::new(pool);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(username_index.clone())
            .app_data(payroll_cache.clone())
            .app_data(correction_store.clone())
            .service(index)
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
