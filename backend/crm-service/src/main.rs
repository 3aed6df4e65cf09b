use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use crm_service::db::{postgres, MemoryStorage, PgStorage, Storage};
use crm_service::services::{sessions::spawn_session_pruner, FacebookProvider, IdentityProvider};
use crm_service::{handlers, logging, metrics, AppState, Config};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    logging::init_tracing();

    tracing::info!("Starting crm-service");

    let storage: Arc<dyn Storage> = match &config.database {
        Some(db) => {
            let pool = postgres::connect(db)
                .await
                .context("Failed to connect to PostgreSQL")?;
            let store = PgStorage::new(pool);
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Database migrations applied");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage (data is not persisted)");
            Arc::new(MemoryStorage::new())
        }
    };

    let provider: Arc<dyn IdentityProvider> =
        Arc::new(FacebookProvider::new(config.oauth.clone()));

    let bind_addr = config.server.bind_addr();
    let prune_interval = Duration::from_secs(config.session.prune_interval_secs);
    let state = AppState::new(Arc::new(config), storage, provider);

    let pruner = spawn_session_pruner(state.sessions.clone(), prune_interval);

    tracing::info!(addr = %bind_addr, "Starting HTTP server");
    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .configure(handlers::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await?;

    pruner.abort();
    tracing::info!("crm-service stopped");
    Ok(())
}
