use std::time::Duration;

use anyhow::{Context, Result};
use tower_sessions::ExpiredDeletion;
use transit_survey::api::{build_router, AppState};
use transit_survey::logging::init_tracing;
use transit_survey::{AppConfig, SeaOrmSessionStore, Store};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let store = Store::connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;
    store.migrate().await.context("failed to run migrations")?;

    match &config.admin_seed {
        Some(seed) => {
            store.ensure_admin(seed, config.bcrypt_cost).await?;
        }
        None => tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set; no admin account seeded"),
    }

    let sessions = SeaOrmSessionStore::new(store.conn().clone());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = sessions.delete_expired().await {
                tracing::error!(error = %e, "failed to delete expired web sessions");
            }
        }
    });

    let bind_addr = config.bind_addr;
    let app = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "transit survey server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
