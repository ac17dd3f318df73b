//! # Regatta API Server
//!
//! This is the main API server for Regatta, hosting the team and
//! competition moderation workflows.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - A single workflow endpoint executing moderation intents
//! - Inbox snapshot and mark-read endpoints
//! - SSE streaming of live inbox events
//! - A health check covering PostgreSQL and Redis
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p regatta-api
//! ```

use regatta_api::app::{build_router, AppState};
use regatta_api::config::Config;
use regatta_shared::db::{create_pool, run_migrations, DatabaseConfig};
use regatta_shared::redis::{RedisClient, RedisConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regatta_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Regatta API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&db).await?;

    let redis = RedisClient::new(RedisConfig::from_env()?).await?;

    let bind_address = config.bind_address();
    let state = AppState::new(db, redis, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Completes when the process receives Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
