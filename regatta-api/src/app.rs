/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use regatta_api::{app::{build_router, AppState}, config::Config};
/// use regatta_shared::redis::{RedisClient, RedisConfig};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let redis = RedisClient::new(RedisConfig::from_env()?).await?;
/// let state = AppState::new(pool, redis, config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```
use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use regatta_shared::redis::RedisClient;
use regatta_workflow::{
    EntityStore, LiveChannel, NotificationChannel, PgEntityStore, WorkflowOrchestrator,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Redis client backing the live notification stream
    pub redis: RedisClient,

    /// Workflow orchestrator executing intents
    pub orchestrator: Arc<WorkflowOrchestrator>,

    /// Notification channel for direct inbox reads and subscriptions
    pub channel: Arc<dyn NotificationChannel>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state, wiring the orchestrator to the
    /// Postgres entity store and the Postgres/Redis notification channel
    pub fn new(db: PgPool, redis: RedisClient, config: Config) -> Self {
        let channel: Arc<dyn NotificationChannel> =
            Arc::new(LiveChannel::new(db.clone(), redis.clone()));
        let store: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(db.clone()));
        let orchestrator = Arc::new(WorkflowOrchestrator::new(store, channel.clone()));

        Self {
            db,
            redis,
            orchestrator,
            channel,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// The router is organized as follows:
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /v1/                             # API v1 (versioned)
///     ├── POST /workflow/execute       # Run one workflow intent
///     ├── GET  /inbox/:user_id         # Inbox snapshot (?kind= filter)
///     ├── GET  /inbox/:user_id/stream  # Live inbox events (SSE)
///     └── POST /notifications/:id/read # Mark one notification read
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Workflow execution
    let workflow_routes = Router::new().route("/execute", post(routes::workflow::execute_intent));

    // Inbox reads and the live event stream
    let inbox_routes = Router::new()
        .route("/:user_id", get(routes::inbox::get_inbox))
        .route("/:user_id/stream", get(routes::inbox::stream_inbox));

    // Single-notification operations
    let notification_routes = Router::new().route("/:id/read", post(routes::inbox::mark_read));

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/workflow", workflow_routes)
        .nest("/inbox", inbox_routes)
        .nest("/notifications", notification_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
