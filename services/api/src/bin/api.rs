//! services/api/src/bin/api.rs

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use derecho_api::{
    adapters::{DbAdapter, LogMailer},
    config::Config,
    error::ApiError,
    sweeper::run_rate_limit_sweeper,
    web::{self, rest::ApiDoc, state::AppState},
};
use derecho_core::rate_limit::RateLimiter;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Rate Limiting & Background Sweeper ---
    let resend_limiter = Arc::new(RateLimiter::in_memory());
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(run_rate_limit_sweeper(
        resend_limiter.clone(),
        config.rate_limit_sweep_interval,
        shutdown.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        mailer: Arc::new(LogMailer::new(config.site_url.clone())),
        resend_limiter,
    });

    let site_origin = config.site_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("SITE_URL is not a valid origin: {}", e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(site_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = web::router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    sweeper
        .await
        .map_err(|e| ApiError::Internal(format!("Sweeper task failed: {}", e)))?;
    info!("Server stopped.");

    Ok(())
}
