//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{catalog, DbAdapter, ReqwestOAuthClient},
    config::Config,
    error::ApiError,
    web::{self, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use document_browser_core::{InMemoryPendingLogins, SystemClock};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Load the Document Catalog ---
    let registry = catalog::load_registry(&config.documents_path, db_adapter.as_ref()).await?;

    // --- 4. Build the Shared AppState ---
    let clock = Arc::new(SystemClock);
    let http = Arc::new(
        ReqwestOAuthClient::new()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?,
    );
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter,
        http,
        Arc::new(InMemoryPendingLogins::new()),
        clock,
        registry,
    )?);
    info!(
        providers = ?app_state.oauth.configured_providers(),
        "OAuth providers configured"
    );

    // Sessions that expired while the server was down.
    let purged = app_state.sessions.purge_expired().await?;
    if purged > 0 {
        info!(purged, "Removed expired sessions");
    }

    // --- 5. Create the Web Router ---
    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!(
            "ALLOWED_ORIGIN '{}' is not a valid header value: {}",
            config.allowed_origin, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let app = web::router(app_state).layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
