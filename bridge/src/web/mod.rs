//! HTTP server for the bridge
//!
//! Exposes the liveness probe, the connectivity probe and the query endpoint.

pub mod api;
pub mod state;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::BridgeConfig;
use crate::driver;
use state::AppState;

/// Start the web server
pub async fn serve(config: BridgeConfig) -> Result<()> {
    let database = Arc::new(config.database);
    let connector = driver::connector_for(&database).context("Invalid database configuration")?;

    tracing::info!(
        driver = connector.name(),
        credentials = database.credentials().is_some(),
        "Using connection string: {}",
        database.connection_string()
    );
    if database.credentials().is_some() && connector.name() == "sqlite" {
        tracing::warn!("SQLite does not authenticate; configured credentials are ignored");
    }

    let state = AppState::new(database, connector);
    let app = create_router(state);

    tracing::info!("Starting DB bridge on http://{}", config.listen);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("DB bridge stopped");
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::home))
        .route("/test", get(api::test_connection))
        .route("/query", post(api::execute_query))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
