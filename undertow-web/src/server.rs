//! JSON API server for Undertow

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use undertow_core::UndertowConfig;
use undertow_search::StreamLookupService;

use crate::handlers::{anime_episodes, anime_info, anime_streams, search_anime};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub lookup: Arc<StreamLookupService>,
}

/// Builds the API router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/anime/search", get(search_anime))
        .route("/v1/anime/{id}", get(anime_info))
        .route("/v1/anime/{id}/episodes", get(anime_episodes))
        .route("/v1/anime/{id}/streams", get(anime_streams))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Connects to the configured upstreams and serves the API until shutdown.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - The cache store or HTTP client could not be
///   set up, or the listener could not bind
pub async fn run_server(config: UndertowConfig) -> Result<(), Box<dyn std::error::Error>> {
    let lookup = StreamLookupService::connect(&config).await?;
    let app = router(AppState {
        lookup: Arc::new(lookup),
    });

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Undertow API listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
