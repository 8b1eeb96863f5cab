use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::config::ServerConfig;
use crate::service::ComparisonService;

/// Full application: the API nested under `/api`, open CORS
pub fn app(service: Arc<ComparisonService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new().nest("/api", api::router(service)).layer(cors)
}

pub async fn run(config: &ServerConfig, service: Arc<ComparisonService>) -> anyhow::Result<()> {
    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{addr}");

    axum::serve(listener, app(service))
        .await
        .context("Web server stopped unexpectedly")
}
