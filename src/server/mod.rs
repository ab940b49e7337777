//! HTTP server for kubequery

pub mod routes;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::QueryAgent;

/// Application state shared across handlers
pub struct AppState {
    pub agent: QueryAgent,
}

/// Build the router with CORS for `cors_origin`
pub fn router(state: Arc<AppState>, cors_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(cors_origin)
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Ok(Router::new()
        .merge(routes::query_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Run the HTTP server
pub async fn run(state: AppState, addr: SocketAddr, cors_origin: &str) -> Result<()> {
    let app = router(Arc::new(state), cors_origin)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
