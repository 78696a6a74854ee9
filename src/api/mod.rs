//! Control API: Axum server for starting, stopping and inspecting the
//! monitor.
//!
//! CORS enabled for local tooling.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{ApiState, AppState};

/// Bind the port and serve in a background task.
pub async fn spawn_api(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control API port {port}"))?;
    info!(port, "Control API listening on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Control API server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/status", get(routes::get_status))
        .route("/api/monitor/start", post(routes::start_monitor))
        .route("/api/monitor/stop", post(routes::stop_monitor))
        .route("/api/criteria", get(routes::get_criteria))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
