//! Dashboard: Axum web server for monitoring and controlling sessions.
//!
//! Serves a JSON REST API over the orchestrator. CORS enabled for local
//! development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::engine::events::SessionEvent;
use routes::AppState;

/// Bind the dashboard port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;

    info!(port, "Dashboard server listening on http://localhost:{port}");
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        .route("/api/sessions", post(routes::start_sessions))
        .route("/api/sessions/stop-all", post(routes::stop_all))
        .route("/api/sessions/:id", delete(routes::stop_session))
        .route("/api/history", get(routes::get_history))
        .route("/api/logs", get(routes::get_logs))
        .route("/api/backtest", post(routes::run_backtest))
        .layer(cors)
        .with_state(state)
}

/// Feed bus events into the dashboard's history and log buffers until the
/// bus closes.
pub fn spawn_event_recorder(
    state: AppState,
    mut rx: broadcast::Receiver<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => state.record(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dashboard recorder lagging behind event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
