//! Dashboard — Axum web server for the live spread monitor.
//!
//! Serves the pull API, the `/ws` push channel and a self-contained HTML
//! page. CORS enabled for local development.

pub mod routes;
pub mod ws;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    response::Html,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::AppState;

/// The embedded dashboard HTML (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Bind the dashboard port and serve on a background task until `shutdown`
/// fires. Failing to bind is returned to the caller; it is fatal at startup.
pub async fn start_dashboard(
    state: AppState,
    port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    let local = listener
        .local_addr()
        .context("Failed to read dashboard listener address")?;
    info!(port = local.port(), "Dashboard server listening on http://localhost:{}", local.port());

    let task = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await;
        match served {
            Ok(()) => info!("Dashboard server stopped"),
            Err(e) => error!(error = %e, "Dashboard server error"),
        }
    });

    Ok((local, task))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // API routes
        .route("/api/opportunities", get(routes::get_opportunities))
        .route("/api/connection-status", get(routes::get_connection_status))
        .route("/api/stats", get(routes::get_stats))
        .route("/health", get(routes::health))
        // Push channel
        .route("/ws", get(ws::ws_handler))
        // Dashboard HTML
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
