//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with the dashboard routes and SSE.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::audio::CallbackStats;
use crate::state::StateBus;
use crate::{Error, Result};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<StateBus>,
    pub stats: Arc<CallbackStats>,
    /// Name of the running output device, if any
    pub audio_device: Option<String>,
}

/// Build the router with every route attached
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Dashboard state
        .route("/state", get(super::handlers::get_state))
        .route("/events", get(super::handlers::event_stream))
        // Audio diagnostics
        .route("/audio/devices", get(super::handlers::list_audio_devices))
        .route("/audio/stats", get(super::handlers::get_audio_stats))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Dashboards may be served from any origin
        .layer(CorsLayer::permissive())
}

/// Serve the API on `addr` until `shutdown` resolves
pub async fn run<F>(addr: SocketAddr, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
