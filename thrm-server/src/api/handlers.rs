//! HTTP request handlers
//!
//! Read-only endpoints for the dashboard and diagnostics.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::{error, info};

use crate::api::server::AppContext;
use crate::audio::{AudioOutput, CallbackCounters};
use crate::state::DashboardSnapshot;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AudioStatsResponse {
    /// Output device in use, `None` when audio is disabled or failed to start
    device: Option<String>,
    #[serde(flatten)]
    counters: CallbackCounters,
    dashboard_clients: usize,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "thrm-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// State Endpoints
// ============================================================================

/// GET /state - Current dashboard snapshot
pub async fn get_state(State(ctx): State<AppContext>) -> Json<DashboardSnapshot> {
    Json(ctx.state.snapshot().await)
}

/// GET /events - SSE stream, starting with the current audio state
pub async fn event_stream(State(ctx): State<AppContext>) -> impl IntoResponse {
    let initial = ctx.state.audio_state_event().await;
    ctx.state.broadcaster().handle_sse_connection(initial)
}

// ============================================================================
// Audio Endpoints
// ============================================================================

/// GET /audio/devices - List available audio output devices
pub async fn list_audio_devices(
) -> Result<Json<DeviceListResponse>, (StatusCode, Json<StatusResponse>)> {
    match AudioOutput::list_devices() {
        Ok(devices) => {
            info!("Found {} audio devices", devices.len());
            Ok(Json(DeviceListResponse { devices }))
        }
        Err(e) => {
            error!("Failed to list audio devices: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse {
                    status: format!("error: {}", e),
                }),
            ))
        }
    }
}

/// GET /audio/stats - Callback and fault counters
pub async fn get_audio_stats(State(ctx): State<AppContext>) -> Json<AudioStatsResponse> {
    Json(AudioStatsResponse {
        device: ctx.audio_device.clone(),
        counters: ctx.stats.counters(),
        dashboard_clients: ctx.state.broadcaster().client_count(),
    })
}
