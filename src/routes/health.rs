// src/routes/health.rs
//! Health check endpoint.
//!
//! Reports whether the service is up and whether the store feeds are
//! delivering data. The service answers `ok` even before the first reading
//! arrives; `degraded` means the last store operation failed.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    device: String,
    has_reading: bool,
    history_readings: usize,
    last_error: Option<String>,
}

/// Handle `GET /health`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // ---
    let status = state.dashboard.status().await;
    Json(HealthResponse {
        status: if status.last_error.is_some() {
            "degraded"
        } else {
            "ok"
        },
        device: state.paths.device().to_string(),
        has_reading: status.has_reading,
        history_readings: status.history_readings,
        last_error: status.last_error,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
