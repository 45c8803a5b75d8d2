//! Pump commands and daily transfers.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{control_error, AppState};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/pump", get(status))
        .route("/pump/toggle", post(toggle))
        .route("/pump/run", post(run))
        .route("/transfers", post(transfer))
}

#[derive(Serialize)]
struct PumpStatus {
    on: bool,
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    minutes: u32,
}

/// Mirrored pump status as last reported by the device.
async fn status(State(state): State<AppState>) -> Json<PumpStatus> {
    Json(PumpStatus {
        on: state.dashboard.pump_on().await,
    })
}

async fn toggle(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match state.control.toggle_pump().await {
        Ok(command) => (StatusCode::OK, Json(command)).into_response(),
        Err(e) => control_error(e),
    }
}

async fn run(State(state): State<AppState>, Json(body): Json<RunRequest>) -> impl IntoResponse {
    // ---
    tracing::info!("POST /pump/run - {} minute(s) requested", body.minutes);
    match state.control.run_pump(body.minutes).await {
        Ok(command) => (StatusCode::OK, Json(command)).into_response(),
        Err(e) => control_error(e),
    }
}

async fn transfer(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match state.control.transfer_daily().await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => control_error(e),
    }
}
