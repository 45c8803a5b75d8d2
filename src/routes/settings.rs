//! Device onboarding and user settings.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use super::{control_error, error_response, AppState};
use crate::control::validate_device_code;
use crate::settings::SettingsUpdate;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/device", delete(forget))
        .route("/device/validate", post(validate))
        .route("/settings", get(current).put(update))
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    code: String,
}

async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> impl IntoResponse {
    // ---
    match validate_device_code(state.store.as_ref(), &state.settings, &body.code).await {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(e) => control_error(e),
    }
}

/// Forget the saved device code. Onboarding stays marked as seen.
async fn forget(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match state.settings.clear_device_code().await {
        Ok(settings) => {
            tracing::info!("Device code cleared");
            (StatusCode::OK, Json(settings)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to clear device code: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear device code")
        }
    }
}

async fn current(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.current().await)
}

/// Apply a partial update; the notification switch takes effect on the
/// next reading.
async fn update(
    State(state): State<AppState>,
    Json(body): Json<SettingsUpdate>,
) -> impl IntoResponse {
    // ---
    match state.settings.update(body).await {
        Ok(settings) => {
            state
                .dashboard
                .set_preferences(settings.notification_preferences())
                .await;
            (StatusCode::OK, Json(settings)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to update settings: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update settings")
        }
    }
}
