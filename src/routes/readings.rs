use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};

use super::{error_response, AppState};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/readings/current", get(current))
}

/// Latest reading with its score report and water level.
async fn current(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match state.dashboard.current().await {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => {
            tracing::debug!("GET /readings/current - no reading yet");
            error_response(StatusCode::NOT_FOUND, "No current reading available")
        }
    }
}
