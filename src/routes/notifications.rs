use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::{error_response, AppState};
use crate::analytics::NotificationTab;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/{id}/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
struct NotificationsQuery {
    tab: Option<NotificationTab>,
}

async fn list(
    Query(params): Query<NotificationsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let notifications = state.dashboard.notifications(params.tab).await;
    tracing::debug!(
        "GET /notifications {:?} - {} item(s)",
        params.tab,
        notifications.len()
    );
    Json(notifications)
}

async fn mark_read(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    // ---
    if state.dashboard.mark_read(&id).await {
        tracing::info!("Notification {} marked as read", id);
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("Unknown notification {}", id))
    }
}
