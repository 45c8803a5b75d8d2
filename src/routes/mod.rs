use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};

use crate::control::{Control, ControlError};
use crate::dashboard::Dashboard;
use crate::settings::SettingsService;
use crate::store::{DevicePaths, RealtimeStore, StoreError};

mod control;
mod health;
mod history;
mod notifications;
mod readings;
mod settings;

// ---

/// Shared handles for every route.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub control: Arc<Control>,
    pub store: Arc<dyn RealtimeStore>,
    pub settings: Arc<SettingsService>,
    pub paths: DevicePaths,
    /// Default window for history queries without `days`.
    pub history_days: u32,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .merge(readings::router())
        .merge(notifications::router())
        .merge(history::router())
        .merge(control::router())
        .merge(settings::router())
        .with_state(state)
}

// ---

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(message.into())).into_response()
}

/// Map a control failure to its HTTP status.
pub(crate) fn control_error(e: ControlError) -> Response {
    // ---
    let status = match &e {
        ControlError::NoReading => StatusCode::NOT_FOUND,
        ControlError::DailyLimitReached { .. } => StatusCode::TOO_MANY_REQUESTS,
        ControlError::InvalidDeviceCode => StatusCode::BAD_REQUEST,
        ControlError::Store(StoreError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
        ControlError::Store(_) => StatusCode::BAD_GATEWAY,
        ControlError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Control request failed: {}", e);
    } else {
        tracing::debug!("Control request rejected: {}", e);
    }
    error_response(status, e.to_string())
}
