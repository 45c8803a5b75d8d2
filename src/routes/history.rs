//! Daily history views: averages, per-parameter trends and correlations.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::AppState;
use crate::analytics::SortOrder;
use crate::models::Parameter;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/history/daily", get(daily))
        .route("/history/trend", get(trend))
        .route("/history/correlation", get(correlation))
}

#[derive(Debug, Deserialize)]
struct DailyQuery {
    order: Option<SortOrder>,
    days: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    parameter: Parameter,
    days: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CorrelationQuery {
    x: Parameter,
    y: Parameter,
    days: Option<usize>,
}

/// All daily averages unless `days` limits them to the most recent ones.
async fn daily(
    Query(params): Query<DailyQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let days = state.dashboard.daily(params.order, params.days).await;
    tracing::debug!("GET /history/daily - {} day(s)", days.len());
    Json(days)
}

async fn trend(
    Query(params): Query<TrendQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let days = params.days.unwrap_or(state.history_days as usize);
    let trend = state.dashboard.trend(params.parameter, days).await;
    tracing::debug!(
        "GET /history/trend - {} over {} sample(s): {}",
        params.parameter,
        trend.samples,
        trend.direction
    );
    Json(trend)
}

async fn correlation(
    Query(params): Query<CorrelationQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let days = params.days.unwrap_or(state.history_days as usize);
    Json(state.dashboard.correlation(params.x, params.y, days).await)
}
