use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::{
    error::ApiError,
    models::{FilterListResponse, HealthResponse},
    state::AppState,
};

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let filters = state.registry.list().await;
    let pending_commit = filters.iter().filter(|f| f.pending_id.is_some()).count();

    let body = HealthResponse {
        status: "healthy",
        updates_enabled: state.updates_enabled,
        filters: filters.len(),
        pending_commit,
    };

    (StatusCode::OK, Json(body))
}

/// Registry snapshot in insertion order (GET /filters)
pub async fn list_filters(State(state): State<AppState>) -> impl IntoResponse {
    let filters = state.registry.list().await;
    (StatusCode::OK, Json(FilterListResponse { filters }))
}

/// Single filter by id (GET /filters/{id})
pub async fn get_filter(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = state
        .registry
        .get_by_id(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("filter {id}")))?;

    Ok((StatusCode::OK, Json(filter)))
}

/// Refresh and commit counters (GET /stats)
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.metrics.snapshot()))
}
