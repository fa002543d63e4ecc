use axum::{extract::State, Json};

use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::monitor::SyncReport;

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// Run the active-tasks file sync now
///
/// POST /api/sync
pub async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let path = state
        .active_tasks_file
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Active tasks file is not configured"))?;

    let report = state.collector.sync_active_tasks(path).await?;
    Ok(Json(report))
}
