use axum::{
    extract::{Query, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::params::WindowParams;
use crate::api::AppState;
use crate::monitor::StatSnapshot;

/// Aggregate statistics for a window
///
/// GET /api/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<StatSnapshot>, ApiError> {
    let window = params.resolve(state.store.now(), state.stats_window)?;
    let snapshot = state.aggregator.stats(&window).await?;
    Ok(Json(snapshot))
}
