use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::alert::Alert;

const DEFAULT_ALERT_LIMIT: i64 = 50;
const MAX_ALERT_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    pub limit: Option<i64>,
}

/// Recent alerts, newest first
///
/// GET /api/alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ALERT_LIMIT)
        .clamp(1, MAX_ALERT_LIMIT);

    Ok(Json(state.alerts.recent(limit).await?))
}

/// Run the alert checks once
///
/// POST /api/alerts/check
pub async fn check_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.alerts.check().await?))
}
