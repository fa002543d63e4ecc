use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::alert::{Alert, AlertDraft};
use crate::domain::window::TimeWindow;

/// Repository trait for alerts
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Store `draft` unless its dedup key already exists
    ///
    /// Returns the stored alert, or `None` when it was a duplicate.
    async fn record(
        &self,
        draft: &AlertDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Alert>, sqlx::Error>;

    /// Most recent alerts first
    async fn recent(&self, limit: i64) -> Result<Vec<Alert>, sqlx::Error>;

    /// Number of alerts created inside `window`
    async fn count_in(&self, window: &TimeWindow) -> Result<i64, sqlx::Error>;
}
