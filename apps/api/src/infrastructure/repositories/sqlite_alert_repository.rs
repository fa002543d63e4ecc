use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::alert::{Alert, AlertDraft};
use crate::domain::repositories::AlertRepository;
use crate::domain::window::TimeWindow;

/// SQLite implementation of AlertRepository
pub struct SqliteAlertRepository {
    pool: SqlitePool,
}

impl SqliteAlertRepository {
    /// Creates a new SqliteAlertRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn record(
        &self,
        draft: &AlertDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Alert>, sqlx::Error> {
        sqlx::query_as::<_, Alert>(
            r#"
            INSERT OR IGNORE INTO alerts (
                dedup_key, kind, severity, title, message, agent_name, task_id, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING
                id, dedup_key, kind, severity, title, message, agent_name, task_id, created_at
            "#,
        )
        .bind(&draft.dedup_key)
        .bind(draft.kind)
        .bind(draft.severity)
        .bind(&draft.title)
        .bind(draft.message.as_deref())
        .bind(draft.agent_name.as_deref())
        .bind(draft.task_id.as_deref())
        .bind(created_at)
        .fetch_optional(&self.pool)
        .await
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Alert>, sqlx::Error> {
        sqlx::query_as::<_, Alert>(
            r#"
            SELECT id, dedup_key, kind, severity, title, message, agent_name, task_id, created_at
            FROM alerts
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_in(&self, window: &TimeWindow) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM alerts
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await
    }
}
