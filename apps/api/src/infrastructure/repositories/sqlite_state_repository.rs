use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::agent::{AgentRecord, AgentStatus};
use crate::domain::repositories::{ChangeSet, StateRepository, StateSnapshot, TaskFilter};
use crate::domain::task::{TaskId, TaskPriority, TaskProfile, TaskRecord, TaskState, TokenUsage};
use crate::domain::window::TimeWindow;

const AGENT_COLUMNS: &str =
    "name, status, last_online_status, current_task_id, last_seen_at, updated_at";

const TASK_COLUMNS: &str = "id, agent_name, state, description, result, title, priority, \
     requester, input_tokens, output_tokens, created_at, started_at, ended_at";

#[derive(sqlx::FromRow)]
struct AgentRow {
    name: String,
    status: AgentStatus,
    last_online_status: Option<AgentStatus>,
    current_task_id: Option<String>,
    last_seen_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<AgentRow> for AgentRecord {
    fn from(r: AgentRow) -> Self {
        AgentRecord::from_persistence(
            r.name,
            r.status,
            r.last_online_status,
            r.current_task_id.map(TaskId::new),
            r.last_seen_at,
            r.updated_at,
        )
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    agent_name: String,
    state: TaskState,
    description: Option<String>,
    result: Option<String>,
    title: Option<String>,
    priority: TaskPriority,
    requester: Option<String>,
    input_tokens: i64,
    output_tokens: i64,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl From<TaskRow> for TaskRecord {
    fn from(r: TaskRow) -> Self {
        TaskRecord::from_persistence(
            TaskId::new(r.id),
            r.agent_name,
            r.state,
            r.description,
            r.result,
            TaskProfile {
                title: r.title,
                priority: r.priority,
                requester: r.requester,
            },
            TokenUsage::new(r.input_tokens, r.output_tokens),
            r.created_at,
            r.started_at,
            r.ended_at,
        )
    }
}

/// SQLite implementation of StateRepository
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    /// Creates a new SqliteStateRepository
    ///
    /// # Arguments
    /// * `pool` - SQLx connection pool with the schema already applied
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateRepository for SqliteStateRepository {
    async fn insert_missing_agents(&self, agents: &[AgentRecord]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for agent in agents {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO agents (
                    name, status, last_online_status, current_task_id, last_seen_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(agent.name())
            .bind(agent.status())
            .bind(agent.last_online_status())
            .bind(agent.current_task_id().map(TaskId::as_str))
            .bind(agent.last_seen_at())
            .bind(agent.updated_at())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn find_agent(&self, name: &str) -> Result<Option<AgentRecord>, sqlx::Error> {
        let sql = format!("SELECT {} FROM agents WHERE name = ?1", AGENT_COLUMNS);
        let row = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AgentRecord::from))
    }

    async fn find_agents(&self) -> Result<Vec<AgentRecord>, sqlx::Error> {
        let sql = format!("SELECT {} FROM agents", AGENT_COLUMNS);
        let rows = sqlx::query_as::<_, AgentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AgentRecord::from).collect())
    }

    async fn find_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, sqlx::Error> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TaskRecord::from))
    }

    async fn find_active_task(&self, agent_name: &str) -> Result<Option<TaskRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE agent_name = ?1 AND state IN ('pending', 'running')",
            TASK_COLUMNS
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(agent_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TaskRecord::from))
    }

    async fn find_active_tasks(&self) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {} FROM tasks
            WHERE state IN ('pending', 'running')
            ORDER BY created_at DESC, id DESC
            "#,
            TASK_COLUMNS
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(TaskRecord::from).collect())
    }

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {} FROM tasks
            WHERE (?1 IS NULL OR agent_name = ?1)
              AND (?2 IS NULL OR state = ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at <= ?4)
            ORDER BY created_at DESC, id DESC
            LIMIT ?5 OFFSET ?6
            "#,
            TASK_COLUMNS
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(filter.agent_name.as_deref())
            .bind(filter.state)
            .bind(filter.since)
            .bind(filter.until)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(TaskRecord::from).collect())
    }

    async fn find_tasks_ended_in(&self, window: &TimeWindow) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {} FROM tasks
            WHERE ended_at IS NOT NULL
              AND (?1 IS NULL OR ended_at >= ?1)
              AND (?2 IS NULL OR ended_at <= ?2)
            ORDER BY ended_at DESC, id DESC
            "#,
            TASK_COLUMNS
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(TaskRecord::from).collect())
    }

    async fn snapshot(&self, window: &TimeWindow) -> Result<StateSnapshot, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM agents", AGENT_COLUMNS);
        let agents = sqlx::query_as::<_, AgentRow>(&sql)
            .fetch_all(&mut *tx)
            .await?;

        let sql = format!(
            r#"
            SELECT {} FROM tasks
            WHERE (ended_at IS NOT NULL
                   AND (?1 IS NULL OR ended_at >= ?1)
                   AND (?2 IS NULL OR ended_at <= ?2))
               OR (ended_at IS NULL AND (?2 IS NULL OR created_at <= ?2))
            ORDER BY created_at DESC, id DESC
            "#,
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(StateSnapshot {
            agents: agents.into_iter().map(AgentRecord::from).collect(),
            tasks: tasks.into_iter().map(TaskRecord::from).collect(),
        })
    }

    async fn commit(&self, changes: &ChangeSet) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if let Some(agent) = &changes.agent {
            sqlx::query(
                r#"
                INSERT INTO agents (
                    name, status, last_online_status, current_task_id, last_seen_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (name) DO UPDATE SET
                    status = excluded.status,
                    last_online_status = excluded.last_online_status,
                    current_task_id = excluded.current_task_id,
                    last_seen_at = excluded.last_seen_at,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(agent.name())
            .bind(agent.status())
            .bind(agent.last_online_status())
            .bind(agent.current_task_id().map(TaskId::as_str))
            .bind(agent.last_seen_at())
            .bind(agent.updated_at())
            .execute(&mut *tx)
            .await?;
        }

        // Updates only end or start tasks, so they go first to free the
        // one-active slot for any created task
        for task in &changes.updated {
            let updated = sqlx::query(
                r#"
                UPDATE tasks SET
                    state = ?3,
                    result = ?4,
                    input_tokens = ?5,
                    output_tokens = ?6,
                    started_at = ?7,
                    ended_at = ?8
                WHERE id = ?1 AND agent_name = ?2 AND ended_at IS NULL
                "#,
            )
            .bind(task.id().as_str())
            .bind(task.agent_name())
            .bind(task.state())
            .bind(task.result())
            .bind(task.usage().input_tokens)
            .bind(task.usage().output_tokens)
            .bind(task.started_at())
            .bind(task.ended_at())
            .execute(&mut *tx)
            .await?;

            // Ended rows are append-only history
            if updated.rows_affected() == 0 {
                return Err(sqlx::Error::RowNotFound);
            }
        }

        for task in &changes.created {
            let profile = task.profile();
            sqlx::query(
                r#"
                INSERT INTO tasks (
                    id, agent_name, state, description, result,
                    title, priority, requester, input_tokens, output_tokens,
                    created_at, started_at, ended_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )
            .bind(task.id().as_str())
            .bind(task.agent_name())
            .bind(task.state())
            .bind(task.description())
            .bind(task.result())
            .bind(profile.title.as_deref())
            .bind(profile.priority)
            .bind(profile.requester.as_deref())
            .bind(task.usage().input_tokens)
            .bind(task.usage().output_tokens)
            .bind(task.created_at())
            .bind(task.started_at())
            .bind(task.ended_at())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}
