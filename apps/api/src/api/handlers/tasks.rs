use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::errors::ApiError;
use crate::api::params::{parse_timestamp, WindowParams};
use crate::api::AppState;
use crate::domain::repositories::TaskFilter;
use crate::domain::task::{TaskId, TaskPriority, TaskRecord, TaskState, TokenUsage};
use crate::domain::window::TimeWindow;
use crate::monitor::store::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub agent_name: String,
    pub state: TaskState,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub requester: Option<String>,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

impl From<&TaskRecord> for TaskResponse {
    fn from(task: &TaskRecord) -> Self {
        Self {
            id: task.id().to_string(),
            agent_name: task.agent_name().to_string(),
            state: task.state(),
            title: task.profile().title.clone(),
            description: task.description().map(String::from),
            priority: task.profile().priority,
            requester: task.profile().requester.clone(),
            result: task.result().map(String::from),
            created_at: task.created_at(),
            started_at: task.started_at(),
            ended_at: task.ended_at(),
            duration_secs: task
                .duration()
                .map(|d| d.num_milliseconds() as f64 / 1000.0),
            input_tokens: task.usage().input_tokens,
            output_tokens: task.usage().output_tokens,
            total_tokens: task.usage().total(),
        }
    }
}

/// Query parameters for task listings
#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub agent_name: Option<String>,
    pub state: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<TaskResponse>,
    pub limit: i64,
    pub offset: i64,
}

/// Query parameters for task history
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub agent_name: Option<String>,
    #[serde(flatten)]
    pub window: WindowParams,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub window: TimeWindow,
    pub tasks: Vec<TaskResponse>,
}

/// Request body for a task transition
///
/// Token counts are running totals for the task and replace stored ones.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub state: TaskState,
    pub result: Option<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl TransitionRequest {
    fn usage(&self) -> Option<TokenUsage> {
        if self.input_tokens.is_none() && self.output_tokens.is_none() {
            return None;
        }
        Some(TokenUsage::new(
            self.input_tokens.map_or(0, i64::from),
            self.output_tokens.map_or(0, i64::from),
        ))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// List tasks, newest first
///
/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<TaskPage>, ApiError> {
    let task_state = non_blank(query.state)
        .map(|s| TaskState::from_str(&s))
        .transpose()
        .map_err(ApiError::bad_request)?;

    let filter = TaskFilter {
        agent_name: non_blank(query.agent_name),
        state: task_state,
        since: parse_timestamp("since", query.since.as_deref())?,
        until: parse_timestamp("until", query.until.as_deref())?,
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let tasks = state.store.list_tasks(&filter, limit, offset).await?;

    Ok(Json(TaskPage {
        tasks: tasks.iter().map(TaskResponse::from).collect(),
        limit: limit.clamp(1, MAX_PAGE_SIZE),
        offset: offset.max(0),
    }))
}

/// Tasks that ended within a window
///
/// GET /api/tasks/history
pub async fn task_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let window = query
        .window
        .resolve(state.store.now(), state.stats_window)?;

    let agent_name = non_blank(query.agent_name);
    if let Some(name) = agent_name.as_deref() {
        if !state.store.roster().contains(name) {
            return Err(ApiError::bad_request(format!("Unknown agent: {}", name)));
        }
    }

    let tasks = state.store.history(&window).await?;
    let tasks = tasks
        .iter()
        .filter(|task| agent_name.as_deref().map_or(true, |name| task.agent_name() == name))
        .map(TaskResponse::from)
        .collect();

    Ok(Json(HistoryResponse { window, tasks }))
}

/// Get one task
///
/// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = state.store.get_task(&TaskId::new(id)).await?;
    Ok(Json(TaskResponse::from(&task)))
}

/// Move a task forward
///
/// POST /api/tasks/:id/transition
pub async fn transition_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let usage = req.usage();
    let task = state
        .collector
        .update_task(&TaskId::new(id), req.state, req.result, usage)
        .await?;

    Ok(Json(TaskResponse::from(&task)))
}
