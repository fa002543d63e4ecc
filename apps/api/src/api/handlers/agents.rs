use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tasks::TaskResponse;
use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::agent::{AgentRecord, AgentStatus, Roster};
use crate::domain::task::{TaskId, TaskProfile};

/// Agent as seen by clients, staleness already applied
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub status: AgentStatus,
    pub current_task_id: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl AgentResponse {
    fn new(agent: &AgentRecord, roster: &Roster) -> Self {
        let profile = roster.profile(agent.name());
        Self {
            name: agent.name().to_string(),
            display_name: profile
                .as_ref()
                .map_or_else(|| agent.name().to_string(), |p| p.display_name.clone()),
            description: profile.and_then(|p| p.description),
            status: agent.status(),
            current_task_id: agent.current_task_id().map(TaskId::to_string),
            last_seen_at: agent.last_seen_at(),
            updated_at: agent.updated_at(),
        }
    }
}

/// Request body for a status report
///
/// The profile fields only apply when the report creates its task.
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub status: AgentStatus,
    pub task_id: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub profile: TaskProfile,
}

/// Request body for opening a task
#[derive(Debug, Default, Deserialize)]
pub struct OpenTaskRequest {
    pub description: Option<String>,
    #[serde(flatten)]
    pub profile: TaskProfile,
}

/// List every roster agent
///
/// GET /api/agents
pub async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let agents = state.store.list_agents().await?;
    let roster = state.store.roster();
    Ok(Json(
        agents
            .iter()
            .map(|agent| AgentResponse::new(agent, roster))
            .collect(),
    ))
}

/// Get one agent
///
/// GET /api/agents/:name
pub async fn get_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = state.store.get_agent(&name).await?;
    Ok(Json(AgentResponse::new(&agent, state.store.roster())))
}

/// Ingest a status report
///
/// POST /api/agents/:name/report
pub async fn report(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let task_id = req
        .task_id
        .filter(|id| !id.trim().is_empty())
        .map(|id| TaskId::new(id.trim()));

    let agent = state
        .collector
        .report_with_profile(&name, req.status, task_id, req.description, req.profile)
        .await?;

    Ok(Json(AgentResponse::new(&agent, state.store.roster())))
}

/// Liveness ping
///
/// POST /api/agents/:name/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = state.collector.heartbeat(&name).await?;
    Ok(Json(AgentResponse::new(&agent, state.store.roster())))
}

/// Open a pending task for an agent
///
/// POST /api/agents/:name/tasks
pub async fn open_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<OpenTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let task = state
        .collector
        .open_task(&name, req.description, req.profile)
        .await?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(&task))))
}
