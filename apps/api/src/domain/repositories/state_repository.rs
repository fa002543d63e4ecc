use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::agent::AgentRecord;
use crate::domain::task::{TaskId, TaskRecord, TaskState};
use crate::domain::window::TimeWindow;

/// Filters for task listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub agent_name: Option<String>,
    pub state: Option<TaskState>,
    /// Lower bound on `created_at`, inclusive
    pub since: Option<DateTime<Utc>>,
    /// Upper bound on `created_at`, inclusive
    pub until: Option<DateTime<Utc>>,
}

/// One atomic unit of agent/task writes
///
/// Everything in a change set is written in a single transaction.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub agent: Option<AgentRecord>,
    /// Tasks that must not exist yet
    pub created: Vec<TaskRecord>,
    /// Stored, still active tasks owned by the same agent
    pub updated: Vec<TaskRecord>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.agent.is_none() && self.created.is_empty() && self.updated.is_empty()
    }
}

/// Agents and window tasks read at a single point in time
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub agents: Vec<AgentRecord>,
    /// Tasks that ended inside the window plus active tasks created no
    /// later than its end
    pub tasks: Vec<TaskRecord>,
}

/// Repository trait for agent and task records
///
/// Agents and tasks share one repository because a single report can
/// touch both and must commit them together.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Insert any of `agents` whose name is not stored yet
    async fn insert_missing_agents(&self, agents: &[AgentRecord]) -> Result<(), sqlx::Error>;

    /// Find an agent by name
    async fn find_agent(&self, name: &str) -> Result<Option<AgentRecord>, sqlx::Error>;

    /// All stored agents, in no particular order
    async fn find_agents(&self) -> Result<Vec<AgentRecord>, sqlx::Error>;

    /// Find a task by its ID
    async fn find_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, sqlx::Error>;

    /// The pending or running task owned by `agent_name`, if any
    async fn find_active_task(&self, agent_name: &str) -> Result<Option<TaskRecord>, sqlx::Error>;

    /// Every pending or running task
    async fn find_active_tasks(&self) -> Result<Vec<TaskRecord>, sqlx::Error>;

    /// Page of tasks, newest `created_at` first, `id` descending on ties
    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TaskRecord>, sqlx::Error>;

    /// Tasks whose `ended_at` falls inside `window`, most recent first
    async fn find_tasks_ended_in(&self, window: &TimeWindow) -> Result<Vec<TaskRecord>, sqlx::Error>;

    /// Agents and the tasks counted by `window`, from one consistent read
    async fn snapshot(&self, window: &TimeWindow) -> Result<StateSnapshot, sqlx::Error>;

    /// Write every record in `changes` in one transaction
    ///
    /// A created task whose id is taken fails with a unique violation. An
    /// update that matches no active row of the same agent fails with
    /// `RowNotFound`. Either way nothing is written.
    async fn commit(&self, changes: &ChangeSet) -> Result<(), sqlx::Error>;
}
