use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use super::clock::Clock;
use super::errors::{MonitorError, MonitorResult};
use super::locks::AgentLocks;
use crate::domain::agent::{AgentRecord, AgentStatus, Roster};
use crate::domain::repositories::{ChangeSet, StateRepository, StateSnapshot, TaskFilter};
use crate::domain::task::{TaskEvent, TaskId, TaskProfile, TaskRecord, TaskState, TokenUsage};
use crate::domain::window::TimeWindow;

/// Page size used when a listing does not ask for one
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Largest page a listing may return
pub const MAX_PAGE_SIZE: i64 = 500;

/// Current-state view of the roster and its tasks
///
/// All agent and task writes go through a per-agent [`AgentWrite`] session,
/// so writes for one agent are serialized while different agents proceed
/// in parallel. Reads never take a lock.
pub struct Store {
    repo: Arc<dyn StateRepository>,
    roster: Roster,
    staleness: Duration,
    clock: Arc<dyn Clock>,
    locks: AgentLocks,
}

impl Store {
    /// Creates a store over `repo`
    ///
    /// # Arguments
    /// * `roster` - The fixed set of agent names
    /// * `staleness` - Silence after which an agent reads as offline
    /// * `clock` - Source of "now"
    pub fn new(
        repo: Arc<dyn StateRepository>,
        roster: Roster,
        staleness: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = AgentLocks::new(&roster);
        Self {
            repo,
            roster,
            staleness,
            clock,
            locks,
        }
    }

    /// Makes sure every roster agent has a record
    ///
    /// Existing records are left alone, so restarts keep their state.
    pub async fn initialize(&self) -> MonitorResult<()> {
        let now = self.now();
        let records: Vec<AgentRecord> = self
            .roster
            .names()
            .map(|name| AgentRecord::new(name, now))
            .collect();

        self.repo.insert_missing_agents(&records).await?;
        tracing::info!(agents = records.len(), "Roster initialized");
        Ok(())
    }

    /// Opens a write session for `name`, waiting for any other writer
    ///
    /// Fails with `UnknownAgent` for names outside the roster.
    pub async fn begin(&self, name: &str) -> MonitorResult<AgentWrite<'_>> {
        let guard = self
            .locks
            .acquire(name)
            .await
            .ok_or_else(|| MonitorError::UnknownAgent(name.to_string()))?;

        let now = self.now();
        let agent = match self.repo.find_agent(name).await? {
            Some(agent) => agent,
            None => AgentRecord::new(name, now),
        };

        Ok(AgentWrite {
            store: self,
            _guard: guard,
            agent,
            agent_dirty: false,
            tasks: Vec::new(),
            created: Vec::new(),
            events: Vec::new(),
            now,
        })
    }

    /// Opens a write session for the agent owning `task_id`
    pub async fn begin_for_task(&self, task_id: &TaskId) -> MonitorResult<AgentWrite<'_>> {
        let task = self.get_task(task_id).await?;
        self.begin(task.agent_name()).await
    }

    // ===== Writes =====

    /// Records a full status report for `name`
    pub async fn upsert_agent(
        &self,
        name: &str,
        status: AgentStatus,
        task_id: Option<TaskId>,
        seen_at: DateTime<Utc>,
    ) -> MonitorResult<AgentRecord> {
        let mut session = self.begin(name).await?;
        session.upsert(status, task_id, seen_at);
        let agent = session.commit().await?;
        Ok(agent.project(self.now(), self.staleness))
    }

    /// Creates a pending task with a generated id
    pub async fn create_task(
        &self,
        agent_name: &str,
        description: Option<String>,
    ) -> MonitorResult<TaskRecord> {
        self.create_task_with_id(agent_name, TaskId::generate(), description)
            .await
    }

    /// Creates a pending task under a caller-chosen id
    pub async fn create_task_with_id(
        &self,
        agent_name: &str,
        id: TaskId,
        description: Option<String>,
    ) -> MonitorResult<TaskRecord> {
        let mut session = self.begin(agent_name).await?;
        let task = session.create_task(id, description).await?;
        session.commit().await?;
        Ok(task)
    }

    /// Moves a task one legal step forward
    pub async fn transition_task(
        &self,
        task_id: &TaskId,
        state: TaskState,
        result: Option<String>,
    ) -> MonitorResult<TaskRecord> {
        let mut session = self.begin_for_task(task_id).await?;
        let task = session.transition_task(task_id, state, result).await?;
        session.commit().await?;
        Ok(task)
    }

    // ===== Reads =====

    /// One agent with the staleness projection applied
    pub async fn get_agent(&self, name: &str) -> MonitorResult<AgentRecord> {
        if !self.roster.contains(name) {
            return Err(MonitorError::NotFound(format!("agent {}", name)));
        }

        let agent = self
            .repo
            .find_agent(name)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("agent {}", name)))?;

        Ok(agent.project(self.now(), self.staleness))
    }

    /// Every roster agent in roster order, staleness applied
    pub async fn list_agents(&self) -> MonitorResult<Vec<AgentRecord>> {
        let now = self.now();
        let mut stored: HashMap<String, AgentRecord> = self
            .repo
            .find_agents()
            .await?
            .into_iter()
            .map(|agent| (agent.name().to_string(), agent))
            .collect();

        Ok(self
            .roster
            .names()
            .filter_map(|name| stored.remove(name))
            .map(|agent| agent.project(now, self.staleness))
            .collect())
    }

    pub async fn get_task(&self, task_id: &TaskId) -> MonitorResult<TaskRecord> {
        self.repo
            .find_task(task_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("task {}", task_id)))
    }

    /// Page of tasks, newest first
    ///
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`, a negative `offset` reads
    /// as zero.
    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> MonitorResult<Vec<TaskRecord>> {
        if let Some(name) = filter.agent_name.as_deref() {
            if !self.roster.contains(name) {
                return Err(MonitorError::UnknownAgent(name.to_string()));
            }
        }

        let tasks = self
            .repo
            .list_tasks(filter, limit.clamp(1, MAX_PAGE_SIZE), offset.max(0))
            .await?;
        Ok(tasks)
    }

    /// Tasks that ended inside `window`
    pub async fn history(&self, window: &TimeWindow) -> MonitorResult<Vec<TaskRecord>> {
        Ok(self.repo.find_tasks_ended_in(window).await?)
    }

    /// Every pending or running task
    pub async fn active_tasks(&self) -> MonitorResult<Vec<TaskRecord>> {
        Ok(self.repo.find_active_tasks().await?)
    }

    /// Roster agents and the tasks counted by `window`, read together
    ///
    /// Agents come back in roster order with staleness applied.
    pub async fn snapshot(&self, window: &TimeWindow) -> MonitorResult<StateSnapshot> {
        let StateSnapshot { agents, tasks } = self.repo.snapshot(window).await?;
        let now = self.now();

        let mut stored: HashMap<String, AgentRecord> = agents
            .into_iter()
            .map(|agent| (agent.name().to_string(), agent))
            .collect();
        let agents = self
            .roster
            .names()
            .filter_map(|name| stored.remove(name))
            .map(|agent| agent.project(now, self.staleness))
            .collect();

        Ok(StateSnapshot { agents, tasks })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }
}

/// Exclusive write session for one agent
///
/// Changes are staged in memory and reach the database only on
/// [`commit`](AgentWrite::commit), in a single transaction. Dropping the
/// session without committing discards them.
pub struct AgentWrite<'a> {
    store: &'a Store,
    _guard: OwnedMutexGuard<()>,
    agent: AgentRecord,
    agent_dirty: bool,
    tasks: Vec<TaskRecord>,
    /// Ids of staged tasks that are new in this session
    created: Vec<TaskId>,
    events: Vec<TaskEvent>,
    now: DateTime<Utc>,
}

impl AgentWrite<'_> {
    /// The agent as staged so far
    pub fn agent(&self) -> &AgentRecord {
        &self.agent
    }

    /// Timestamp used for every change in this session
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn upsert(&mut self, status: AgentStatus, task_id: Option<TaskId>, seen_at: DateTime<Utc>) {
        self.agent.record_report(status, task_id, seen_at, self.now);
        self.agent_dirty = true;
    }

    /// Returns whether the stored status changed
    pub fn heartbeat(&mut self, seen_at: DateTime<Utc>) -> bool {
        self.agent_dirty = true;
        self.agent.record_heartbeat(seen_at, self.now)
    }

    /// Clears the agent's current task if it is `task_id`
    pub fn release_task(&mut self, task_id: &TaskId) {
        if self.agent.release_task(task_id, self.now) {
            self.agent_dirty = true;
        }
    }

    /// Looks up a task, preferring changes staged in this session
    pub async fn find_task(&self, task_id: &TaskId) -> MonitorResult<Option<TaskRecord>> {
        if let Some(staged) = self.tasks.iter().find(|t| t.id() == task_id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.store.repo.find_task(task_id).await?)
    }

    /// The agent's pending or running task, staged changes included
    pub async fn active_task(&self) -> MonitorResult<Option<TaskRecord>> {
        if let Some(staged) = self.tasks.iter().find(|t| t.is_active()) {
            return Ok(Some(staged.clone()));
        }

        let stored = self.store.repo.find_active_task(self.agent.name()).await?;
        Ok(stored.filter(|task| !self.tasks.iter().any(|t| t.id() == task.id())))
    }

    /// Stages a new pending task for this agent
    ///
    /// Fails with `Conflict` when the agent already has an active task or
    /// the id is taken.
    pub async fn create_task(
        &mut self,
        id: TaskId,
        description: Option<String>,
    ) -> MonitorResult<TaskRecord> {
        self.create_task_with_profile(id, description, TaskProfile::default())
            .await
    }

    pub async fn create_task_with_profile(
        &mut self,
        id: TaskId,
        description: Option<String>,
        profile: TaskProfile,
    ) -> MonitorResult<TaskRecord> {
        if let Some(active) = self.active_task().await? {
            return Err(MonitorError::Conflict(format!(
                "agent {} already has active task {}",
                self.agent.name(),
                active.id()
            )));
        }
        if self.find_task(&id).await?.is_some() {
            return Err(MonitorError::Conflict(format!("task {} already exists", id)));
        }

        let (task, event) = TaskRecord::open(id, self.agent.name(), description, profile, self.now);
        self.events.push(event);
        self.created.push(task.id().clone());
        self.stage(task.clone());
        Ok(task)
    }

    /// Stages one forward step of a task owned by this agent
    pub async fn transition_task(
        &mut self,
        task_id: &TaskId,
        state: TaskState,
        result: Option<String>,
    ) -> MonitorResult<TaskRecord> {
        let mut task = self.owned_task(task_id).await?;

        let event = task.transition_to(state, result, self.now)?;
        self.events.push(event);
        self.stage(task.clone());
        Ok(task)
    }

    /// Stages new token totals for a task owned by this agent
    ///
    /// Returns whether the counts changed; ended tasks keep theirs.
    pub async fn record_usage(&mut self, task_id: &TaskId, usage: TokenUsage) -> MonitorResult<bool> {
        let mut task = self.owned_task(task_id).await?;

        if !task.record_usage(usage) {
            return Ok(false);
        }
        self.stage(task);
        Ok(true)
    }

    async fn owned_task(&self, task_id: &TaskId) -> MonitorResult<TaskRecord> {
        let task = self
            .find_task(task_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("task {}", task_id)))?;

        if task.agent_name() != self.agent.name() {
            return Err(MonitorError::Conflict(format!(
                "task {} belongs to {}",
                task_id,
                task.agent_name()
            )));
        }
        Ok(task)
    }

    fn stage(&mut self, task: TaskRecord) {
        match self.tasks.iter_mut().find(|t| t.id() == task.id()) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    /// Writes every staged change in one transaction
    ///
    /// Returns the agent as stored. New tasks are inserted, never merged
    /// into an existing row, so a task id claimed by another agent's
    /// session in the meantime fails the commit with `Conflict`.
    pub async fn commit(self) -> MonitorResult<AgentRecord> {
        let AgentWrite {
            store,
            _guard,
            agent,
            agent_dirty,
            tasks,
            created: created_ids,
            events,
            ..
        } = self;

        let (created, updated): (Vec<TaskRecord>, Vec<TaskRecord>) = tasks
            .into_iter()
            .partition(|task| created_ids.contains(task.id()));
        let changes = ChangeSet {
            agent: agent_dirty.then(|| agent.clone()),
            created,
            updated,
        };

        if changes.is_empty() {
            return Ok(agent);
        }

        store.repo.commit(&changes).await.map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => MonitorError::Conflict(format!(
                "write for agent {} clashes with a stored task",
                agent.name()
            )),
            sqlx::Error::RowNotFound => MonitorError::Conflict(format!(
                "a task of agent {} changed before the write landed",
                agent.name()
            )),
            other => MonitorError::Storage(other),
        })?;

        for event in &events {
            tracing::info!(
                agent = %agent.name(),
                task_id = %event.task_id(),
                event = event.name(),
                "Task {}",
                event.name()
            );
        }

        Ok(agent)
    }
}
