use super::events::TaskEvent;
use super::value_objects::{InvalidTransition, TaskId, TaskProfile, TaskState, TokenUsage};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// TaskRecord aggregate root
///
/// One execution attempt of a task by a single agent.
///
/// # Invariants
/// - State only moves forward along the task state machine
/// - `started_at` is set exactly when entering Running
/// - `ended_at` is set exactly when entering Completed or Failed
/// - Once `ended_at` is set no further change is accepted, token usage
///   included
///
/// # Example
/// ```
/// use agent_dashboard_api::domain::task::{TaskId, TaskRecord, TaskState};
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let (mut task, _created) = TaskRecord::new(TaskId::generate(), "Coder", None, now);
/// task.transition_to(TaskState::Running, None, now).expect("pending -> running");
/// task.transition_to(TaskState::Completed, Some("ok".into()), now).expect("running -> completed");
///
/// assert!(task.ended_at().is_some());
/// assert!(task.transition_to(TaskState::Failed, None, now).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    id: TaskId,
    agent_name: String,
    state: TaskState,
    description: Option<String>,
    result: Option<String>,
    profile: TaskProfile,
    usage: TokenUsage,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Creates a new pending task owned by `agent_name`
    ///
    /// # Returns
    /// The new record and its Created event
    pub fn new(
        id: TaskId,
        agent_name: impl Into<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> (Self, TaskEvent) {
        Self::open(id, agent_name, description, TaskProfile::default(), now)
    }

    /// Creates a new pending task carrying title, priority and requester
    pub fn open(
        id: TaskId,
        agent_name: impl Into<String>,
        description: Option<String>,
        profile: TaskProfile,
        now: DateTime<Utc>,
    ) -> (Self, TaskEvent) {
        let task = Self {
            id,
            agent_name: agent_name.into(),
            state: TaskState::Pending,
            description,
            result: None,
            profile,
            usage: TokenUsage::default(),
            created_at: now,
            started_at: None,
            ended_at: None,
        };

        let event = TaskEvent::Created {
            task_id: task.id.clone(),
            agent_name: task.agent_name.clone(),
        };

        (task, event)
    }

    /// Moves the task to `next`
    ///
    /// # Arguments
    /// * `next` - Target state, must be a legal forward step
    /// * `result` - Optional opaque payload, replaces any previous one
    /// * `now` - Timestamp for `started_at`/`ended_at`
    ///
    /// # Returns
    /// * `Ok(TaskEvent)` - Event describing the change
    /// * `Err(InvalidTransition)` - Backward, same-state or skipping step
    pub fn transition_to(
        &mut self,
        next: TaskState,
        result: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TaskEvent, InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        self.state = next;
        if result.is_some() {
            self.result = result;
        }

        let task_id = self.id.clone();
        let event = match next {
            TaskState::Running => {
                self.started_at = Some(now);
                TaskEvent::Started { task_id }
            }
            TaskState::Completed => {
                self.ended_at = Some(now);
                TaskEvent::Completed { task_id }
            }
            TaskState::Failed => {
                self.ended_at = Some(now);
                TaskEvent::Failed {
                    task_id,
                    reason: self.result.clone(),
                }
            }
            TaskState::Pending => unreachable!("pending is never a transition target"),
        };

        Ok(event)
    }

    /// Replaces the token counts with the latest reported totals
    ///
    /// Returns whether anything changed. Ended tasks keep their counts.
    pub fn record_usage(&mut self, usage: TokenUsage) -> bool {
        if self.ended_at.is_some() || self.usage == usage {
            return false;
        }
        self.usage = usage;
        true
    }

    /// Wall time between start and end, when both are known
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    // ===== Getters =====

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn profile(&self) -> &TaskProfile {
        &self.profile
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Reconstructs a TaskRecord from persistence layer data
    ///
    /// Bypasses state machine validation; only to be used by repository
    /// implementations.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persistence(
        id: TaskId,
        agent_name: String,
        state: TaskState,
        description: Option<String>,
        result: Option<String>,
        profile: TaskProfile,
        usage: TokenUsage,
        created_at: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            agent_name,
            state,
            description,
            result,
            profile,
            usage,
            created_at,
            started_at,
            ended_at,
        }
    }
}
