use super::value_objects::AgentStatus;
use crate::domain::task::TaskId;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Current-state record for one roster agent
///
/// # Invariants
/// - `name` never changes
/// - `last_seen_at` never moves backwards
/// - `last_online_status` only ever holds a live status
///
/// # Example
/// ```
/// use agent_dashboard_api::domain::agent::{AgentRecord, AgentStatus};
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let mut agent = AgentRecord::new("Coder", now);
/// assert_eq!(agent.status(), AgentStatus::Unknown);
///
/// agent.record_report(AgentStatus::Busy, None, now, now);
/// let later = now + Duration::seconds(120);
/// assert_eq!(
///     agent.effective_status(later, Duration::seconds(60)),
///     AgentStatus::Offline
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRecord {
    name: String,
    status: AgentStatus,
    last_online_status: Option<AgentStatus>,
    current_task_id: Option<TaskId>,
    last_seen_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Creates the initial record for a roster name
    ///
    /// No signal has been seen yet, so the status is `Unknown`.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status: AgentStatus::Unknown,
            last_online_status: None,
            current_task_id: None,
            last_seen_at: None,
            updated_at: now,
        }
    }

    /// Applies a full status report
    ///
    /// `seen_at` is when the signal was observed, `now` is the mutation time.
    pub fn record_report(
        &mut self,
        status: AgentStatus,
        current_task_id: Option<TaskId>,
        seen_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        if status.is_live() {
            self.last_online_status = Some(status);
        }
        self.current_task_id = current_task_id;
        self.mark_seen(seen_at);
        self.updated_at = now;
    }

    /// Applies a liveness-only signal
    ///
    /// Only `last_seen_at` moves, unless the stored status is `Offline` or
    /// `Unknown`: then the agent resumes its last live status, or `Idle` if
    /// it never had one. Returns whether the stored status changed.
    pub fn record_heartbeat(&mut self, seen_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.mark_seen(seen_at);

        if self.status.is_live() {
            return false;
        }

        self.status = self.last_online_status.unwrap_or(AgentStatus::Idle);
        self.updated_at = now;
        true
    }

    /// Drops the current task reference if it points at `task_id`
    pub fn release_task(&mut self, task_id: &TaskId, now: DateTime<Utc>) -> bool {
        if self.current_task_id.as_ref() != Some(task_id) {
            return false;
        }

        self.current_task_id = None;
        self.updated_at = now;
        true
    }

    /// Status as observed at `now`
    ///
    /// Silence longer than `threshold` reads as `Offline`. An agent that was
    /// never seen keeps its stored status.
    pub fn effective_status(&self, now: DateTime<Utc>, threshold: Duration) -> AgentStatus {
        match self.last_seen_at {
            Some(seen) if now - seen > threshold => AgentStatus::Offline,
            _ => self.status,
        }
    }

    /// Copy of this record with the staleness projection applied
    pub fn project(&self, now: DateTime<Utc>, threshold: Duration) -> Self {
        Self {
            status: self.effective_status(now, threshold),
            ..self.clone()
        }
    }

    fn mark_seen(&mut self, seen_at: DateTime<Utc>) {
        self.last_seen_at = Some(match self.last_seen_at {
            Some(previous) => previous.max(seen_at),
            None => seen_at,
        });
    }

    // ===== Getters =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn last_online_status(&self) -> Option<AgentStatus> {
        self.last_online_status
    }

    pub fn current_task_id(&self) -> Option<&TaskId> {
        self.current_task_id.as_ref()
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Reconstructs an AgentRecord from persistence layer data
    ///
    /// Only to be used by repository implementations.
    pub fn from_persistence(
        name: String,
        status: AgentStatus,
        last_online_status: Option<AgentStatus>,
        current_task_id: Option<TaskId>,
        last_seen_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            status,
            last_online_status,
            current_task_id,
            last_seen_at,
            updated_at,
        }
    }
}
