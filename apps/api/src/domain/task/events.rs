use super::value_objects::TaskId;

/// Domain events emitted by the TaskRecord aggregate
///
/// The store logs these once the change carrying them has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Fired when a task is created for an agent
    Created {
        task_id: TaskId,
        agent_name: String,
    },
    /// Fired when a task moves into running
    Started { task_id: TaskId },
    /// Fired when a task completes
    Completed { task_id: TaskId },
    /// Fired when a task fails or is abandoned
    Failed {
        task_id: TaskId,
        /// Result payload attached to the failure, if any
        reason: Option<String>,
    },
}

impl TaskEvent {
    /// Returns the task_id for this event
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskEvent::Created { task_id, .. } => task_id,
            TaskEvent::Started { task_id } => task_id,
            TaskEvent::Completed { task_id } => task_id,
            TaskEvent::Failed { task_id, .. } => task_id,
        }
    }

    /// Short label used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            TaskEvent::Created { .. } => "created",
            TaskEvent::Started { .. } => "started",
            TaskEvent::Completed { .. } => "completed",
            TaskEvent::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_exposes_task_id() {
        let task_id = TaskId::new("T1");
        let events = [
            TaskEvent::Created {
                task_id: task_id.clone(),
                agent_name: "Coder".to_string(),
            },
            TaskEvent::Started {
                task_id: task_id.clone(),
            },
            TaskEvent::Completed {
                task_id: task_id.clone(),
            },
            TaskEvent::Failed {
                task_id: task_id.clone(),
                reason: None,
            },
        ];

        for event in &events {
            assert_eq!(event.task_id(), &task_id);
        }
        let names: Vec<&str> = events.iter().map(TaskEvent::name).collect();
        assert_eq!(names, vec!["created", "started", "completed", "failed"]);
    }
}
