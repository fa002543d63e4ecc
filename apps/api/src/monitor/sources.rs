//! Polled task sources
//!
//! The active-tasks file is a JSON document maintained by the agents
//! themselves:
//!
//! ```json
//! {"tasks": [{"id": "t-1", "title": "write parser", "status": "in_progress",
//!             "assignee": "Coder", "priority": "high", "requester": "Chief",
//!             "input_tokens": 1200, "output_tokens": 340}]}
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::domain::task::{TaskProfile, TaskState, TokenUsage};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveTasksDocument {
    #[serde(default)]
    pub tasks: Vec<ActiveTaskEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveTaskEntry {
    #[serde(default)]
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub requester: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
}

impl ActiveTaskEntry {
    /// Task state named by the entry's status
    ///
    /// Unrecognized or missing statuses read as pending.
    pub fn state(&self) -> TaskState {
        match self.status.as_deref().map(str::trim) {
            Some("in_progress") | Some("running") => TaskState::Running,
            Some("completed") | Some("done") => TaskState::Completed,
            Some("failed") => TaskState::Failed,
            _ => TaskState::Pending,
        }
    }

    /// Description for a newly created task, falling back to the title
    pub fn summary(&self) -> Option<String> {
        self.description
            .clone()
            .or_else(|| self.title.clone())
            .filter(|text| !text.trim().is_empty())
    }

    /// Title, priority and requester for a newly created task
    ///
    /// Unrecognized priorities read as normal.
    pub fn profile(&self) -> TaskProfile {
        TaskProfile {
            title: non_blank(self.title.as_deref()),
            priority: self
                .priority
                .as_deref()
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            requester: non_blank(self.requester.as_deref()),
        }
    }

    /// Token totals, when the entry reports any
    pub fn usage(&self) -> Option<TokenUsage> {
        if self.input_tokens.is_none() && self.output_tokens.is_none() {
            return None;
        }
        Some(TokenUsage::new(
            self.input_tokens.unwrap_or(0).max(0),
            self.output_tokens.unwrap_or(0).max(0),
        ))
    }

    pub fn assignee(&self) -> Option<&str> {
        self.assignee
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}

/// Reads the active-tasks file
///
/// A missing file yields `Ok(None)`.
pub async fn read_active_tasks(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn parse_active_tasks(contents: &str) -> Result<ActiveTasksDocument, serde_json::Error> {
    serde_json::from_str(contents)
}
