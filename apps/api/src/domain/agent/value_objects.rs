use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reported liveness/activity status of an agent
///
/// The stored value is always the last *reported* status. `Offline` is
/// additionally produced on read when the agent has gone silent for longer
/// than the staleness threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent is up and reachable
    Online,
    /// Agent is up with nothing to do
    Idle,
    /// Agent is working on a task
    Busy,
    /// Agent reported itself down, or went stale
    Offline,
    /// No signal has ever been received
    Unknown,
}

impl AgentStatus {
    /// Whether this status says the agent is alive
    ///
    /// `Offline` and `Unknown` carry no liveness information, so they are
    /// never remembered as the status to resume after a heartbeat.
    pub fn is_live(&self) -> bool {
        !matches!(self, AgentStatus::Offline | AgentStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
            AgentStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(AgentStatus::Online),
            "idle" => Ok(AgentStatus::Idle),
            "busy" => Ok(AgentStatus::Busy),
            "offline" => Ok(AgentStatus::Offline),
            "unknown" => Ok(AgentStatus::Unknown),
            other => Err(format!("Invalid agent status: {}", other)),
        }
    }
}

/// The fixed, ordered set of agent names this deployment tracks
///
/// # Invariants
/// - At least one name
/// - Names are non-blank and unique (case-sensitive)
/// - Order is the definition order and is used for every listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster(Vec<String>);

impl Roster {
    /// Builds a roster from an ordered list of names
    ///
    /// # Example
    /// ```
    /// use agent_dashboard_api::domain::agent::Roster;
    ///
    /// let roster = Roster::new(["Chief", "Coder"]).expect("valid roster");
    /// assert!(roster.contains("Coder"));
    /// assert!(!roster.contains("Designer"));
    /// ```
    pub fn new<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err("Roster names cannot be blank".to_string());
            }
            if seen.contains(&name) {
                return Err(format!("Duplicate roster name: {}", name));
            }
            seen.push(name);
        }

        if seen.is_empty() {
            return Err("Roster cannot be empty".to_string());
        }

        Ok(Self(seen))
    }

    /// Parses a comma-separated list such as `Chief,Coder,HR`
    pub fn parse(list: &str) -> Result<Self, String> {
        Self::new(list.split(',').filter(|part| !part.trim().is_empty()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    /// Display details for a roster member
    ///
    /// The built-in agents carry a description; other names display as
    /// themselves.
    pub fn profile(&self, name: &str) -> Option<AgentProfile> {
        if !self.contains(name) {
            return None;
        }

        let description = BUILT_IN_AGENTS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, description)| description.to_string());

        Some(AgentProfile {
            display_name: name.to_string(),
            description,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

const BUILT_IN_AGENTS: [(&str, &str); 5] = [
    ("Chief", "Lead agent, assigns and coordinates tasks"),
    ("Coder", "Programmer agent, develops code"),
    ("HR", "Human resources agent, handles recruiting and staffing"),
    ("Analyst", "Analyst agent, produces data analysis and reports"),
    ("Ops", "Operations agent, runs and monitors systems"),
];

impl Default for Roster {
    fn default() -> Self {
        Self(
            BUILT_IN_AGENTS
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        )
    }
}

/// How an agent is presented to dashboard clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub display_name: String,
    pub description: Option<String>,
}
