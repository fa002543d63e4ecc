use thiserror::Error;

use crate::domain::task::InvalidTransition;

/// Errors surfaced by the store, collector and aggregator
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl MonitorError {
    /// Whether this error came from the persistence layer
    pub fn is_storage(&self) -> bool {
        matches!(self, MonitorError::Storage(_))
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
