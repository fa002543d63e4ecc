use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::agent::Roster;

/// One async mutex per roster agent
///
/// The map is built once from the roster and never changes, so looking up a
/// lock needs no synchronization of its own. Writers for different agents
/// never contend.
#[derive(Debug, Default)]
pub struct AgentLocks {
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl AgentLocks {
    pub fn new(roster: &Roster) -> Self {
        let locks = roster
            .names()
            .map(|name| (name.to_string(), Arc::new(Mutex::new(()))))
            .collect();

        Self { locks }
    }

    /// Waits for exclusive write access to `name`
    ///
    /// Returns `None` when `name` is not on the roster.
    pub async fn acquire(&self, name: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = self.locks.get(name)?.clone();
        Some(lock.lock_owned().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn roster() -> Roster {
        Roster::new(["Chief", "Coder"]).unwrap()
    }

    #[tokio::test]
    async fn unknown_names_have_no_lock() {
        let locks = AgentLocks::new(&roster());
        assert!(locks.acquire("Designer").await.is_none());
    }

    #[tokio::test]
    async fn same_agent_is_exclusive() {
        let locks = AgentLocks::new(&roster());
        let _held = locks.acquire("Coder").await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("Coder")).await;
        assert!(second.is_err(), "second writer should wait");
    }

    #[tokio::test]
    async fn different_agents_do_not_block() {
        let locks = AgentLocks::new(&roster());
        let _coder = locks.acquire("Coder").await.unwrap();

        let chief = tokio::time::timeout(Duration::from_millis(50), locks.acquire("Chief")).await;
        assert!(chief.is_ok());
    }
}
