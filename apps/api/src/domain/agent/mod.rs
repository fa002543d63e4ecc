// Agent domain module
// Contains the agent record and its value objects

#![allow(clippy::module_inception)]

pub mod agent;
pub mod value_objects;

pub use agent::AgentRecord;
pub use value_objects::{AgentProfile, AgentStatus, Roster};
