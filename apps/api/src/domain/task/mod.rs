// Task domain module
// Contains the task aggregate root, value objects, and domain events

#![allow(clippy::module_inception)]

pub mod events;
pub mod task;
pub mod value_objects;

pub use events::TaskEvent;
pub use task::TaskRecord;
pub use value_objects::{InvalidTransition, TaskId, TaskPriority, TaskProfile, TaskState, TokenUsage};
