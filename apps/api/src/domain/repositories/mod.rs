// Repository interfaces (ports)
// Implemented by adapters in the infrastructure layer

pub mod alert_repository;
pub mod state_repository;

pub use alert_repository::AlertRepository;
pub use state_repository::{ChangeSet, StateRepository, StateSnapshot, TaskFilter};
