// HTTP handlers, one module per resource

pub mod agents;
pub mod alerts;
pub mod stats;
pub mod system;
pub mod tasks;
