// Monitoring core
// Store, collector and aggregator over the domain layer

pub mod aggregator;
pub mod alerts;
pub mod clock;
pub mod collector;
pub mod errors;
pub mod locks;
pub mod sources;
pub mod store;

pub use aggregator::{Aggregator, StatSnapshot};
pub use alerts::{AlertConfig, AlertDetector};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{Collector, SyncError, SyncReport};
pub use errors::{MonitorError, MonitorResult};
pub use store::{AgentWrite, Store};
