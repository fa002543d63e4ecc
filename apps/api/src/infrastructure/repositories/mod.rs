// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod sqlite_alert_repository;
pub mod sqlite_state_repository;

pub use sqlite_alert_repository::SqliteAlertRepository;
pub use sqlite_state_repository::SqliteStateRepository;
