//! Agent Dashboard API Library
//!
//! This library tracks the status and task activity of a fixed roster of
//! agents: domain logic, the monitoring core (store, collector, aggregator,
//! alerts), SQLite persistence and the HTTP API.

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod monitor;
