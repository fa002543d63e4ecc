// Infrastructure layer module
// Contains the database connection and repository adapters
// Follows Hexagonal Architecture

pub mod database;
pub mod repositories;

pub use database::Database;
