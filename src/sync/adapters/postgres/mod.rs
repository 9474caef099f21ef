//! `PostgreSQL` adapter for sync persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresSyncRepository, SyncPgPool};
