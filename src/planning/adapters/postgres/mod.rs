//! `PostgreSQL` adapters for planning persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PlanningPgPool, PostgresPlanningRepository};
