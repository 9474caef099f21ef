//! Persistence adapters for the planning module.
//!
//! - [`memory::InMemoryPlanningRepository`]: thread-safe in-memory storage
//!   with fault injection for unit tests
//! - [`postgres::PostgresPlanningRepository`]: `PostgreSQL` persistence using
//!   Diesel, with append-only history guarded by database triggers

pub mod memory;
pub mod postgres;
