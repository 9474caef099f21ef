//! Port contracts for planning lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by planning
//! services and by the sync engine when it reads planning state.

pub mod repository;

pub use repository::{PlanningRepository, PlanningRepositoryError, PlanningRepositoryResult};
