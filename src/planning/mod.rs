//! Planning artefact lifecycle management.
//!
//! Epics move through `problem_capture → outcome_capture → epic_final →
//! epic_locked` via a propose/confirm/reject protocol whose every decision is
//! recorded in an append-only decision log. Features, user stories, and bugs
//! follow a simpler `draft → refining → approved` lifecycle and become
//! immutable once approved. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
