//! Plansync: gated product-planning lifecycle with external tracker sync.
//!
//! This crate manages planning artefacts (Epic, Feature, `UserStory`, Bug)
//! through a monotonic stage lifecycle and pushes approved artefacts into
//! external issue trackers (Jira, Linear, Azure `DevOps`).
//!
//! # Architecture
//!
//! Plansync follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//!
//! # Modules
//!
//! - [`planning`]: Stage policy, entity lifecycle, and the proposal protocol
//! - [`sync`]: Idempotent push reconciliation into external trackers

pub mod planning;
pub mod sync;
