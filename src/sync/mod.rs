//! External tracker synchronisation.
//!
//! Approved planning artefacts are pushed into Jira, Linear, or Azure
//! `DevOps`. Each push walks an epic's subtree in a fixed order, compares a
//! content hash of every payload against the persisted mapping row, and
//! creates, updates, or skips the external issue. A dry-run preview uses the
//! same decision function with network calls suppressed. The module follows
//! hexagonal architecture:
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
