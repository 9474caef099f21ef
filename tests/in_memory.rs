//! In-memory integration tests.
//!
//! Tests are organized into modules by functionality:
//! - `planning_flow_tests`: Artefact lifecycles, history, and cascade deletion
//! - `push_flow_tests`: Integration management and push reconciliation

mod in_memory {
    pub mod helpers;

    mod planning_flow_tests;
    mod push_flow_tests;
}
