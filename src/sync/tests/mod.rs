//! Unit tests for the sync context.

mod push_service_tests;
mod support;
