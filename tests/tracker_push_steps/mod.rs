//! Step definitions for tracker push scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
