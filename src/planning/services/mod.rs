//! Application services for planning lifecycle orchestration.

mod lifecycle;

pub use lifecycle::{LifecycleError, LifecycleResult, LifecycleService, ProposeRequest};
