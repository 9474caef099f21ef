//! Service layer for tracker synchronisation.
//!
//! [`PushService`] plans, previews, and executes pushes; the
//! [`IntegrationService`] manages per-user tracker connections. Both decrypt
//! credentials only for the duration of the tracker calls that need them.

mod config;
mod credentials;
mod integration;
mod messages;
mod push;
mod registry;
mod retry;

pub use config::{PushConfig, RetryPolicy};
pub use credentials::CredentialError;
pub use integration::{ConnectRequest, IntegrationError, IntegrationResult, IntegrationService};
pub use messages::FailureMessages;
pub use push::{PushError, PushRequest, PushResult, PushService, SyncStores};
pub use registry::ProviderRegistry;
pub use retry::{Attempted, call_with_retry};
