//! Domain model for external tracker synchronisation.
//!
//! Holds the provider and integration records, the canonical payload and
//! its content hash, push mappings, push runs, and the pure decision
//! function shared by previews and real pushes.

mod credentials;
mod error;
mod integration;
mod mapping;
mod payload;
mod plan;
mod provider;
mod run;

pub use credentials::{AccessToken, EncryptedCredentials, EncryptedSecret, RefreshToken, TokenGrant};
pub use error::{ErrorCategory, SyncDomainError};
pub use integration::{
    ExternalIntegration, FieldMapping, IntegrationId, IssueTypes, PersistedIntegrationData,
};
pub use mapping::{ExternalPushMapping, MappingKey};
pub use payload::{CanonicalPayload, ContentHash, ParentLink, PushPayload};
pub use plan::{PushDecision, decide};
pub use provider::{ConnectionStatus, Provider};
pub use run::{
    FailedItem, PreviewItem, PushAction, PushRun, PushRunId, PushScope, PushStatus, PushSummary,
    PushedItem, SkipReason, SkippedItem,
};
