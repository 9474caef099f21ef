//! Repository port for per-user tracker integrations.

use crate::planning::domain::UserId;
use crate::sync::domain::{ExternalIntegration, Provider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for integration repository operations.
pub type IntegrationRepositoryResult<T> = Result<T, IntegrationRepositoryError>;

/// Integration persistence contract. Rows are unique per user and provider.
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Finds the integration of `user` with `provider`.
    async fn find(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationRepositoryResult<Option<ExternalIntegration>>;

    /// Inserts or replaces the integration keyed by its user and provider.
    async fn save(&self, integration: &ExternalIntegration) -> IntegrationRepositoryResult<()>;

    /// Lists the integrations of `user`.
    async fn list(&self, user: UserId) -> IntegrationRepositoryResult<Vec<ExternalIntegration>>;
}

/// Errors returned by integration repository implementations.
#[derive(Debug, Clone, Error)]
pub enum IntegrationRepositoryError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl IntegrationRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
