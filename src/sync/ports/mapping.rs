//! Repository port for external push mappings.

use crate::planning::domain::UserId;
use crate::sync::domain::{ContentHash, ExternalPushMapping, MappingKey, Provider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for mapping repository operations.
pub type MappingRepositoryResult<T> = Result<T, MappingRepositoryError>;

/// Mapping persistence contract.
///
/// At most one row exists per [`MappingKey`]. Writes are compare-and-set on
/// the stored `last_push_hash`, so two pushes racing on the same entity
/// cannot silently overwrite each other.
#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// Finds the mapping stored under `key`.
    async fn find(&self, key: &MappingKey)
    -> MappingRepositoryResult<Option<ExternalPushMapping>>;

    /// Inserts or updates `mapping` when the stored hash equals `expected`.
    ///
    /// `expected = None` requires that no row exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`MappingRepositoryError::Conflict`] when the stored row does
    /// not match `expected`; nothing is written in that case.
    async fn upsert_if(
        &self,
        mapping: &ExternalPushMapping,
        expected: Option<&ContentHash>,
    ) -> MappingRepositoryResult<()>;

    /// Lists the mappings of `user` for `provider`.
    async fn list(
        &self,
        user: UserId,
        provider: Provider,
    ) -> MappingRepositoryResult<Vec<ExternalPushMapping>>;
}

/// Errors returned by mapping repository implementations.
#[derive(Debug, Clone, Error)]
pub enum MappingRepositoryError {
    /// The stored row changed since it was read.
    #[error("mapping {0} was modified concurrently")]
    Conflict(MappingKey),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl MappingRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
