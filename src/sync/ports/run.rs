//! Repository port for push run records.

use crate::planning::domain::{EpicId, UserId};
use crate::sync::domain::{PushRun, PushRunId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for push run repository operations.
pub type PushRunRepositoryResult<T> = Result<T, PushRunRepositoryError>;

/// Push run persistence contract.
///
/// A run is inserted unfinished when a push starts and written once more,
/// completely, when it finishes. Readers treat an unfinished run as
/// informational only.
#[async_trait]
pub trait PushRunRepository: Send + Sync {
    /// Inserts a run that has just started.
    ///
    /// # Errors
    ///
    /// Returns [`PushRunRepositoryError::Duplicate`] when the run exists.
    async fn begin(&self, run: &PushRun) -> PushRunRepositoryResult<()>;

    /// Writes the final lists, summary, status, and end time of a run in
    /// one statement.
    ///
    /// # Errors
    ///
    /// Returns [`PushRunRepositoryError::NotFound`] for unknown runs and
    /// [`PushRunRepositoryError::AlreadyFinished`] when the stored run has
    /// already been finalised.
    async fn finish(&self, run: &PushRun) -> PushRunRepositoryResult<()>;

    /// Finds a run by identifier.
    async fn find(&self, id: PushRunId) -> PushRunRepositoryResult<Option<PushRun>>;

    /// Lists the runs of `user` for `epic`, newest first.
    async fn list_runs(&self, user: UserId, epic: EpicId) -> PushRunRepositoryResult<Vec<PushRun>>;
}

/// Errors returned by push run repository implementations.
#[derive(Debug, Clone, Error)]
pub enum PushRunRepositoryError {
    /// A run with the same identifier already exists.
    #[error("duplicate push run: {0}")]
    Duplicate(PushRunId),

    /// The run was not found.
    #[error("push run not found: {0}")]
    NotFound(PushRunId),

    /// The run has already been finalised.
    #[error("push run {0} is already finished")]
    AlreadyFinished(PushRunId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PushRunRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
