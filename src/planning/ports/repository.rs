//! Repository port for planning artefacts and their append-only history.

use crate::planning::domain::{
    Bug, BugId, BugLink, DecisionRecord, DeletionConfirmation, DeletionReceipt, EntityRef, Epic,
    EpicId, EventDraft, Feature, FeatureId, LogEvent, ProposalId, StoryId, UserId, UserStory,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for planning repository operations.
pub type PlanningRepositoryResult<T> = Result<T, PlanningRepositoryError>;

/// Planning persistence contract.
///
/// Every write that touches more than one row runs in a single transaction.
/// Writes of whole aggregates are guarded against stale reads: a stored row
/// in a terminal stage is never overwritten and a stored stage is never
/// moved backwards. Guarded writes that lose fail with
/// [`PlanningRepositoryError::Conflict`].
#[async_trait]
pub trait PlanningRepository: Send + Sync {
    /// Stores a new epic.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::Duplicate`] when the epic exists.
    async fn store_epic(&self, epic: &Epic) -> PlanningRepositoryResult<()>;

    /// Finds an epic by identifier.
    async fn find_epic(&self, id: EpicId) -> PlanningRepositoryResult<Option<Epic>>;

    /// Lists the epics owned by `owner` in creation order.
    async fn list_epics(&self, owner: UserId) -> PlanningRepositoryResult<Vec<Epic>>;

    /// Persists a renamed epic title.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::NotFound`] for unknown epics and
    /// [`PlanningRepositoryError::Conflict`] when the stored epic is locked.
    async fn rename_epic(&self, epic: &Epic) -> PlanningRepositoryResult<()>;

    /// Persists the pending proposal carried by `epic`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::ProposalPending`] when the stored
    /// epic already carries a pending proposal and
    /// [`PlanningRepositoryError::Conflict`] when its stage moved.
    async fn save_proposal(&self, epic: &Epic) -> PlanningRepositoryResult<()>;

    /// Atomically writes the decided epic and appends `decision` to the
    /// decision log.
    ///
    /// The write succeeds only while the stored pending proposal id still
    /// equals `expected`; otherwise nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::StaleProposal`] when the compare
    /// fails, or [`PlanningRepositoryError::Persistence`] when either write
    /// fails, in which case neither is visible.
    async fn commit_decision(
        &self,
        epic: &Epic,
        expected: &ProposalId,
        decision: &DecisionRecord,
    ) -> PlanningRepositoryResult<()>;

    /// Lists the decision log of an epic in insertion order.
    async fn list_decisions(
        &self,
        epic_id: EpicId,
    ) -> PlanningRepositoryResult<Vec<DecisionRecord>>;

    /// Stores a new feature.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::Duplicate`] when the feature exists
    /// or [`PlanningRepositoryError::NotFound`] when its epic does not.
    async fn store_feature(&self, feature: &Feature) -> PlanningRepositoryResult<()>;

    /// Persists changes to an existing feature.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::NotFound`] or
    /// [`PlanningRepositoryError::Conflict`].
    async fn update_feature(&self, feature: &Feature) -> PlanningRepositoryResult<()>;

    /// Finds a feature by identifier.
    async fn find_feature(&self, id: FeatureId) -> PlanningRepositoryResult<Option<Feature>>;

    /// Lists the features of an epic in creation order.
    async fn list_features(&self, epic_id: EpicId) -> PlanningRepositoryResult<Vec<Feature>>;

    /// Stores a new user story.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::Duplicate`] when the story exists
    /// or [`PlanningRepositoryError::NotFound`] when its feature does not.
    async fn store_story(&self, story: &UserStory) -> PlanningRepositoryResult<()>;

    /// Persists changes to an existing user story.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::NotFound`] or
    /// [`PlanningRepositoryError::Conflict`].
    async fn update_story(&self, story: &UserStory) -> PlanningRepositoryResult<()>;

    /// Finds a user story by identifier.
    async fn find_story(&self, id: StoryId) -> PlanningRepositoryResult<Option<UserStory>>;

    /// Lists the stories of a feature in creation order.
    async fn list_stories(&self, feature_id: FeatureId) -> PlanningRepositoryResult<Vec<UserStory>>;

    /// Stores a new bug.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::Duplicate`] when the bug exists.
    async fn store_bug(&self, bug: &Bug) -> PlanningRepositoryResult<()>;

    /// Persists changes to an existing bug.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::NotFound`] or
    /// [`PlanningRepositoryError::Conflict`].
    async fn update_bug(&self, bug: &Bug) -> PlanningRepositoryResult<()>;

    /// Finds a bug by identifier.
    async fn find_bug(&self, id: BugId) -> PlanningRepositoryResult<Option<Bug>>;

    /// Stores a bug link.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::Duplicate`] when the bug is already
    /// linked to the target, or [`PlanningRepositoryError::NotFound`] when
    /// the bug does not exist.
    async fn store_bug_link(&self, link: &BugLink) -> PlanningRepositoryResult<()>;

    /// Lists the distinct bugs linked to any of `targets`, in bug creation
    /// order.
    async fn list_bugs_linked_to(
        &self,
        targets: &[EntityRef],
    ) -> PlanningRepositoryResult<Vec<Bug>>;

    /// Appends an event to the append-only log of `owner`, assigning the next
    /// per-owner sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::NotFound`] when `owner` does not
    /// exist.
    async fn append_event(
        &self,
        owner: EntityRef,
        draft: &EventDraft,
        created_at: DateTime<Utc>,
    ) -> PlanningRepositoryResult<LogEvent>;

    /// Lists the events of `owner` in insertion order.
    async fn list_events(&self, owner: EntityRef) -> PlanningRepositoryResult<Vec<LogEvent>>;

    /// Deletes the confirmed entity, its owned children, their append-only
    /// history, and links pointing at any of them in one transaction, and
    /// records a deletion receipt in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningRepositoryError::NotFound`] when the target does not
    /// exist.
    async fn delete_cascade(
        &self,
        confirmation: &DeletionConfirmation,
        deleted_at: DateTime<Utc>,
    ) -> PlanningRepositoryResult<DeletionReceipt>;

    /// Lists deletion receipts recorded for `actor`, oldest first.
    async fn list_deletion_receipts(
        &self,
        actor: UserId,
    ) -> PlanningRepositoryResult<Vec<DeletionReceipt>>;
}

/// Errors returned by planning repository implementations.
#[derive(Debug, Clone, Error)]
pub enum PlanningRepositoryError {
    /// An entity with the same identifier already exists.
    #[error("duplicate entity: {0}")]
    Duplicate(EntityRef),

    /// The entity was not found.
    #[error("entity not found: {0}")]
    NotFound(EntityRef),

    /// The stored entity changed since it was read.
    #[error("concurrent modification of {0}")]
    Conflict(EntityRef),

    /// The stored epic already carries a pending proposal.
    #[error("epic {0} already has a pending proposal")]
    ProposalPending(EpicId),

    /// The stored pending proposal is not the one being decided.
    #[error("pending proposal of epic {epic_id} is no longer {expected}")]
    StaleProposal {
        /// Epic identifier.
        epic_id: EpicId,
        /// Proposal the caller expected to find.
        expected: ProposalId,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PlanningRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
