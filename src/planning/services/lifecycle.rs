//! Service layer for planning artefact lifecycles.
//!
//! Every operation loads the aggregate, applies the domain rule, and persists
//! the result through the repository. Multi-row writes (a decided epic and
//! its decision log entry, a cascade deletion and its receipt) are delegated
//! to single repository calls so that they commit or roll back together.

use crate::planning::{
    domain::{
        Bug, BugId, BugLink, BugLinkType, BugSeverity, ContentPatch, DecisionRecord,
        DeletionConfirmation, DeletionReceipt, EntityKind, EntityRef, Epic, EpicField, EpicId,
        EpicStage, EventDraft, Feature, FeatureId, ItemContent, LogEvent, PendingProposal,
        PlanningDomainError, ProposalId, StoryId, StoryParent, UserId, UserStory, ensure_mutable,
    },
    ports::{PlanningRepository, PlanningRepositoryError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Request payload for staging an epic proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposeRequest {
    epic_id: EpicId,
    field: EpicField,
    content: String,
    target_stage: EpicStage,
}

impl ProposeRequest {
    /// Creates a proposal request.
    #[must_use]
    pub fn new(
        epic_id: EpicId,
        field: EpicField,
        content: impl Into<String>,
        target_stage: EpicStage,
    ) -> Self {
        Self {
            epic_id,
            field,
            content: content.into(),
            target_stage,
        }
    }
}

/// Service-level errors for planning lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] PlanningDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] PlanningRepositoryError),
    /// The requested entity does not exist.
    #[error("entity not found: {0}")]
    NotFound(EntityRef),
}

/// Result type for lifecycle service operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Planning lifecycle orchestration service.
#[derive(Clone)]
pub struct LifecycleService<R, C>
where
    R: PlanningRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> LifecycleService<R, C>
where
    R: PlanningRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new lifecycle service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    // Epics

    /// Creates an epic in `problem_capture`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Domain`] for a blank title or
    /// [`LifecycleError::Repository`] when persistence fails.
    pub async fn create_epic(
        &self,
        owner: UserId,
        title: impl Into<String> + Send,
    ) -> LifecycleResult<Epic> {
        let epic = Epic::new(owner, title, &*self.clock)?;
        self.repository.store_epic(&epic).await?;
        info!(epic_id = %epic.id(), owner = %owner, "epic created");
        Ok(epic)
    }

    /// Retrieves an epic.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for unknown epics.
    pub async fn get_epic(&self, id: EpicId) -> LifecycleResult<Epic> {
        self.repository
            .find_epic(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(EntityRef::epic(id)))
    }

    /// Lists the epics of `owner` in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_epics(&self, owner: UserId) -> LifecycleResult<Vec<Epic>> {
        Ok(self.repository.list_epics(owner).await?)
    }

    /// Renames an epic that is not yet locked.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once the epic is
    /// locked.
    pub async fn update_epic_title(
        &self,
        id: EpicId,
        title: impl Into<String> + Send,
    ) -> LifecycleResult<Epic> {
        let mut epic = self.get_epic(id).await?;
        epic.rename(title, &*self.clock)?;
        self.repository.rename_epic(&epic).await?;
        Ok(epic)
    }

    /// Stages a proposal on an epic without changing its stage or content.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ProposalAlreadyPending`] while another
    /// proposal awaits a decision and [`PlanningDomainError::StageViolation`]
    /// when the target stage is not the immediate successor.
    pub async fn propose(&self, request: ProposeRequest) -> LifecycleResult<PendingProposal> {
        let ProposeRequest {
            epic_id,
            field,
            content,
            target_stage,
        } = request;
        let mut epic = self.get_epic(epic_id).await?;
        let proposal = epic.propose(field, content, target_stage, &*self.clock)?;
        if let Err(err) = self.repository.save_proposal(&epic).await {
            return Err(self.proposal_save_error(epic_id, err).await);
        }
        info!(
            epic_id = %epic_id,
            proposal_id = %proposal.proposal_id,
            field = %field,
            target_stage = %target_stage,
            "proposal staged"
        );
        Ok(proposal)
    }

    async fn proposal_save_error(
        &self,
        epic_id: EpicId,
        err: PlanningRepositoryError,
    ) -> LifecycleError {
        if !matches!(err, PlanningRepositoryError::ProposalPending(_)) {
            return err.into();
        }
        match self.repository.find_epic(epic_id).await {
            Ok(Some(stored)) => stored.pending_proposal().map_or_else(
                || err.into(),
                |pending| {
                    PlanningDomainError::ProposalAlreadyPending {
                        epic_id,
                        pending: pending.proposal_id.clone(),
                    }
                    .into()
                },
            ),
            Ok(None) => LifecycleError::NotFound(EntityRef::epic(epic_id)),
            Err(lookup) => lookup.into(),
        }
    }

    /// Confirms the pending proposal: applies its content, advances the
    /// stage, clears the proposal, and appends a decision log entry in one
    /// transaction.
    ///
    /// Of two concurrent confirmations of the same proposal only the first
    /// succeeds; the second fails with
    /// [`PlanningDomainError::ProposalMismatch`].
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ProposalMismatch`] or
    /// [`PlanningDomainError::NoPendingProposal`] for a stale or unknown
    /// proposal id, and [`LifecycleError::Repository`] when the commit fails.
    /// On error neither the epic nor the decision log changes.
    pub async fn confirm(
        &self,
        epic_id: EpicId,
        proposal_id: &ProposalId,
    ) -> LifecycleResult<Epic> {
        let mut epic = self.get_epic(epic_id).await?;
        let record = epic.confirm(proposal_id, &*self.clock)?;
        self.commit(&epic, proposal_id, &record).await?;
        info!(
            epic_id = %epic_id,
            proposal_id = %proposal_id,
            from_stage = %record.from_stage,
            to_stage = %record.to_stage,
            "proposal confirmed"
        );
        Ok(epic)
    }

    /// Rejects the pending proposal, logging the rejected content without
    /// changing the epic's content or stage.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ProposalMismatch`] or
    /// [`PlanningDomainError::NoPendingProposal`] for a stale or unknown
    /// proposal id.
    pub async fn reject(&self, epic_id: EpicId, proposal_id: &ProposalId) -> LifecycleResult<Epic> {
        let mut epic = self.get_epic(epic_id).await?;
        let record = epic.reject(proposal_id, &*self.clock)?;
        self.commit(&epic, proposal_id, &record).await?;
        info!(epic_id = %epic_id, proposal_id = %proposal_id, "proposal rejected");
        Ok(epic)
    }

    async fn commit(
        &self,
        epic: &Epic,
        proposal_id: &ProposalId,
        record: &DecisionRecord,
    ) -> LifecycleResult<()> {
        self.repository
            .commit_decision(epic, proposal_id, record)
            .await
            .map_err(|err| match err {
                PlanningRepositoryError::StaleProposal { epic_id, expected } => {
                    warn!(epic_id = %epic_id, proposal_id = %expected, "stale proposal decision");
                    LifecycleError::Domain(PlanningDomainError::ProposalMismatch {
                        epic_id,
                        provided: expected,
                    })
                }
                other => LifecycleError::Repository(other),
            })
    }

    /// Lists the decision log of an epic in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_decisions(&self, epic_id: EpicId) -> LifecycleResult<Vec<DecisionRecord>> {
        Ok(self.repository.list_decisions(epic_id).await?)
    }

    /// Appends a transcript event to an epic that is not yet locked.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for unknown epics and
    /// [`PlanningDomainError::ImmutableEntity`] once the epic is locked.
    pub async fn append_transcript(
        &self,
        epic_id: EpicId,
        draft: EventDraft,
    ) -> LifecycleResult<LogEvent> {
        let epic = self.get_epic(epic_id).await?;
        ensure_mutable(epic.entity_ref(), epic.stage())?;
        Ok(self
            .repository
            .append_event(epic.entity_ref(), &draft, self.clock.utc())
            .await?)
    }

    /// Lists the transcript of an epic in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_transcript(&self, epic_id: EpicId) -> LifecycleResult<Vec<LogEvent>> {
        Ok(self.repository.list_events(EntityRef::epic(epic_id)).await?)
    }

    /// Deletes an epic with its features, their stories, and all of their
    /// append-only history.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ConfirmationMismatch`] when the
    /// confirmation names another entity.
    pub async fn delete_epic(
        &self,
        id: EpicId,
        confirmation: &DeletionConfirmation,
    ) -> LifecycleResult<DeletionReceipt> {
        self.delete(EntityRef::epic(id), confirmation).await
    }

    // Features

    /// Creates a draft feature under an epic at any stage.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] when the epic does not exist.
    pub async fn create_feature(
        &self,
        epic_id: EpicId,
        content: ItemContent,
    ) -> LifecycleResult<Feature> {
        self.get_epic(epic_id).await?;
        let feature = Feature::new(epic_id, content, &*self.clock);
        self.repository.store_feature(&feature).await?;
        info!(feature_id = %feature.id(), epic_id = %epic_id, "feature created");
        Ok(feature)
    }

    /// Retrieves a feature.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for unknown features.
    pub async fn get_feature(&self, id: FeatureId) -> LifecycleResult<Feature> {
        self.repository
            .find_feature(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(EntityRef::feature(id)))
    }

    /// Lists the features of an epic in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_features(&self, epic_id: EpicId) -> LifecycleResult<Vec<Feature>> {
        Ok(self.repository.list_features(epic_id).await?)
    }

    /// Applies a content patch to a feature.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once the feature is
    /// approved; the stored feature is left untouched.
    pub async fn update_feature(
        &self,
        id: FeatureId,
        patch: ContentPatch,
    ) -> LifecycleResult<Feature> {
        let mut feature = self.get_feature(id).await?;
        feature.update(patch, &*self.clock)?;
        self.repository.update_feature(&feature).await?;
        Ok(feature)
    }

    /// Moves a feature from `draft` to `refining`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the feature is
    /// a draft.
    pub async fn start_feature_refinement(&self, id: FeatureId) -> LifecycleResult<Feature> {
        let mut feature = self.get_feature(id).await?;
        feature.start_refinement(&*self.clock)?;
        self.repository.update_feature(&feature).await?;
        info!(feature_id = %id, stage = %feature.stage(), "feature advanced");
        Ok(feature)
    }

    /// Moves a feature from `refining` to `approved`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the feature is
    /// refining.
    pub async fn approve_feature(&self, id: FeatureId) -> LifecycleResult<Feature> {
        let mut feature = self.get_feature(id).await?;
        feature.approve(&*self.clock)?;
        self.repository.update_feature(&feature).await?;
        info!(feature_id = %id, stage = %feature.stage(), "feature approved");
        Ok(feature)
    }

    /// Deletes a feature with its stories and their history.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ConfirmationMismatch`] when the
    /// confirmation names another entity.
    pub async fn delete_feature(
        &self,
        id: FeatureId,
        confirmation: &DeletionConfirmation,
    ) -> LifecycleResult<DeletionReceipt> {
        self.delete(EntityRef::feature(id), confirmation).await
    }

    // User stories

    /// Creates a draft story under a feature.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] when the feature does not exist.
    pub async fn create_story(
        &self,
        feature_id: FeatureId,
        content: ItemContent,
    ) -> LifecycleResult<UserStory> {
        self.get_feature(feature_id).await?;
        let story = UserStory::new(StoryParent::Feature(feature_id), content, &*self.clock);
        self.repository.store_story(&story).await?;
        info!(story_id = %story.id(), feature_id = %feature_id, "story created");
        Ok(story)
    }

    /// Creates a draft story owned directly by a user.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when persistence fails.
    pub async fn create_standalone_story(
        &self,
        owner: UserId,
        content: ItemContent,
    ) -> LifecycleResult<UserStory> {
        let story = UserStory::new(StoryParent::Standalone(owner), content, &*self.clock);
        self.repository.store_story(&story).await?;
        info!(story_id = %story.id(), owner = %owner, "standalone story created");
        Ok(story)
    }

    /// Retrieves a story.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for unknown stories.
    pub async fn get_story(&self, id: StoryId) -> LifecycleResult<UserStory> {
        self.repository
            .find_story(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(EntityRef::story(id)))
    }

    /// Lists the stories of a feature in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_stories(&self, feature_id: FeatureId) -> LifecycleResult<Vec<UserStory>> {
        Ok(self.repository.list_stories(feature_id).await?)
    }

    /// Applies a content patch to a story.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once the story is
    /// approved; the stored story is left untouched.
    pub async fn update_story(
        &self,
        id: StoryId,
        patch: ContentPatch,
    ) -> LifecycleResult<UserStory> {
        let mut story = self.get_story(id).await?;
        story.update(patch, &*self.clock)?;
        self.repository.update_story(&story).await?;
        Ok(story)
    }

    /// Moves a story from `draft` to `refining`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the story is a
    /// draft.
    pub async fn start_story_refinement(&self, id: StoryId) -> LifecycleResult<UserStory> {
        let mut story = self.get_story(id).await?;
        story.start_refinement(&*self.clock)?;
        self.repository.update_story(&story).await?;
        info!(story_id = %id, stage = %story.stage(), "story advanced");
        Ok(story)
    }

    /// Moves a story from `refining` to `approved`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the story is
    /// refining.
    pub async fn approve_story(&self, id: StoryId) -> LifecycleResult<UserStory> {
        let mut story = self.get_story(id).await?;
        story.approve(&*self.clock)?;
        self.repository.update_story(&story).await?;
        info!(story_id = %id, stage = %story.stage(), "story approved");
        Ok(story)
    }

    /// Deletes a story and its history.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ConfirmationMismatch`] when the
    /// confirmation names another entity.
    pub async fn delete_story(
        &self,
        id: StoryId,
        confirmation: &DeletionConfirmation,
    ) -> LifecycleResult<DeletionReceipt> {
        self.delete(EntityRef::story(id), confirmation).await
    }

    // Bugs

    /// Creates a draft bug owned by a user.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when persistence fails.
    pub async fn create_bug(
        &self,
        owner: UserId,
        severity: BugSeverity,
        content: ItemContent,
    ) -> LifecycleResult<Bug> {
        let bug = Bug::new(owner, severity, content, &*self.clock);
        self.repository.store_bug(&bug).await?;
        info!(bug_id = %bug.id(), owner = %owner, severity = %severity, "bug created");
        Ok(bug)
    }

    /// Retrieves a bug.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for unknown bugs.
    pub async fn get_bug(&self, id: BugId) -> LifecycleResult<Bug> {
        self.repository
            .find_bug(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(EntityRef::bug(id)))
    }

    /// Applies a content patch to a bug.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once the bug is
    /// approved.
    pub async fn update_bug(&self, id: BugId, patch: ContentPatch) -> LifecycleResult<Bug> {
        let mut bug = self.get_bug(id).await?;
        bug.update(patch, &*self.clock)?;
        self.repository.update_bug(&bug).await?;
        Ok(bug)
    }

    /// Changes the severity of a bug.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once the bug is
    /// approved.
    pub async fn set_bug_severity(&self, id: BugId, severity: BugSeverity) -> LifecycleResult<Bug> {
        let mut bug = self.get_bug(id).await?;
        bug.set_severity(severity, &*self.clock)?;
        self.repository.update_bug(&bug).await?;
        Ok(bug)
    }

    /// Moves a bug from `draft` to `refining`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the bug is a
    /// draft.
    pub async fn start_bug_refinement(&self, id: BugId) -> LifecycleResult<Bug> {
        let mut bug = self.get_bug(id).await?;
        bug.start_refinement(&*self.clock)?;
        self.repository.update_bug(&bug).await?;
        info!(bug_id = %id, stage = %bug.stage(), "bug advanced");
        Ok(bug)
    }

    /// Moves a bug from `refining` to `approved`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the bug is
    /// refining.
    pub async fn approve_bug(&self, id: BugId) -> LifecycleResult<Bug> {
        let mut bug = self.get_bug(id).await?;
        bug.approve(&*self.clock)?;
        self.repository.update_bug(&bug).await?;
        info!(bug_id = %id, stage = %bug.stage(), "bug approved");
        Ok(bug)
    }

    /// Links a bug to an epic, feature, or story.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::InvalidLinkTarget`] for bug targets and
    /// [`LifecycleError::NotFound`] when the bug or target does not exist.
    pub async fn link_bug(
        &self,
        bug_id: BugId,
        target: EntityRef,
        link_type: BugLinkType,
    ) -> LifecycleResult<BugLink> {
        let link = BugLink::new(bug_id, target, link_type, self.clock.utc())?;
        self.repository
            .store_bug_link(&link)
            .await
            .map_err(|err| match err {
                PlanningRepositoryError::NotFound(entity) => LifecycleError::NotFound(entity),
                other => LifecycleError::Repository(other),
            })?;
        info!(bug_id = %bug_id, target = %target, link_type = %link_type, "bug linked");
        Ok(link)
    }

    /// Lists the distinct bugs linked to any of `targets`, in bug creation
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_bugs_linked_to(&self, targets: &[EntityRef]) -> LifecycleResult<Vec<Bug>> {
        Ok(self.repository.list_bugs_linked_to(targets).await?)
    }

    /// Deletes a bug, its links, and its history.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ConfirmationMismatch`] when the
    /// confirmation names another entity.
    pub async fn delete_bug(
        &self,
        id: BugId,
        confirmation: &DeletionConfirmation,
    ) -> LifecycleResult<DeletionReceipt> {
        self.delete(EntityRef::bug(id), confirmation).await
    }

    // Conversation events

    /// Appends a refinement conversation event to a feature, story, or bug
    /// that is not yet approved.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::InvalidEntityKind`] for epics (use
    /// [`Self::append_transcript`]), [`LifecycleError::NotFound`] for unknown
    /// owners, and [`PlanningDomainError::ImmutableEntity`] once the owner is
    /// approved.
    pub async fn append_conversation(
        &self,
        owner: EntityRef,
        draft: EventDraft,
    ) -> LifecycleResult<LogEvent> {
        let stage = match owner.kind() {
            EntityKind::Epic => {
                return Err(PlanningDomainError::InvalidEntityKind(
                    owner.kind().as_str().to_owned(),
                )
                .into());
            }
            EntityKind::Feature => self
                .get_feature(FeatureId::from_uuid(owner.id()))
                .await?
                .stage(),
            EntityKind::Story => self.get_story(StoryId::from_uuid(owner.id())).await?.stage(),
            EntityKind::Bug => self.get_bug(BugId::from_uuid(owner.id())).await?.stage(),
        };
        ensure_mutable(owner, stage)?;
        Ok(self
            .repository
            .append_event(owner, &draft, self.clock.utc())
            .await?)
    }

    /// Lists the conversation of a feature, story, or bug in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_conversation(&self, owner: EntityRef) -> LifecycleResult<Vec<LogEvent>> {
        Ok(self.repository.list_events(owner).await?)
    }

    /// Lists the deletion receipts recorded for `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Repository`] when the lookup fails.
    pub async fn list_deletion_receipts(
        &self,
        actor: UserId,
    ) -> LifecycleResult<Vec<DeletionReceipt>> {
        Ok(self.repository.list_deletion_receipts(actor).await?)
    }

    async fn delete(
        &self,
        target: EntityRef,
        confirmation: &DeletionConfirmation,
    ) -> LifecycleResult<DeletionReceipt> {
        confirmation.ensure_targets(target)?;
        let receipt = self
            .repository
            .delete_cascade(confirmation, self.clock.utc())
            .await
            .map_err(|err| match err {
                PlanningRepositoryError::NotFound(entity) => LifecycleError::NotFound(entity),
                other => LifecycleError::Repository(other),
            })?;
        warn!(
            target = %receipt.target,
            actor = %receipt.actor,
            reason = %receipt.reason,
            cascaded_rows = receipt.cascaded_rows,
            "entity deleted with its append-only history"
        );
        Ok(receipt)
    }
}
