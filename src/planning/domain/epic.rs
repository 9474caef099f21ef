//! Epic aggregate root and the proposal protocol state.

use super::{
    DecisionRecord, EntityRef, EpicContent, EpicField, EpicId, EpicStage, PlanningDomainError,
    ProposalId, UserId, ensure_can_advance, ensure_mutable,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// A staged, unconfirmed content change tied to a stage advancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProposal {
    /// Proposal identifier echoed back on confirm or reject.
    pub proposal_id: ProposalId,
    /// Field the content will be written to.
    pub field: EpicField,
    /// Proposed content.
    pub content: String,
    /// Stage the epic advances to on confirmation.
    pub target_stage: EpicStage,
    /// When the proposal was made.
    pub proposed_at: DateTime<Utc>,
}

/// Epic aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    id: EpicId,
    owner: UserId,
    content: EpicContent,
    stage: EpicStage,
    pending_proposal: Option<PendingProposal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted epic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEpicData {
    /// Persisted epic identifier.
    pub id: EpicId,
    /// Persisted owner.
    pub owner: UserId,
    /// Persisted content.
    pub content: EpicContent,
    /// Persisted stage.
    pub stage: EpicStage,
    /// Persisted pending proposal, if any.
    pub pending_proposal: Option<PendingProposal>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Epic {
    /// Creates a new epic in `problem_capture`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::EmptyTitle`] if the title is blank.
    pub fn new(
        owner: UserId,
        title: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, PlanningDomainError> {
        let timestamp = clock.utc();
        Ok(Self {
            id: EpicId::new(),
            owner,
            content: EpicContent::new(title)?,
            stage: EpicStage::ProblemCapture,
            pending_proposal: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs an epic from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedEpicData) -> Self {
        Self {
            id: data.id,
            owner: data.owner,
            content: data.content,
            stage: data.stage,
            pending_proposal: data.pending_proposal,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the persisted representation of this epic.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedEpicData {
        PersistedEpicData {
            id: self.id,
            owner: self.owner,
            content: self.content.clone(),
            stage: self.stage,
            pending_proposal: self.pending_proposal.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Returns the epic identifier.
    #[must_use]
    pub const fn id(&self) -> EpicId {
        self.id
    }

    /// Returns the entity reference for this epic.
    #[must_use]
    pub const fn entity_ref(&self) -> EntityRef {
        EntityRef::epic(self.id)
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn owner(&self) -> UserId {
        self.owner
    }

    /// Returns the epic content.
    #[must_use]
    pub const fn content(&self) -> &EpicContent {
        &self.content
    }

    /// Returns the current stage.
    #[must_use]
    pub const fn stage(&self) -> EpicStage {
        self.stage
    }

    /// Returns the pending proposal, if any.
    #[must_use]
    pub const fn pending_proposal(&self) -> Option<&PendingProposal> {
        self.pending_proposal.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Renames the epic.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once the epic is
    /// locked, or [`PlanningDomainError::EmptyTitle`] for a blank title.
    pub fn rename(
        &mut self,
        title: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), PlanningDomainError> {
        ensure_mutable(self.entity_ref(), self.stage)?;
        let mut content = self.content.clone();
        content.set_title(title)?;
        self.content = content;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Stages a proposal. Neither the stage nor the content changes.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] for a locked epic,
    /// [`PlanningDomainError::ProposalAlreadyPending`] when another proposal
    /// awaits a decision, or [`PlanningDomainError::StageViolation`] when
    /// `target_stage` is not the immediate successor.
    pub fn propose(
        &mut self,
        field: EpicField,
        content: impl Into<String>,
        target_stage: EpicStage,
        clock: &impl Clock,
    ) -> Result<PendingProposal, PlanningDomainError> {
        ensure_mutable(self.entity_ref(), self.stage)?;
        if let Some(pending) = &self.pending_proposal {
            return Err(PlanningDomainError::ProposalAlreadyPending {
                epic_id: self.id,
                pending: pending.proposal_id.clone(),
            });
        }
        ensure_can_advance(self.entity_ref(), self.stage, target_stage)?;

        let proposal = PendingProposal {
            proposal_id: ProposalId::generate(),
            field,
            content: content.into(),
            target_stage,
            proposed_at: clock.utc(),
        };
        self.pending_proposal = Some(proposal.clone());
        self.updated_at = proposal.proposed_at;
        Ok(proposal)
    }

    /// Applies the pending proposal and advances the stage.
    ///
    /// The caller must persist the mutated epic and the returned decision
    /// record in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::NoPendingProposal`] when nothing is
    /// pending, [`PlanningDomainError::ProposalMismatch`] when `proposal_id`
    /// does not name the pending proposal, or
    /// [`PlanningDomainError::StageViolation`] when the stage moved since the
    /// proposal was made. The epic is unchanged on error.
    pub fn confirm(
        &mut self,
        proposal_id: &ProposalId,
        clock: &impl Clock,
    ) -> Result<DecisionRecord, PlanningDomainError> {
        let proposal = self.matching_proposal(proposal_id)?.clone();
        ensure_can_advance(self.entity_ref(), self.stage, proposal.target_stage)?;

        let decided_at = clock.utc();
        let record = DecisionRecord::confirmed(self.id, &proposal, self.stage, decided_at);
        self.content.set_field(proposal.field, &proposal.content);
        self.stage = proposal.target_stage;
        self.pending_proposal = None;
        self.updated_at = decided_at;
        Ok(record)
    }

    /// Discards the pending proposal without touching content or stage.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::NoPendingProposal`] or
    /// [`PlanningDomainError::ProposalMismatch`] when `proposal_id` does not
    /// name the pending proposal.
    pub fn reject(
        &mut self,
        proposal_id: &ProposalId,
        clock: &impl Clock,
    ) -> Result<DecisionRecord, PlanningDomainError> {
        let proposal = self.matching_proposal(proposal_id)?.clone();
        let decided_at = clock.utc();
        let record = DecisionRecord::rejected(self.id, &proposal, self.stage, decided_at);
        self.pending_proposal = None;
        self.updated_at = decided_at;
        Ok(record)
    }

    fn matching_proposal(
        &self,
        proposal_id: &ProposalId,
    ) -> Result<&PendingProposal, PlanningDomainError> {
        match &self.pending_proposal {
            None => Err(PlanningDomainError::NoPendingProposal {
                epic_id: self.id,
                provided: proposal_id.clone(),
            }),
            Some(pending) if &pending.proposal_id == proposal_id => Ok(pending),
            Some(_) => Err(PlanningDomainError::ProposalMismatch {
                epic_id: self.id,
                provided: proposal_id.clone(),
            }),
        }
    }
}
