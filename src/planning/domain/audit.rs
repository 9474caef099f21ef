//! Append-only audit records: decision log entries and transcript events.
//!
//! Rows of these types are written once and never updated. They are removed
//! only as part of an explicitly confirmed cascade deletion of their owner.

use super::{
    DecisionId, EntityRef, EpicField, EpicId, EpicStage, EventId, PendingProposal,
    PlanningDomainError, ProposalId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a proposal decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The proposal was applied and the stage advanced.
    Confirmed,
    /// The proposal was discarded without any change.
    Rejected,
}

impl DecisionOutcome {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }
}

impl TryFrom<&str> for DecisionOutcome {
    type Error = PlanningDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(PlanningDomainError::InvalidDecisionOutcome(value.to_owned())),
        }
    }
}

/// Decision log entry written when a proposal is confirmed or rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Entry identifier.
    pub id: DecisionId,
    /// Epic the decision applies to.
    pub epic_id: EpicId,
    /// Proposal that was decided.
    pub proposal_id: ProposalId,
    /// Whether the proposal was confirmed or rejected.
    pub outcome: DecisionOutcome,
    /// Field the proposal targeted.
    pub field: EpicField,
    /// Stage before the decision.
    pub from_stage: EpicStage,
    /// Stage after the decision; equal to `from_stage` for rejections.
    pub to_stage: EpicStage,
    /// Snapshot of the proposed content.
    pub content: String,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub(crate) fn confirmed(
        epic_id: EpicId,
        proposal: &PendingProposal,
        from_stage: EpicStage,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DecisionId::new(),
            epic_id,
            proposal_id: proposal.proposal_id.clone(),
            outcome: DecisionOutcome::Confirmed,
            field: proposal.field,
            from_stage,
            to_stage: proposal.target_stage,
            content: proposal.content.clone(),
            decided_at,
        }
    }

    pub(crate) fn rejected(
        epic_id: EpicId,
        proposal: &PendingProposal,
        stage: EpicStage,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DecisionId::new(),
            epic_id,
            proposal_id: proposal.proposal_id.clone(),
            outcome: DecisionOutcome::Rejected,
            field: proposal.field,
            from_stage: stage,
            to_stage: stage,
            content: proposal.content.clone(),
            decided_at,
        }
    }
}

/// Speaker of a transcript or conversation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRole {
    /// The product owner.
    User,
    /// The text-completion assistant.
    Assistant,
    /// System notices.
    System,
}

impl EventRole {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl TryFrom<&str> for EventRole {
    type Error = PlanningDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(PlanningDomainError::InvalidEventRole(value.to_owned())),
        }
    }
}

impl fmt::Display for EventRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsequenced event submitted for appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Speaker.
    pub role: EventRole,
    /// Event text.
    pub content: String,
}

impl EventDraft {
    /// Creates a draft event.
    #[must_use]
    pub fn new(role: EventRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only event owned by a planning entity.
///
/// Events are ordered by `sequence`, which the store assigns monotonically per
/// owner at insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Event identifier.
    pub id: EventId,
    /// Owning entity.
    pub owner: EntityRef,
    /// Speaker.
    pub role: EventRole,
    /// Event text.
    pub content: String,
    /// Per-owner insertion sequence, starting at 1.
    pub sequence: u64,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
}

/// Epic-owned event recorded while capturing epic content.
pub type TranscriptEvent = LogEvent;

/// Feature-, story-, or bug-owned event recorded during refinement.
pub type ConversationEvent = LogEvent;
