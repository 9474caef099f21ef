//! Error types for planning domain validation and parsing.

use super::{EntityRef, EpicId, ProposalId};
use thiserror::Error;

/// Errors returned by planning domain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanningDomainError {
    /// A title is empty after trimming.
    #[error("title must not be empty")]
    EmptyTitle,

    /// The requested stage change is not the immediate successor.
    #[error("illegal stage transition for {entity}: {from} -> {to}")]
    StageViolation {
        /// Entity whose transition was rejected.
        entity: EntityRef,
        /// Current stage.
        from: &'static str,
        /// Requested stage.
        to: &'static str,
    },

    /// A mutation was attempted on an entity whose stage forbids it.
    #[error("{entity} is immutable in stage {stage}")]
    ImmutableEntity {
        /// Entity that rejected the mutation.
        entity: EntityRef,
        /// Stage that forbids mutation.
        stage: &'static str,
    },

    /// A proposal is already pending on the epic.
    #[error("epic {epic_id} already has pending proposal {pending}")]
    ProposalAlreadyPending {
        /// Epic identifier.
        epic_id: EpicId,
        /// Identifier of the pending proposal.
        pending: ProposalId,
    },

    /// The epic has no pending proposal to decide.
    #[error("epic {epic_id} has no pending proposal (got {provided})")]
    NoPendingProposal {
        /// Epic identifier.
        epic_id: EpicId,
        /// Proposal identifier supplied by the caller.
        provided: ProposalId,
    },

    /// The supplied proposal id does not match the pending proposal.
    #[error("proposal {provided} does not match the pending proposal of epic {epic_id}")]
    ProposalMismatch {
        /// Epic identifier.
        epic_id: EpicId,
        /// Proposal identifier supplied by the caller.
        provided: ProposalId,
    },

    /// A deletion confirmation names a different entity.
    #[error("deletion confirmed for {confirmed} but {target} was requested")]
    ConfirmationMismatch {
        /// Entity named by the confirmation.
        confirmed: EntityRef,
        /// Entity actually being deleted.
        target: EntityRef,
    },

    /// A deletion confirmation carries no reason.
    #[error("deletion of {0} requires a non-empty reason")]
    MissingDeletionReason(EntityRef),

    /// The entity kind value is unsupported.
    #[error("unknown entity kind: {0}")]
    InvalidEntityKind(String),

    /// The epic field name is unsupported.
    #[error("unknown epic field: {0}")]
    InvalidEpicField(String),

    /// The bug severity value is unsupported.
    #[error("unknown bug severity: {0}")]
    InvalidSeverity(String),

    /// The bug link type value is unsupported.
    #[error("unknown bug link type: {0}")]
    InvalidLinkType(String),

    /// The decision outcome value is unsupported.
    #[error("unknown decision outcome: {0}")]
    InvalidDecisionOutcome(String),

    /// The event role value is unsupported.
    #[error("unknown event role: {0}")]
    InvalidEventRole(String),

    /// Bugs may not be linked to other bugs.
    #[error("bug {0} cannot be linked to another bug")]
    InvalidLinkTarget(EntityRef),
}

/// Error returned while parsing stages from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown stage: {0}")]
pub struct ParseStageError(pub String);
