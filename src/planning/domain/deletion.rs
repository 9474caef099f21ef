//! Explicit, auditable cascade deletion.

use super::{EntityRef, PlanningDomainError, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller's explicit confirmation that an entity and its append-only history
/// may be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionConfirmation {
    target: EntityRef,
    actor: UserId,
    reason: String,
}

impl DeletionConfirmation {
    /// Creates a confirmation for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::MissingDeletionReason`] when `reason` is
    /// blank.
    pub fn new(
        target: EntityRef,
        actor: UserId,
        reason: impl Into<String>,
    ) -> Result<Self, PlanningDomainError> {
        let raw = reason.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PlanningDomainError::MissingDeletionReason(target));
        }
        Ok(Self {
            target,
            actor,
            reason: trimmed.to_owned(),
        })
    }

    /// Returns the confirmed entity.
    #[must_use]
    pub const fn target(&self) -> EntityRef {
        self.target
    }

    /// Returns the confirming user.
    #[must_use]
    pub const fn actor(&self) -> UserId {
        self.actor
    }

    /// Returns the stated reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Checks that this confirmation names `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ConfirmationMismatch`] otherwise.
    pub fn ensure_targets(&self, target: EntityRef) -> Result<(), PlanningDomainError> {
        if self.target == target {
            return Ok(());
        }
        Err(PlanningDomainError::ConfirmationMismatch {
            confirmed: self.target,
            target,
        })
    }
}

/// Audit record written in the same transaction as a cascade deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReceipt {
    /// Deleted root entity.
    pub target: EntityRef,
    /// User who confirmed the deletion.
    pub actor: UserId,
    /// Stated reason.
    pub reason: String,
    /// Number of append-only rows removed with the entity.
    pub cascaded_rows: u64,
    /// Deletion timestamp.
    pub deleted_at: DateTime<Utc>,
}
