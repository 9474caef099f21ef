//! Typed links from bugs to other planning entities.

use super::{BugId, EntityKind, EntityRef, PlanningDomainError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship between a bug and the entity it is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugLinkType {
    /// The bug blocks the target.
    Blocks,
    /// The bug is related to the target.
    RelatesTo,
    /// The bug was found while working on the target.
    FoundIn,
}

impl BugLinkType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::RelatesTo => "relates_to",
            Self::FoundIn => "found_in",
        }
    }
}

impl TryFrom<&str> for BugLinkType {
    type Error = PlanningDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blocks" => Ok(Self::Blocks),
            "relates_to" => Ok(Self::RelatesTo),
            "found_in" => Ok(Self::FoundIn),
            _ => Err(PlanningDomainError::InvalidLinkType(value.to_owned())),
        }
    }
}

impl fmt::Display for BugLinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link row between a bug and an epic, feature, or story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugLink {
    /// Linked bug.
    pub bug_id: BugId,
    /// Link target.
    pub target: EntityRef,
    /// Relationship.
    pub link_type: BugLinkType,
    /// Link creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl BugLink {
    /// Creates a link.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::InvalidLinkTarget`] when `target` is a
    /// bug.
    pub fn new(
        bug_id: BugId,
        target: EntityRef,
        link_type: BugLinkType,
        created_at: DateTime<Utc>,
    ) -> Result<Self, PlanningDomainError> {
        if target.kind() == EntityKind::Bug {
            return Err(PlanningDomainError::InvalidLinkTarget(target));
        }
        Ok(Self {
            bug_id,
            target,
            link_type,
            created_at,
        })
    }
}
