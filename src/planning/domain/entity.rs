//! Entity kinds and polymorphic entity references.

use super::{BugId, EpicId, FeatureId, PlanningDomainError, StoryId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of planning artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Top-level initiative.
    Epic,
    /// Scoped capability under an epic.
    Feature,
    /// Smallest planning unit.
    Story,
    /// Defect report.
    Bug,
}

impl EntityKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Feature => "feature",
            Self::Story => "story",
            Self::Bug => "bug",
        }
    }
}

impl TryFrom<&str> for EntityKind {
    type Error = PlanningDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "feature" => Ok(Self::Feature),
            "story" | "user_story" => Ok(Self::Story),
            "bug" => Ok(Self::Bug),
            _ => Err(PlanningDomainError::InvalidEntityKind(value.to_owned())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to any local planning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    kind: EntityKind,
    id: Uuid,
}

impl EntityRef {
    /// Creates a reference from raw parts.
    #[must_use]
    pub const fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// References an epic.
    #[must_use]
    pub const fn epic(id: EpicId) -> Self {
        Self::new(EntityKind::Epic, id.into_inner())
    }

    /// References a feature.
    #[must_use]
    pub const fn feature(id: FeatureId) -> Self {
        Self::new(EntityKind::Feature, id.into_inner())
    }

    /// References a user story.
    #[must_use]
    pub const fn story(id: StoryId) -> Self {
        Self::new(EntityKind::Story, id.into_inner())
    }

    /// References a bug.
    #[must_use]
    pub const fn bug(id: BugId) -> Self {
        Self::new(EntityKind::Bug, id.into_inner())
    }

    /// Returns the entity kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the raw entity identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
