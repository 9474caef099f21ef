//! Stage graphs and the stage policy shared by every planning artefact.
//!
//! Each entity type has a strict total order of stages. Advancement is only
//! legal to the immediate successor: no skipping, no regression, and no
//! lateral moves. The terminal stage of each graph freezes the entity.

use super::{EntityRef, ParseStageError, PlanningDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A strictly ordered lifecycle graph.
pub trait StageGraph: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every stage in lifecycle order.
    const ORDER: &'static [Self];

    /// The terminal stage, after which the entity is immutable.
    const TERMINAL: Self;

    /// Returns the zero-based position of the stage in [`Self::ORDER`].
    fn rank(self) -> usize;

    /// Returns the canonical storage representation.
    fn as_str(self) -> &'static str;

    /// Returns the immediate successor, if any.
    fn next(self) -> Option<Self> {
        self.rank()
            .checked_add(1)
            .and_then(|rank| Self::ORDER.get(rank).copied())
    }
}

/// Returns `true` iff `target` is the immediate successor of `current`.
#[must_use]
pub fn can_advance<S: StageGraph>(current: S, target: S) -> bool {
    current
        .rank()
        .checked_add(1)
        .is_some_and(|expected| target.rank() == expected)
}

/// Returns `true` iff entities at `stage` accept field mutations.
#[must_use]
pub fn is_mutable<S: StageGraph>(stage: S) -> bool {
    stage != S::TERMINAL
}

/// Returns `true` iff a stored entity at `stored` may be overwritten by a
/// write carrying `incoming`.
///
/// Stores use this to refuse writes computed from a stale read: a terminal
/// row is never rewritten and a stage never moves backwards.
#[must_use]
pub fn may_overwrite<S: StageGraph>(stored: S, incoming: S) -> bool {
    is_mutable(stored) && stored.rank() <= incoming.rank()
}

/// Validates an advancement for `entity`.
///
/// # Errors
///
/// Returns [`PlanningDomainError::StageViolation`] when `target` is not the
/// immediate successor of `current`.
pub fn ensure_can_advance<S: StageGraph>(
    entity: EntityRef,
    current: S,
    target: S,
) -> Result<(), PlanningDomainError> {
    if can_advance(current, target) {
        return Ok(());
    }
    Err(PlanningDomainError::StageViolation {
        entity,
        from: current.as_str(),
        to: target.as_str(),
    })
}

/// Validates that `entity` may still be mutated.
///
/// # Errors
///
/// Returns [`PlanningDomainError::ImmutableEntity`] when `stage` is terminal.
pub fn ensure_mutable<S: StageGraph>(
    entity: EntityRef,
    stage: S,
) -> Result<(), PlanningDomainError> {
    if is_mutable(stage) {
        return Ok(());
    }
    Err(PlanningDomainError::ImmutableEntity {
        entity,
        stage: stage.as_str(),
    })
}

/// Epic lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicStage {
    /// The problem statement is being captured.
    ProblemCapture,
    /// The desired outcome is being captured.
    OutcomeCapture,
    /// The epic summary is being finalised.
    EpicFinal,
    /// The epic is locked and immutable.
    EpicLocked,
}

impl StageGraph for EpicStage {
    const ORDER: &'static [Self] = &[
        Self::ProblemCapture,
        Self::OutcomeCapture,
        Self::EpicFinal,
        Self::EpicLocked,
    ];
    const TERMINAL: Self = Self::EpicLocked;

    fn rank(self) -> usize {
        match self {
            Self::ProblemCapture => 0,
            Self::OutcomeCapture => 1,
            Self::EpicFinal => 2,
            Self::EpicLocked => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::ProblemCapture => "problem_capture",
            Self::OutcomeCapture => "outcome_capture",
            Self::EpicFinal => "epic_final",
            Self::EpicLocked => "epic_locked",
        }
    }
}

impl TryFrom<&str> for EpicStage {
    type Error = ParseStageError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "problem_capture" => Ok(Self::ProblemCapture),
            "outcome_capture" => Ok(Self::OutcomeCapture),
            "epic_final" => Ok(Self::EpicFinal),
            "epic_locked" => Ok(Self::EpicLocked),
            _ => Err(ParseStageError(value.to_owned())),
        }
    }
}

impl fmt::Display for EpicStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature, user story, and bug lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    /// Newly created, freely editable.
    Draft,
    /// Under active refinement.
    Refining,
    /// Approved and immutable.
    Approved,
}

impl StageGraph for ItemStage {
    const ORDER: &'static [Self] = &[Self::Draft, Self::Refining, Self::Approved];
    const TERMINAL: Self = Self::Approved;

    fn rank(self) -> usize {
        match self {
            Self::Draft => 0,
            Self::Refining => 1,
            Self::Approved => 2,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Refining => "refining",
            Self::Approved => "approved",
        }
    }
}

impl TryFrom<&str> for ItemStage {
    type Error = ParseStageError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "refining" => Ok(Self::Refining),
            "approved" => Ok(Self::Approved),
            _ => Err(ParseStageError(value.to_owned())),
        }
    }
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
