//! Push run records.
//!
//! A run is created when a push starts and finalised once every entity in
//! scope has been attempted. A run without `ended_at` is informational
//! only; it never locks anything.

use super::{ErrorCategory, Provider, SyncDomainError};
use crate::planning::domain::{EntityRef, EpicId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a push run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushRunId(Uuid);

impl PushRunId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for PushRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PushRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Portion of an epic's subtree included in a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushScope {
    /// The epic alone.
    EpicOnly,
    /// The epic and its features.
    EpicFeatures,
    /// The epic, its features, and their stories.
    EpicFeaturesStories,
}

impl PushScope {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EpicOnly => "epic_only",
            Self::EpicFeatures => "epic_features",
            Self::EpicFeaturesStories => "epic_features_stories",
        }
    }

    /// Returns `true` when features are in scope.
    #[must_use]
    pub const fn includes_features(self) -> bool {
        matches!(self, Self::EpicFeatures | Self::EpicFeaturesStories)
    }

    /// Returns `true` when stories are in scope.
    #[must_use]
    pub const fn includes_stories(self) -> bool {
        matches!(self, Self::EpicFeaturesStories)
    }
}

impl TryFrom<&str> for PushScope {
    type Error = SyncDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "epic_only" => Ok(Self::EpicOnly),
            "epic_features" => Ok(Self::EpicFeatures),
            "epic_features_stories" => Ok(Self::EpicFeaturesStories),
            _ => Err(SyncDomainError::InvalidScope(value.to_owned())),
        }
    }
}

impl fmt::Display for PushScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    /// Entities are still being attempted.
    Running,
    /// No entity failed.
    Success,
    /// At least one entity succeeded and at least one failed.
    Partial,
    /// Every attempted entity failed.
    Failed,
}

impl PushStatus {
    /// Derives the final status from success and failure counts.
    #[must_use]
    pub const fn from_counts(successes: usize, failures: usize) -> Self {
        match (successes, failures) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for PushStatus {
    type Error = SyncDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            _ => Err(SyncDomainError::InvalidPushStatus(value.to_owned())),
        }
    }
}

impl fmt::Display for PushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified action for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushAction {
    /// Create a new external issue.
    Create,
    /// Update the mapped external issue.
    Update,
    /// Send nothing.
    Skip,
}

/// Why an entity was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The payload hash matches the last push.
    Unchanged,
    /// The entity has not reached its pushable stage.
    NotApproved,
}

/// Entity created or updated in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushedItem {
    /// Local entity.
    pub entity: EntityRef,
    /// Tracker identifier.
    pub external_id: String,
    /// Human-readable tracker key.
    pub external_key: Option<String>,
    /// Browser URL.
    pub external_url: Option<String>,
}

/// Entity whose push failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// Local entity.
    pub entity: EntityRef,
    /// Message template category.
    pub category: ErrorCategory,
    /// User-facing message rendered from the category template.
    pub message: String,
    /// Raw provider error text. Stripped by [`PushRun::redacted`].
    pub detail: Option<String>,
    /// Whether the call was retried.
    pub retried: bool,
    /// Number of calls made.
    pub attempts: u32,
}

/// Entity that was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Local entity.
    pub entity: EntityRef,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Predicted action for one entity in a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewItem {
    /// Local entity.
    pub entity: EntityRef,
    /// Issue title.
    pub title: String,
    /// Predicted action.
    pub action: PushAction,
    /// Skip reason, for skipped entities.
    pub skip_reason: Option<SkipReason>,
}

/// Counts reported for a run.
///
/// The root epic is counted like any other entity, so re-pushing an
/// unchanged epic adds one to `skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSummary {
    /// Created issues, or predicted creations in a dry run.
    pub created: usize,
    /// Updated issues, or predicted updates in a dry run.
    pub updated: usize,
    /// Failed entities.
    pub failed: usize,
    /// Skipped entities.
    pub skipped: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Audit record of one push invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRun {
    /// Run identifier.
    pub id: PushRunId,
    /// Pushing user.
    pub user_id: UserId,
    /// Target tracker.
    pub provider: Provider,
    /// Root epic.
    pub epic_id: EpicId,
    /// Pushed subtree.
    pub scope: PushScope,
    /// Whether linked bugs were included.
    pub include_bugs: bool,
    /// Whether network calls were suppressed.
    pub is_dry_run: bool,
    /// Overall outcome.
    pub status: PushStatus,
    /// Created issues.
    pub created: Vec<PushedItem>,
    /// Updated issues.
    pub updated: Vec<PushedItem>,
    /// Failed entities.
    pub failed: Vec<FailedItem>,
    /// Skipped entities.
    pub skipped: Vec<SkippedItem>,
    /// Predicted actions, filled only for dry runs.
    pub preview: Vec<PreviewItem>,
    /// Counts.
    pub summary: PushSummary,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time, unset while running.
    pub ended_at: Option<DateTime<Utc>>,
}

impl PushRun {
    /// Starts a run in the `running` state.
    #[must_use]
    pub fn start(
        user_id: UserId,
        provider: Provider,
        epic_id: EpicId,
        scope: PushScope,
        include_bugs: bool,
        is_dry_run: bool,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: PushRunId::new(),
            user_id,
            provider,
            epic_id,
            scope,
            include_bugs,
            is_dry_run,
            status: PushStatus::Running,
            created: Vec::new(),
            updated: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            preview: Vec::new(),
            summary: PushSummary::default(),
            started_at: clock.utc(),
            ended_at: None,
        }
    }

    /// Returns `true` once the run has been finalised.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Sets the end time, counts, and final status.
    pub fn finish(&mut self, clock: &impl Clock) {
        let ended_at = clock.utc();
        let (created, updated) = if self.is_dry_run {
            (
                self.count_previewed(PushAction::Create),
                self.count_previewed(PushAction::Update),
            )
        } else {
            (self.created.len(), self.updated.len())
        };
        let duration_ms = ended_at
            .signed_duration_since(self.started_at)
            .num_milliseconds();
        self.summary = PushSummary {
            created,
            updated,
            failed: self.failed.len(),
            skipped: self.skipped.len(),
            duration_ms: u64::try_from(duration_ms).unwrap_or(0),
        };
        self.status = PushStatus::from_counts(
            self.created.len().saturating_add(self.updated.len()),
            self.failed.len(),
        );
        self.ended_at = Some(ended_at);
    }

    /// Returns a copy safe to hand to callers: raw provider error text is
    /// removed from failed items.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for item in &mut copy.failed {
            item.detail = None;
        }
        copy
    }

    fn count_previewed(&self, action: PushAction) -> usize {
        self.preview
            .iter()
            .filter(|item| item.action == action)
            .count()
    }
}
