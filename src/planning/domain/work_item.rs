//! Features, user stories, and bugs.
//!
//! All three share the `draft → refining → approved` lifecycle, an
//! `approved_at` timestamp written exactly once, and the rule that approved
//! items reject every mutation. They differ only in ownership metadata, so
//! they are modelled as one generic aggregate parameterised by an
//! [`ItemKind`].

use super::{
    BugId, BugSeverity, ContentPatch, EntityKind, EntityRef, EpicId, FeatureId, ItemContent,
    ItemStage, PlanningDomainError, StoryId, UserId, ensure_can_advance, ensure_mutable,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

/// Kind-specific metadata of a work item.
pub trait ItemKind: Clone + fmt::Debug + PartialEq + Eq + Send + Sync + 'static {
    /// Typed identifier of the item.
    type Id: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Entity kind tag.
    const KIND: EntityKind;

    /// Generates a fresh identifier.
    fn new_id() -> Self::Id;

    /// Returns the raw UUID of an identifier.
    fn raw_id(id: Self::Id) -> Uuid;
}

/// Ownership metadata of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMeta {
    /// Owning epic.
    pub epic_id: EpicId,
}

impl ItemKind for FeatureMeta {
    type Id = FeatureId;
    const KIND: EntityKind = EntityKind::Feature;

    fn new_id() -> Self::Id {
        FeatureId::new()
    }

    fn raw_id(id: Self::Id) -> Uuid {
        id.into_inner()
    }
}

/// Owner of a user story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryParent {
    /// Story refines a feature.
    Feature(FeatureId),
    /// Story is owned directly by a user.
    Standalone(UserId),
}

/// Ownership metadata of a user story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryMeta {
    /// Owning feature or user.
    pub parent: StoryParent,
}

impl ItemKind for StoryMeta {
    type Id = StoryId;
    const KIND: EntityKind = EntityKind::Story;

    fn new_id() -> Self::Id {
        StoryId::new()
    }

    fn raw_id(id: Self::Id) -> Uuid {
        id.into_inner()
    }
}

/// Ownership and triage metadata of a bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugMeta {
    /// Owning user.
    pub owner: UserId,
    /// Triage severity.
    pub severity: BugSeverity,
}

impl ItemKind for BugMeta {
    type Id = BugId;
    const KIND: EntityKind = EntityKind::Bug;

    fn new_id() -> Self::Id {
        BugId::new()
    }

    fn raw_id(id: Self::Id) -> Uuid {
        id.into_inner()
    }
}

/// Generic work item aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<K: ItemKind> {
    id: K::Id,
    meta: K,
    content: ItemContent,
    stage: ItemStage,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Feature owned by an epic.
pub type Feature = WorkItem<FeatureMeta>;

/// User story owned by a feature or directly by a user.
pub type UserStory = WorkItem<StoryMeta>;

/// Bug owned by a user.
pub type Bug = WorkItem<BugMeta>;

/// Parameter object for reconstructing a persisted work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedItemData<K: ItemKind> {
    /// Persisted identifier.
    pub id: K::Id,
    /// Persisted kind-specific metadata.
    pub meta: K,
    /// Persisted content.
    pub content: ItemContent,
    /// Persisted stage.
    pub stage: ItemStage,
    /// Persisted approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl<K: ItemKind> WorkItem<K> {
    fn create(meta: K, content: ItemContent, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: K::new_id(),
            meta,
            content,
            stage: ItemStage::Draft,
            approved_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a work item from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedItemData<K>) -> Self {
        Self {
            id: data.id,
            meta: data.meta,
            content: data.content,
            stage: data.stage,
            approved_at: data.approved_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the typed identifier.
    #[must_use]
    pub const fn id(&self) -> K::Id {
        self.id
    }

    /// Returns the entity reference for this item.
    #[must_use]
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(K::KIND, K::raw_id(self.id))
    }

    /// Returns the kind-specific metadata.
    #[must_use]
    pub const fn meta(&self) -> &K {
        &self.meta
    }

    /// Returns the content.
    #[must_use]
    pub const fn content(&self) -> &ItemContent {
        &self.content
    }

    /// Returns the current stage.
    #[must_use]
    pub const fn stage(&self) -> ItemStage {
        self.stage
    }

    /// Returns `true` once the item is approved.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self.stage, ItemStage::Approved)
    }

    /// Returns the approval timestamp.
    #[must_use]
    pub const fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
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

    /// Validates that the item still accepts mutations.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once approved.
    pub fn ensure_mutable(&self) -> Result<(), PlanningDomainError> {
        ensure_mutable(self.entity_ref(), self.stage)
    }

    /// Applies a content patch.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once approved, or
    /// [`PlanningDomainError::EmptyTitle`] when the patch blanks the title.
    /// The item is unchanged on error.
    pub fn update(
        &mut self,
        patch: ContentPatch,
        clock: &impl Clock,
    ) -> Result<(), PlanningDomainError> {
        self.ensure_mutable()?;
        self.content = self.content.patched(patch)?;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Moves the item from `draft` to `refining`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the item is a
    /// draft.
    pub fn start_refinement(&mut self, clock: &impl Clock) -> Result<(), PlanningDomainError> {
        self.advance(ItemStage::Refining, clock)
    }

    /// Moves the item from `refining` to `approved` and stamps `approved_at`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::StageViolation`] unless the item is
    /// refining.
    pub fn approve(&mut self, clock: &impl Clock) -> Result<(), PlanningDomainError> {
        self.advance(ItemStage::Approved, clock)
    }

    fn advance(
        &mut self,
        target: ItemStage,
        clock: &impl Clock,
    ) -> Result<(), PlanningDomainError> {
        ensure_can_advance(self.entity_ref(), self.stage, target)?;
        let timestamp = clock.utc();
        if target == ItemStage::Approved && self.approved_at.is_none() {
            self.approved_at = Some(timestamp);
        }
        self.stage = target;
        self.updated_at = timestamp;
        Ok(())
    }
}

impl WorkItem<FeatureMeta> {
    /// Creates a draft feature under `epic_id`.
    #[must_use]
    pub fn new(epic_id: EpicId, content: ItemContent, clock: &impl Clock) -> Self {
        Self::create(FeatureMeta { epic_id }, content, clock)
    }

    /// Returns the owning epic.
    #[must_use]
    pub const fn epic_id(&self) -> EpicId {
        self.meta.epic_id
    }
}

impl WorkItem<StoryMeta> {
    /// Creates a draft story owned by `parent`.
    #[must_use]
    pub fn new(parent: StoryParent, content: ItemContent, clock: &impl Clock) -> Self {
        Self::create(StoryMeta { parent }, content, clock)
    }

    /// Returns the owning feature or user.
    #[must_use]
    pub const fn parent(&self) -> StoryParent {
        self.meta.parent
    }

    /// Returns the owning feature, if the story is not standalone.
    #[must_use]
    pub const fn feature_id(&self) -> Option<FeatureId> {
        match self.meta.parent {
            StoryParent::Feature(feature_id) => Some(feature_id),
            StoryParent::Standalone(_) => None,
        }
    }
}

impl WorkItem<BugMeta> {
    /// Creates a draft bug owned by `owner`.
    #[must_use]
    pub fn new(
        owner: UserId,
        severity: BugSeverity,
        content: ItemContent,
        clock: &impl Clock,
    ) -> Self {
        Self::create(BugMeta { owner, severity }, content, clock)
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn owner(&self) -> UserId {
        self.meta.owner
    }

    /// Returns the severity.
    #[must_use]
    pub const fn severity(&self) -> BugSeverity {
        self.meta.severity
    }

    /// Changes the severity.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::ImmutableEntity`] once approved.
    pub fn set_severity(
        &mut self,
        severity: BugSeverity,
        clock: &impl Clock,
    ) -> Result<(), PlanningDomainError> {
        self.ensure_mutable()?;
        self.meta.severity = severity;
        self.updated_at = clock.utc();
        Ok(())
    }
}
