//! Domain model for planning artefact lifecycles.
//!
//! The planning domain owns the stage graphs, the epic proposal protocol,
//! work item immutability, and the append-only audit records, while keeping
//! all infrastructure concerns outside of the domain boundary.

mod audit;
mod content;
mod deletion;
mod entity;
mod epic;
mod error;
mod ids;
mod link;
mod stage;
mod work_item;

pub use audit::{
    ConversationEvent, DecisionOutcome, DecisionRecord, EventDraft, EventRole, LogEvent,
    TranscriptEvent,
};
pub use content::{BugSeverity, ContentPatch, EpicContent, EpicField, ItemContent};
pub use deletion::{DeletionConfirmation, DeletionReceipt};
pub use entity::{EntityKind, EntityRef};
pub use epic::{Epic, PendingProposal, PersistedEpicData};
pub use error::{ParseStageError, PlanningDomainError};
pub use ids::{BugId, DecisionId, EpicId, EventId, FeatureId, ProposalId, StoryId, UserId};
pub use link::{BugLink, BugLinkType};
pub use stage::{
    EpicStage, ItemStage, StageGraph, can_advance, ensure_can_advance, ensure_mutable, is_mutable,
    may_overwrite,
};
pub use work_item::{
    Bug, BugMeta, Feature, FeatureMeta, ItemKind, PersistedItemData, StoryMeta, StoryParent,
    UserStory, WorkItem,
};
