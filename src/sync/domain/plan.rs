//! The create/update/skip decision shared by previews and pushes.

use super::{ContentHash, ExternalPushMapping, PushAction, SkipReason};

/// Classification of one entity within a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDecision {
    /// No mapping exists; the issue is created.
    Create,
    /// The mapping exists but the payload changed; the issue is updated.
    Update(ExternalPushMapping),
    /// Nothing is sent.
    Skip(SkipReason),
}

impl PushDecision {
    /// Returns the action reported in previews and summaries.
    #[must_use]
    pub const fn action(&self) -> PushAction {
        match self {
            Self::Create => PushAction::Create,
            Self::Update(_) => PushAction::Update,
            Self::Skip(_) => PushAction::Skip,
        }
    }
}

/// Classifies an entity.
///
/// Ineligible entities are skipped before the mapping is consulted; an
/// eligible entity is created without a mapping, skipped when the hash
/// matches the last push, and updated otherwise.
#[must_use]
pub fn decide(
    eligible: bool,
    hash: &ContentHash,
    mapping: Option<ExternalPushMapping>,
) -> PushDecision {
    if !eligible {
        return PushDecision::Skip(SkipReason::NotApproved);
    }
    match mapping {
        None => PushDecision::Create,
        Some(existing) if &existing.last_push_hash == hash => {
            PushDecision::Skip(SkipReason::Unchanged)
        }
        Some(existing) => PushDecision::Update(existing),
    }
}
