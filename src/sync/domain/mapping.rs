//! Persistent links between local entities and external issues.

use super::{ContentHash, Provider};
use crate::planning::domain::{EntityRef, UserId};
use chrono::{DateTime, Utc};
use std::fmt;

/// Unique key of a mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MappingKey {
    /// Owning user.
    pub user_id: UserId,
    /// Tracker.
    pub provider: Provider,
    /// Local entity.
    pub entity: EntityRef,
}

impl MappingKey {
    /// Creates a mapping key.
    #[must_use]
    pub const fn new(user_id: UserId, provider: Provider, entity: EntityRef) -> Self {
        Self {
            user_id,
            provider,
            entity,
        }
    }
}

/// Mapping from one local entity to its external issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPushMapping {
    /// Unique key.
    pub key: MappingKey,
    /// Tracker identifier.
    pub external_id: String,
    /// Human-readable tracker key.
    pub external_key: Option<String>,
    /// Browser URL of the issue.
    pub external_url: Option<String>,
    /// Time of the last successful push.
    pub last_pushed_at: DateTime<Utc>,
    /// Hash of the payload last sent.
    pub last_push_hash: ContentHash,
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.provider, self.entity)
    }
}
