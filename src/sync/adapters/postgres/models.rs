//! Diesel row models for sync persistence.

use super::schema::{external_integrations, external_push_mappings, external_push_runs};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for integrations.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = external_integrations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IntegrationRow {
    /// Integration identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Tracker tag.
    pub provider: String,
    /// Connection status.
    pub status: String,
    /// Encrypted access token.
    pub access_token_encrypted: Option<Vec<u8>>,
    /// Encrypted refresh token.
    pub refresh_token_encrypted: Option<Vec<u8>>,
    /// Access token expiry.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Default project.
    pub default_project: Option<String>,
    /// Default team.
    pub default_team: Option<String>,
    /// Field mapping configuration.
    pub field_mapping: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for integrations.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = external_integrations)]
pub struct NewIntegrationRow {
    /// Integration identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Tracker tag.
    pub provider: String,
    /// Mutable columns.
    #[diesel(embed)]
    pub changes: IntegrationChanges,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Columns replaced when an existing integration is saved again.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = external_integrations)]
#[diesel(treat_none_as_null = true)]
pub struct IntegrationChanges {
    /// Connection status.
    pub status: String,
    /// Encrypted access token.
    pub access_token_encrypted: Option<Vec<u8>>,
    /// Encrypted refresh token.
    pub refresh_token_encrypted: Option<Vec<u8>>,
    /// Access token expiry.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Default project.
    pub default_project: Option<String>,
    /// Default team.
    pub default_team: Option<String>,
    /// Field mapping configuration.
    pub field_mapping: Value,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for push mappings.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = external_push_mappings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MappingRow {
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Tracker tag.
    pub provider: String,
    /// Local entity kind.
    pub entity_kind: String,
    /// Local entity identifier.
    pub entity_id: uuid::Uuid,
    /// Tracker identifier.
    pub external_id: String,
    /// Human-readable tracker key.
    pub external_key: Option<String>,
    /// Browser URL.
    pub external_url: Option<String>,
    /// Time of the last successful push.
    pub last_pushed_at: DateTime<Utc>,
    /// Hash of the payload last sent.
    pub last_push_hash: String,
}

/// Insert model for push mappings.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = external_push_mappings)]
pub struct NewMappingRow {
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Tracker tag.
    pub provider: String,
    /// Local entity kind.
    pub entity_kind: String,
    /// Local entity identifier.
    pub entity_id: uuid::Uuid,
    /// Mutable columns.
    #[diesel(embed)]
    pub changes: MappingChanges,
}

/// Columns written on every successful push.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = external_push_mappings)]
#[diesel(treat_none_as_null = true)]
pub struct MappingChanges {
    /// Tracker identifier.
    pub external_id: String,
    /// Human-readable tracker key.
    pub external_key: Option<String>,
    /// Browser URL.
    pub external_url: Option<String>,
    /// Time of the last successful push.
    pub last_pushed_at: DateTime<Utc>,
    /// Hash of the payload last sent.
    pub last_push_hash: String,
}

/// Query result row for push runs.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = external_push_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PushRunRow {
    /// Run identifier.
    pub id: uuid::Uuid,
    /// Pushing user.
    pub user_id: uuid::Uuid,
    /// Tracker tag.
    pub provider: String,
    /// Root epic.
    pub epic_id: uuid::Uuid,
    /// Push scope.
    pub scope: String,
    /// Whether linked bugs were included.
    pub include_bugs: bool,
    /// Whether network calls were suppressed.
    pub is_dry_run: bool,
    /// Run status.
    pub status: String,
    /// Created issues.
    pub created: Value,
    /// Updated issues.
    pub updated: Value,
    /// Failed entities.
    pub failed: Value,
    /// Skipped entities.
    pub skipped: Value,
    /// Dry-run classifications.
    pub preview: Value,
    /// Summary counts.
    pub summary: Value,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub ended_at: Option<DateTime<Utc>>,
}

/// Insert model for push runs.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = external_push_runs)]
pub struct NewPushRunRow {
    /// Run identifier.
    pub id: uuid::Uuid,
    /// Pushing user.
    pub user_id: uuid::Uuid,
    /// Tracker tag.
    pub provider: String,
    /// Root epic.
    pub epic_id: uuid::Uuid,
    /// Push scope.
    pub scope: String,
    /// Whether linked bugs were included.
    pub include_bugs: bool,
    /// Whether network calls were suppressed.
    pub is_dry_run: bool,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Outcome columns.
    #[diesel(embed)]
    pub outcome: PushRunOutcome,
}

/// Columns written when a run finishes.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = external_push_runs)]
#[diesel(treat_none_as_null = true)]
pub struct PushRunOutcome {
    /// Run status.
    pub status: String,
    /// Created issues.
    pub created: Value,
    /// Updated issues.
    pub updated: Value,
    /// Failed entities.
    pub failed: Value,
    /// Skipped entities.
    pub skipped: Value,
    /// Dry-run classifications.
    pub preview: Value,
    /// Summary counts.
    pub summary: Value,
    /// End time.
    pub ended_at: Option<DateTime<Utc>>,
}
