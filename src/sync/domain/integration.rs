//! Per-user tracker integrations and their field mapping configuration.

use super::{ConnectionStatus, EncryptedCredentials, Provider, SyncDomainError};
use crate::planning::domain::{EntityKind, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of an integration row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntegrationId(Uuid);

impl IntegrationId {
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

impl Default for IntegrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracker issue type used for each local entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueTypes {
    /// Issue type for epics.
    pub epic: String,
    /// Issue type for features.
    pub feature: String,
    /// Issue type for user stories.
    pub story: String,
    /// Issue type for bugs.
    pub bug: String,
}

impl Default for IssueTypes {
    fn default() -> Self {
        Self {
            epic: "Epic".to_owned(),
            feature: "Feature".to_owned(),
            story: "Story".to_owned(),
            bug: "Bug".to_owned(),
        }
    }
}

/// Selects which local fields are pushed and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Issue type per entity kind.
    pub issue_types: IssueTypes,
    /// Whether acceptance criteria are pushed.
    pub include_acceptance_criteria: bool,
    /// Whether entity labels are pushed.
    pub include_labels: bool,
    /// Labels added to every pushed issue.
    pub extra_labels: Vec<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            issue_types: IssueTypes::default(),
            include_acceptance_criteria: true,
            include_labels: true,
            extra_labels: Vec::new(),
        }
    }
}

impl FieldMapping {
    /// Returns the issue type configured for `kind`.
    #[must_use]
    pub fn issue_type(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Epic => &self.issue_types.epic,
            EntityKind::Feature => &self.issue_types.feature,
            EntityKind::Story => &self.issue_types.story,
            EntityKind::Bug => &self.issue_types.bug,
        }
    }
}

/// One user's connection to one tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIntegration {
    id: IntegrationId,
    user_id: UserId,
    provider: Provider,
    status: ConnectionStatus,
    credentials: Option<EncryptedCredentials>,
    default_project: Option<String>,
    default_team: Option<String>,
    field_mapping: FieldMapping,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedIntegrationData {
    /// Persisted identifier.
    pub id: IntegrationId,
    /// Owning user.
    pub user_id: UserId,
    /// Tracker.
    pub provider: Provider,
    /// Connection status.
    pub status: ConnectionStatus,
    /// Encrypted tokens.
    pub credentials: Option<EncryptedCredentials>,
    /// Default project key or identifier.
    pub default_project: Option<String>,
    /// Default team identifier.
    pub default_team: Option<String>,
    /// Field mapping configuration.
    pub field_mapping: FieldMapping,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ExternalIntegration {
    /// Creates a disconnected integration with the default field mapping.
    #[must_use]
    pub fn new(user_id: UserId, provider: Provider, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: IntegrationId::new(),
            user_id,
            provider,
            status: ConnectionStatus::NotConnected,
            credentials: None,
            default_project: None,
            default_team: None,
            field_mapping: FieldMapping::default(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs an integration from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedIntegrationData) -> Self {
        Self {
            id: data.id,
            user_id: data.user_id,
            provider: data.provider,
            status: data.status,
            credentials: data.credentials,
            default_project: data.default_project,
            default_team: data.default_team,
            field_mapping: data.field_mapping,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the integration identifier.
    #[must_use]
    pub const fn id(&self) -> IntegrationId {
        self.id
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the tracker.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    /// Returns the connection status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Returns the encrypted tokens, if any.
    #[must_use]
    pub const fn credentials(&self) -> Option<&EncryptedCredentials> {
        self.credentials.as_ref()
    }

    /// Returns the default project.
    #[must_use]
    pub fn default_project(&self) -> Option<&str> {
        self.default_project.as_deref()
    }

    /// Returns the default team.
    #[must_use]
    pub fn default_team(&self) -> Option<&str> {
        self.default_team.as_deref()
    }

    /// Returns the field mapping.
    #[must_use]
    pub const fn field_mapping(&self) -> &FieldMapping {
        &self.field_mapping
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns where new issues are created.
    ///
    /// Linear files issues under a team, so its team takes precedence; the
    /// other trackers use the default project.
    #[must_use]
    pub fn push_target(&self) -> Option<&str> {
        match self.provider {
            Provider::Linear => self.default_team().or_else(|| self.default_project()),
            Provider::Jira | Provider::AzureDevOps => self.default_project(),
        }
    }

    /// Returns the stored tokens of a connected integration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::NotConnected`] unless the status is
    /// `connected` and credentials are present.
    pub fn connected_credentials(&self) -> Result<&EncryptedCredentials, SyncDomainError> {
        match (self.status, &self.credentials) {
            (ConnectionStatus::Connected, Some(credentials)) => Ok(credentials),
            _ => Err(SyncDomainError::NotConnected(self.provider)),
        }
    }

    /// Stores fresh credentials and marks the integration connected.
    pub fn connect(&mut self, credentials: EncryptedCredentials, clock: &impl Clock) {
        self.credentials = Some(credentials);
        self.status = ConnectionStatus::Connected;
        self.updated_at = clock.utc();
    }

    /// Drops the stored credentials.
    pub fn disconnect(&mut self, clock: &impl Clock) {
        self.credentials = None;
        self.status = ConnectionStatus::NotConnected;
        self.updated_at = clock.utc();
    }

    /// Marks the integration as failing authentication. Credentials are kept
    /// so that the user can retry a refresh.
    pub fn mark_errored(&mut self, clock: &impl Clock) {
        self.status = ConnectionStatus::Errored;
        self.updated_at = clock.utc();
    }

    /// Sets the default project and team.
    pub fn set_defaults(
        &mut self,
        project: Option<String>,
        team: Option<String>,
        clock: &impl Clock,
    ) {
        self.default_project = project.filter(|value| !value.trim().is_empty());
        self.default_team = team.filter(|value| !value.trim().is_empty());
        self.updated_at = clock.utc();
    }

    /// Replaces the field mapping.
    pub fn set_field_mapping(&mut self, mapping: FieldMapping, clock: &impl Clock) {
        self.field_mapping = mapping;
        self.updated_at = clock.utc();
    }
}
