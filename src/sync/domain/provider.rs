//! Provider tags and connection status.

use super::SyncDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External issue tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Atlassian Jira Cloud.
    Jira,
    /// Linear.
    Linear,
    /// Azure `DevOps` Boards.
    AzureDevOps,
}

impl Provider {
    /// Every supported provider.
    pub const ALL: [Self; 3] = [Self::Jira, Self::Linear, Self::AzureDevOps];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jira => "jira",
            Self::Linear => "linear",
            Self::AzureDevOps => "azure_devops",
        }
    }

    /// Returns the product name shown to users.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Jira => "Jira",
            Self::Linear => "Linear",
            Self::AzureDevOps => "Azure DevOps",
        }
    }
}

impl TryFrom<&str> for Provider {
    type Error = SyncDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "jira" => Ok(Self::Jira),
            "linear" => Ok(Self::Linear),
            "azure_devops" | "azuredevops" | "ado" => Ok(Self::AzureDevOps),
            _ => Err(SyncDomainError::InvalidProvider(value.to_owned())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection status of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No credentials are stored.
    NotConnected,
    /// Credentials are stored and were last known to work.
    Connected,
    /// The last token refresh or authenticated call failed.
    #[serde(rename = "error")]
    Errored,
}

impl ConnectionStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Connected => "connected",
            Self::Errored => "error",
        }
    }
}

impl TryFrom<&str> for ConnectionStatus {
    type Error = SyncDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "not_connected" => Ok(Self::NotConnected),
            "connected" => Ok(Self::Connected),
            "error" => Ok(Self::Errored),
            _ => Err(SyncDomainError::InvalidConnectionStatus(value.to_owned())),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
