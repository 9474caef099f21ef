//! Provider adapter port: one tracker's issue API.

use crate::sync::domain::{
    AccessToken, ErrorCategory, Provider, PushPayload, RefreshToken, TokenGrant,
};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for provider adapter operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Issue returned by a successful create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    /// Tracker identifier used for later updates.
    pub external_id: String,
    /// Human-readable key such as `PROJ-12`.
    pub external_key: Option<String>,
    /// Browser URL.
    pub url: Option<String>,
}

/// Project or team a user may push into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProject {
    /// Tracker identifier.
    pub id: String,
    /// Short key, where the tracker has one.
    pub key: Option<String>,
    /// Display name.
    pub name: String,
}

/// Uniform capability set of a tracker.
///
/// Adapters are selected by [`Provider`] tag and are interchangeable as far
/// as the push orchestrator is concerned.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the tracker this adapter talks to.
    fn provider(&self) -> Provider;

    /// Creates an issue under `project`.
    async fn create_issue(
        &self,
        token: &AccessToken,
        project: &str,
        payload: &PushPayload,
    ) -> ProviderResult<CreatedIssue>;

    /// Updates the issue identified by `external_id`, returning its URL when
    /// the tracker reports one.
    async fn update_issue(
        &self,
        token: &AccessToken,
        external_id: &str,
        payload: &PushPayload,
    ) -> ProviderResult<Option<String>>;

    /// Lists the projects visible to the token.
    async fn list_projects(&self, token: &AccessToken) -> ProviderResult<Vec<ExternalProject>>;

    /// Lists the teams visible to the token. Trackers without teams return
    /// an empty list.
    async fn list_teams(&self, _token: &AccessToken) -> ProviderResult<Vec<ExternalProject>> {
        Ok(Vec::new())
    }

    /// Exchanges a refresh token for a new access token.
    async fn refresh_token(&self, refresh_token: &RefreshToken) -> ProviderResult<TokenGrant>;
}

/// How the retry layer treats a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The access token must be refreshed before the call can succeed.
    TokenExpired,
    /// The call may succeed if repeated after a delay.
    Retryable,
    /// Repeating the call cannot help.
    Terminal,
}

/// Errors returned by provider adapters.
///
/// Messages carry the tracker's raw text. They are logged and kept in run
/// records for operators but never shown to end users.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The tracker rejected the access token as expired or revoked.
    #[error("access token expired: {0}")]
    TokenExpired(String),

    /// Credentials are unusable and cannot be refreshed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The credentials lack access to the resource.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The tracker rejected the payload or the target does not exist.
    #[error("validation failed ({status}): {message}")]
    Validation {
        /// HTTP status, or 0 for errors reported in a successful response.
        status: u16,
        /// Raw tracker text.
        message: String,
    },

    /// The tracker throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A gateway or the service was temporarily unavailable.
    #[error("service unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status.
        status: u16,
        /// Raw tracker text.
        message: String,
    },

    /// The tracker failed internally.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Raw tracker text.
        message: String,
    },

    /// The response could not be interpreted.
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Classifies the error for the retry layer.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::TokenExpired(_) => ErrorClass::TokenExpired,
            Self::RateLimited(_)
            | Self::Timeout(_)
            | Self::Connection(_)
            | Self::Unavailable { .. } => ErrorClass::Retryable,
            Self::Auth(_)
            | Self::Permission(_)
            | Self::Validation { .. }
            | Self::Server { .. }
            | Self::Unexpected(_) => ErrorClass::Terminal,
        }
    }

    /// Returns `true` when the call may be repeated after a delay.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Retryable)
    }

    /// Returns the user-facing message category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::TokenExpired(_) | Self::Auth(_) => ErrorCategory::Auth,
            Self::Permission(_) => ErrorCategory::Permission,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::RateLimited(_) => ErrorCategory::RateLimit,
            Self::Timeout(_)
            | Self::Connection(_)
            | Self::Unavailable { .. }
            | Self::Server { .. } => ErrorCategory::Server,
            Self::Unexpected(_) => ErrorCategory::Unknown,
        }
    }
}
