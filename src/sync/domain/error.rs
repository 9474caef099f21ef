//! Error types for sync domain validation and parsing.

use super::Provider;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned by sync domain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncDomainError {
    /// The provider tag is unsupported.
    #[error("unsupported provider: {0}")]
    InvalidProvider(String),

    /// The connection status value is unsupported.
    #[error("unknown connection status: {0}")]
    InvalidConnectionStatus(String),

    /// The push scope value is unsupported.
    #[error("unknown push scope: {0}")]
    InvalidScope(String),

    /// The push status value is unsupported.
    #[error("unknown push status: {0}")]
    InvalidPushStatus(String),

    /// The error category value is unsupported.
    #[error("unknown error category: {0}")]
    InvalidErrorCategory(String),

    /// The integration holds no usable credentials.
    #[error("{0} integration is not connected")]
    NotConnected(Provider),

    /// A payload could not be rendered to canonical JSON.
    #[error("payload serialisation failed: {0}")]
    Serialization(String),
}

/// User-facing category of a failed push item.
///
/// Categories select the message template shown to callers; raw provider
/// text never reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credentials were rejected or could not be refreshed.
    Auth,
    /// The credentials lack access to the resource.
    Permission,
    /// The tracker rejected the payload.
    Validation,
    /// The tracker throttled the request.
    RateLimit,
    /// The tracker failed to serve the request.
    Server,
    /// Anything else, including local bookkeeping failures.
    Unknown,
}

impl ErrorCategory {
    /// Every category, in template order.
    pub const ALL: [Self; 6] = [
        Self::Auth,
        Self::Permission,
        Self::Validation,
        Self::RateLimit,
        Self::Server,
        Self::Unknown,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

impl TryFrom<&str> for ErrorCategory {
    type Error = SyncDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| SyncDomainError::InvalidErrorCategory(value.to_owned()))
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
