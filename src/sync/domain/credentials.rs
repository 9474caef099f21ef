//! Encrypted credential records and transient plaintext tokens.
//!
//! Tokens are stored only as [`EncryptedSecret`] values. Plaintext exists
//! as [`AccessToken`] or [`RefreshToken`] for the duration of a provider
//! call and never appears in `Debug` output.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ciphertext produced by a credential cipher.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedSecret(Vec<u8>);

impl EncryptedSecret {
    /// Wraps ciphertext bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the ciphertext bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedSecret({} bytes)", self.0.len())
    }
}

/// Encrypted tokens stored on an integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedCredentials {
    access_token: EncryptedSecret,
    refresh_token: Option<EncryptedSecret>,
    expires_at: Option<DateTime<Utc>>,
}

impl EncryptedCredentials {
    /// Creates a credential record.
    #[must_use]
    pub const fn new(
        access_token: EncryptedSecret,
        refresh_token: Option<EncryptedSecret>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Returns the encrypted access token.
    #[must_use]
    pub const fn access_token(&self) -> &EncryptedSecret {
        &self.access_token
    }

    /// Returns the encrypted refresh token, if the provider issued one.
    #[must_use]
    pub const fn refresh_token(&self) -> Option<&EncryptedSecret> {
        self.refresh_token.as_ref()
    }

    /// Returns the access token expiry, if known.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns `true` when the access token has expired or will expire
    /// within `skew` of `now`. Tokens without an expiry never need a
    /// proactive refresh.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            now.checked_add_signed(skew)
                .is_none_or(|horizon| expires_at <= horizon)
        })
    }
}

macro_rules! plaintext_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            /// Wraps a plaintext token.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the plaintext. Callers must not log it.
            #[must_use]
            pub fn expose(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "(<redacted>)"))
            }
        }
    };
}

plaintext_token!(
    /// Plaintext access token or personal access token.
    AccessToken
);
plaintext_token!(
    /// Plaintext OAuth refresh token.
    RefreshToken
);

/// Tokens returned by a provider's refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// New access token.
    pub access_token: AccessToken,
    /// Rotated refresh token; `None` keeps the previous one.
    pub refresh_token: Option<RefreshToken>,
    /// Lifetime of the new access token in seconds.
    pub expires_in: Option<u64>,
}

impl TokenGrant {
    /// Computes the absolute expiry of the granted access token.
    #[must_use]
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
    }
}
