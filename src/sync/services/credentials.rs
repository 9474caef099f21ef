//! Decryption and refresh of integration credentials.

use crate::sync::domain::{
    AccessToken, EncryptedCredentials, ExternalIntegration, Provider, RefreshToken,
};
use crate::sync::ports::{
    CipherError, CredentialCipher, IntegrationRepository, IntegrationRepositoryError,
    ProviderAdapter, ProviderError,
};
use chrono::Duration;
use mockable::Clock;
use thiserror::Error;
use tracing::{info, warn};

/// Failures while unlocking or refreshing credentials.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// The integration has no usable credentials.
    #[error("{0} integration is not connected")]
    NotConnected(Provider),
    /// The stored tokens could not be decrypted or re-encrypted.
    #[error(transparent)]
    Cipher(#[from] CipherError),
    /// The access token expired and no refresh token is stored.
    #[error("{0} access token expired and cannot be refreshed")]
    NoRefreshToken(Provider),
    /// The tracker refused the refresh.
    #[error("token refresh failed: {0}")]
    Refresh(ProviderError),
    /// Persisting refreshed credentials failed.
    #[error(transparent)]
    Repository(#[from] IntegrationRepositoryError),
}

impl CredentialError {
    /// Returns `true` when the stored connection can no longer be used and
    /// the user must reconnect. Transient tracker and storage failures leave
    /// the connection intact.
    #[must_use]
    pub const fn revokes_connection(&self) -> bool {
        match self {
            Self::NotConnected(_) | Self::Cipher(_) | Self::NoRefreshToken(_) => true,
            Self::Refresh(err) => !err.is_retryable(),
            Self::Repository(_) => false,
        }
    }
}

/// Decrypts the access token of a connected integration.
pub(super) fn unlock(
    integration: &ExternalIntegration,
    cipher: &dyn CredentialCipher,
) -> Result<AccessToken, CredentialError> {
    let credentials = integration
        .connected_credentials()
        .map_err(|_| CredentialError::NotConnected(integration.provider()))?;
    Ok(AccessToken::new(cipher.decrypt(credentials.access_token())?))
}

/// Encrypts freshly issued tokens.
pub(super) fn seal(
    cipher: &dyn CredentialCipher,
    access_token: &AccessToken,
    refresh_token: Option<&RefreshToken>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<EncryptedCredentials, CredentialError> {
    let access = cipher.encrypt(access_token.expose())?;
    let refresh = refresh_token
        .map(|token| cipher.encrypt(token.expose()))
        .transpose()?;
    Ok(EncryptedCredentials::new(access, refresh, expires_at))
}

/// What prompted a token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RefreshCause {
    /// The stored access token is close to expiry but still accepted.
    Expiring,
    /// The tracker rejected the stored access token.
    Rejected,
}

/// Exchanges the stored refresh token for a new access token and persists
/// the re-encrypted result.
///
/// A failure that revokes the connection marks the integration as errored,
/// so later pushes stop with `IntegrationNotConnected` until the user
/// reconnects. A proactive refresh of a token that has not yet expired
/// never revokes it. When the rotated token cannot be stored it is still
/// returned for use by the current caller.
pub(super) async fn refresh<I, C>(
    integration: &mut ExternalIntegration,
    adapter: &dyn ProviderAdapter,
    cipher: &dyn CredentialCipher,
    integrations: &I,
    clock: &C,
    cause: RefreshCause,
) -> Result<AccessToken, CredentialError>
where
    I: IntegrationRepository,
    C: Clock + Send + Sync,
{
    match exchange(integration, adapter, cipher, clock).await {
        Ok((access, credentials)) => {
            integration.connect(credentials, clock);
            if let Err(err) = integrations.save(integration).await {
                warn!(
                    user_id = %integration.user_id(),
                    provider = %integration.provider(),
                    error = %err,
                    "refreshed token was not stored; using it for this run only"
                );
            } else {
                info!(
                    user_id = %integration.user_id(),
                    provider = %integration.provider(),
                    "access token refreshed"
                );
            }
            Ok(access)
        }
        Err(err) => {
            let still_valid = cause == RefreshCause::Expiring
                && integration
                    .credentials()
                    .is_some_and(|stored| !stored.expires_within(clock.utc(), Duration::zero()));
            let revoked = err.revokes_connection() && !still_valid;
            warn!(
                user_id = %integration.user_id(),
                provider = %integration.provider(),
                error = %err,
                ?cause,
                revoked,
                "token refresh failed"
            );
            if revoked {
                integration.mark_errored(clock);
                integrations.save(integration).await?;
            }
            Err(err)
        }
    }
}

/// Converts a failed refresh into the tracker error reported for the call
/// that triggered it.
pub(super) fn refresh_failure(err: CredentialError) -> ProviderError {
    match err {
        CredentialError::Refresh(inner) if inner.is_retryable() => inner,
        other => ProviderError::Auth(other.to_string()),
    }
}

async fn exchange<C: Clock + Send + Sync>(
    integration: &ExternalIntegration,
    adapter: &dyn ProviderAdapter,
    cipher: &dyn CredentialCipher,
    clock: &C,
) -> Result<(AccessToken, EncryptedCredentials), CredentialError> {
    let provider = integration.provider();
    let stored = integration
        .credentials()
        .ok_or(CredentialError::NotConnected(provider))?;
    let sealed_refresh = stored
        .refresh_token()
        .ok_or(CredentialError::NoRefreshToken(provider))?;
    let refresh_token = RefreshToken::new(cipher.decrypt(sealed_refresh)?);
    let grant = adapter
        .refresh_token(&refresh_token)
        .await
        .map_err(CredentialError::Refresh)?;
    let rotated = grant.refresh_token.as_ref().unwrap_or(&refresh_token);
    let credentials = seal(
        cipher,
        &grant.access_token,
        Some(rotated),
        grant.expires_at(clock.utc()),
    )?;
    Ok((grant.access_token, credentials))
}
