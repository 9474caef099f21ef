//! Service layer for per-user tracker integrations.

use super::credentials::{self, CredentialError, RefreshCause};
use super::{Attempted, FailureMessages, ProviderRegistry, RetryPolicy, call_with_retry};
use crate::planning::domain::UserId;
use crate::sync::domain::{
    AccessToken, ErrorCategory, ExternalIntegration, FieldMapping, Provider, RefreshToken,
};
use crate::sync::ports::{
    CredentialCipher, ErrorClass, ExternalProject, IntegrationRepository,
    IntegrationRepositoryError, ProviderAdapter,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Tokens supplied when a user connects a tracker.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Access token or personal access token.
    pub access_token: AccessToken,
    /// OAuth refresh token, absent for personal access tokens.
    pub refresh_token: Option<RefreshToken>,
    /// Expiry of the access token, absent for non-expiring tokens.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Service-level errors for integration management.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The user has never configured this tracker.
    #[error("no {0} integration configured")]
    NotFound(Provider),
    /// No adapter is registered for the tracker.
    #[error("no adapter registered for {0}")]
    AdapterNotRegistered(Provider),
    /// Credentials could not be unlocked or refreshed.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// The tracker call failed after retries. `message` is safe to show to
    /// the user; the raw tracker error is only logged.
    #[error("{message}")]
    Tracker {
        /// Failure category.
        category: ErrorCategory,
        /// User-facing message.
        message: String,
    },
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] IntegrationRepositoryError),
}

/// Result type for integration service operations.
pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Connects, configures, and queries tracker integrations.
#[derive(Clone)]
pub struct IntegrationService<I, C>
where
    I: IntegrationRepository,
    C: Clock + Send + Sync,
{
    integrations: Arc<I>,
    cipher: Arc<dyn CredentialCipher>,
    registry: ProviderRegistry,
    clock: Arc<C>,
    retry: RetryPolicy,
    messages: FailureMessages,
}

/// Tracker collections the integration service can list.
#[derive(Debug, Clone, Copy)]
enum Listing {
    Projects,
    Teams,
}

impl Listing {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Teams => "teams",
        }
    }
}

impl<I, C> IntegrationService<I, C>
where
    I: IntegrationRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new integration service with the default retry policy and
    /// failure messages.
    #[must_use]
    pub fn new(
        integrations: Arc<I>,
        cipher: Arc<dyn CredentialCipher>,
        registry: ProviderRegistry,
        clock: Arc<C>,
    ) -> Self {
        Self {
            integrations,
            cipher,
            registry,
            clock,
            retry: RetryPolicy::default(),
            messages: FailureMessages::default(),
        }
    }

    /// Replaces the retry policy used for tracker lookups.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the failure message templates.
    #[must_use]
    pub fn with_messages(mut self, messages: FailureMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Encrypts and stores tokens, creating the integration on first use.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::Credentials`] when encryption fails.
    pub async fn connect(
        &self,
        user: UserId,
        provider: Provider,
        request: ConnectRequest,
    ) -> IntegrationResult<ExternalIntegration> {
        let mut integration = self.load_or_new(user, provider).await?;
        let sealed = credentials::seal(
            self.cipher.as_ref(),
            &request.access_token,
            request.refresh_token.as_ref(),
            request.expires_at,
        )?;
        integration.connect(sealed, &*self.clock);
        self.integrations.save(&integration).await?;
        info!(user_id = %user, provider = %provider, "integration connected");
        Ok(integration)
    }

    /// Drops the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NotFound`] for unknown integrations.
    pub async fn disconnect(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationResult<ExternalIntegration> {
        let mut integration = self.get(user, provider).await?;
        integration.disconnect(&*self.clock);
        self.integrations.save(&integration).await?;
        info!(user_id = %user, provider = %provider, "integration disconnected");
        Ok(integration)
    }

    /// Sets the default project and team.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NotFound`] for unknown integrations.
    pub async fn set_defaults(
        &self,
        user: UserId,
        provider: Provider,
        project: Option<String>,
        team: Option<String>,
    ) -> IntegrationResult<ExternalIntegration> {
        let mut integration = self.get(user, provider).await?;
        integration.set_defaults(project, team, &*self.clock);
        self.integrations.save(&integration).await?;
        Ok(integration)
    }

    /// Replaces the field mapping.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NotFound`] for unknown integrations.
    pub async fn set_field_mapping(
        &self,
        user: UserId,
        provider: Provider,
        mapping: FieldMapping,
    ) -> IntegrationResult<ExternalIntegration> {
        let mut integration = self.get(user, provider).await?;
        integration.set_field_mapping(mapping, &*self.clock);
        self.integrations.save(&integration).await?;
        Ok(integration)
    }

    /// Retrieves one integration.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NotFound`] for unknown integrations.
    pub async fn get(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationResult<ExternalIntegration> {
        self.integrations
            .find(user, provider)
            .await?
            .ok_or(IntegrationError::NotFound(provider))
    }

    /// Lists the integrations of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::Repository`] when the lookup fails.
    pub async fn list(&self, user: UserId) -> IntegrationResult<Vec<ExternalIntegration>> {
        Ok(self.integrations.list(user).await?)
    }

    /// Lists the projects the stored token can push into.
    ///
    /// Retryable tracker failures are retried, and an expired token is
    /// refreshed once before the lookup is repeated.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::Credentials`] for disconnected
    /// integrations or [`IntegrationError::Tracker`] when the tracker call
    /// fails.
    pub async fn list_projects(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationResult<Vec<ExternalProject>> {
        self.list_collection(user, provider, Listing::Projects).await
    }

    /// Lists the teams the stored token can push into.
    ///
    /// # Errors
    ///
    /// As for [`Self::list_projects`].
    pub async fn list_teams(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationResult<Vec<ExternalProject>> {
        self.list_collection(user, provider, Listing::Teams).await
    }

    async fn list_collection(
        &self,
        user: UserId,
        provider: Provider,
        listing: Listing,
    ) -> IntegrationResult<Vec<ExternalProject>> {
        let (mut integration, adapter) = self.connected(user, provider).await?;
        let token = credentials::unlock(&integration, self.cipher.as_ref())?;
        let first = self.fetch(adapter.as_ref(), &token, listing).await;
        let expired = first
            .result
            .as_ref()
            .is_err_and(|err| err.class() == ErrorClass::TokenExpired);
        let attempted = if expired {
            let refreshed = credentials::refresh(
                &mut integration,
                adapter.as_ref(),
                self.cipher.as_ref(),
                self.integrations.as_ref(),
                self.clock.as_ref(),
                RefreshCause::Rejected,
            )
            .await;
            match refreshed {
                Ok(fresh) => {
                    let second = self.fetch(adapter.as_ref(), &fresh, listing).await;
                    Attempted {
                        result: second.result,
                        attempts: first.attempts.saturating_add(second.attempts),
                    }
                }
                Err(err) => Attempted {
                    result: Err(credentials::refresh_failure(err)),
                    attempts: first.attempts,
                },
            }
        } else {
            first
        };
        let attempts = attempted.attempts;
        attempted.result.map_err(|err| {
            let category = err.category();
            warn!(
                user_id = %user,
                provider = %provider,
                listing = listing.as_str(),
                attempts,
                category = category.as_str(),
                error = %err,
                "tracker lookup failed"
            );
            IntegrationError::Tracker {
                category,
                message: self
                    .messages
                    .render_lookup(category, provider, listing.as_str()),
            }
        })
    }

    async fn fetch(
        &self,
        adapter: &dyn ProviderAdapter,
        token: &AccessToken,
        listing: Listing,
    ) -> Attempted<Vec<ExternalProject>> {
        call_with_retry(&self.retry, || match listing {
            Listing::Projects => adapter.list_projects(token),
            Listing::Teams => adapter.list_teams(token),
        })
        .await
    }

    async fn connected(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationResult<(ExternalIntegration, Arc<dyn ProviderAdapter>)> {
        let integration = self.get(user, provider).await?;
        let adapter = self
            .registry
            .get(provider)
            .ok_or(IntegrationError::AdapterNotRegistered(provider))?;
        Ok((integration, adapter))
    }

    async fn load_or_new(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationResult<ExternalIntegration> {
        Ok(self
            .integrations
            .find(user, provider)
            .await?
            .unwrap_or_else(|| ExternalIntegration::new(user, provider, &*self.clock)))
    }
}
