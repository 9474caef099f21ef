//! Status mapping and request helpers shared by the tracker adapters.

use crate::sync::{
    domain::{AccessToken, RefreshToken, TokenGrant},
    ports::{
        HttpMethod, HttpRequest, HttpResponse, HttpTransport, ProviderError, ProviderResult,
        TransportError,
    },
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;

const MAX_ERROR_TEXT: usize = 500;

/// Maps a non-success HTTP status to a provider error.
///
/// 401 means the access token must be refreshed; 429 and the gateway
/// statuses 502, 503, and 504 are retryable; every other status is
/// terminal.
#[must_use]
pub fn error_for_status(status: u16, body: &str) -> ProviderError {
    let message = truncate(body);
    match status {
        401 => ProviderError::TokenExpired(message),
        403 => ProviderError::Permission(message),
        429 => ProviderError::RateLimited(message),
        502..=504 => ProviderError::Unavailable { status, message },
        500..=599 => ProviderError::Server { status, message },
        _ => ProviderError::Validation { status, message },
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_TEXT).collect()
}

impl From<TransportError> for ProviderError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(message) => Self::Timeout(message),
            TransportError::Connection(message) => Self::Connection(message),
            TransportError::Other(message) => Self::Unexpected(message),
        }
    }
}

/// Sends `request` and decodes a successful JSON response.
pub(super) async fn send_json<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> ProviderResult<T> {
    let response = send_checked(transport, request).await?;
    decode(&response)
}

/// Sends `request` and fails on non-success statuses.
pub(super) async fn send_checked(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> ProviderResult<HttpResponse> {
    let response = transport.send(request).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(error_for_status(response.status, &response.body))
    }
}

pub(super) fn decode<T: DeserializeOwned>(response: &HttpResponse) -> ProviderResult<T> {
    serde_json::from_str(&response.body)
        .map_err(|err| ProviderError::Unexpected(format!("undecodable response: {err}")))
}

pub(super) fn authorised(
    method: HttpMethod,
    url: impl Into<String>,
    token: &AccessToken,
) -> HttpRequest {
    HttpRequest::new(method, url)
        .bearer(token.expose())
        .header("Accept", "application/json")
}

/// OAuth client registration used to refresh access tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    /// Token endpoint.
    pub token_url: String,
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl OAuthClientConfig {
    /// Exchanges a refresh token at the token endpoint.
    ///
    /// A rejected refresh token is reported as [`ProviderError::Auth`]: the
    /// user has to reconnect.
    pub(super) async fn refresh(
        &self,
        transport: &dyn HttpTransport,
        refresh_token: &RefreshToken,
    ) -> ProviderResult<TokenGrant> {
        let request = HttpRequest::new(HttpMethod::Post, self.token_url.as_str())
            .header("Accept", "application/json")
            .form([
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.expose()),
            ]);
        let response = transport.send(request).await?;
        if matches!(response.status, 400 | 401) {
            return Err(ProviderError::Auth(truncate(&response.body)));
        }
        if !response.is_success() {
            return Err(error_for_status(response.status, &response.body));
        }
        let body: TokenResponse = decode(&response)?;
        Ok(TokenGrant {
            access_token: AccessToken::new(body.access_token),
            refresh_token: body.refresh_token.map(RefreshToken::new),
            expires_in: body.expires_in,
        })
    }
}
