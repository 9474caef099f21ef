//! [`HttpTransport`] backed by `reqwest`.

use crate::sync::ports::{
    HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError,
};
use async_trait::async_trait;
use std::time::Duration;

/// Production HTTP transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Other`] when the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(HttpBody::Json(value)) => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|err| TransportError::Other(err.to_string()))?;
                let typed = if request.header_value("Content-Type").is_some() {
                    builder
                } else {
                    builder.header("Content-Type", "application/json")
                };
                typed.body(bytes)
            }
            Some(HttpBody::Form(pairs)) => builder.form(pairs),
            None => builder,
        };
        let response = builder.send().await.map_err(|err| classify(&err))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| classify(&err))?;
        Ok(HttpResponse { status, body })
    }
}
