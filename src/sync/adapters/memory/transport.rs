//! Canned HTTP transport for provider adapter tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::sync::ports::{HttpRequest, HttpResponse, HttpTransport, TransportError};

#[derive(Debug, Default)]
struct Exchange {
    responses: VecDeque<Result<HttpResponse, TransportError>>,
    requests: Vec<HttpRequest>,
}

/// Transport that replays queued responses and records every request.
///
/// Once the queue is empty every request fails with
/// [`TransportError::Connection`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    exchange: Arc<Mutex<Exchange>>,
}

impl ScriptedTransport {
    /// Creates a transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    #[must_use]
    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.push(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queues a transport failure.
    #[must_use]
    pub fn fail(self, error: TransportError) -> Self {
        self.push(Err(error));
        self
    }

    /// Returns the requests sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.exchange
            .lock()
            .map(|exchange| exchange.requests.clone())
            .unwrap_or_default()
    }

    fn push(&self, outcome: Result<HttpResponse, TransportError>) {
        if let Ok(mut exchange) = self.exchange.lock() {
            exchange.responses.push_back(outcome);
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut exchange = self
            .exchange
            .lock()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        exchange.requests.push(request);
        exchange
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".to_owned())))
    }
}
