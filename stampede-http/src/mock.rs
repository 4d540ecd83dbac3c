//! Scripted in-process HTTP client
//!
//! Routes are matched by method and path prefix in registration order, so
//! register the most specific prefix first. Every request is logged for
//! later assertions.

use crate::client::{HttpClient, HttpRequest, HttpResponse};
use crate::errors::HttpError;
use crate::types::HttpMethod;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// What a scripted route answers with
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    body: Bytes,
    delay: Option<Duration>,
    outcome: MockOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockOutcome {
    Respond,
    Timeout,
    ConnectionRefused,
}

impl MockResponse {
    pub fn json(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            body: Bytes::from(body.to_string()),
            delay: None,
            outcome: MockOutcome::Respond,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Bytes::from(body.into()),
            delay: None,
            outcome: MockOutcome::Respond,
        }
    }

    /// The client gives up on the request after the delay
    pub fn timeout() -> Self {
        Self {
            outcome: MockOutcome::Timeout,
            ..Self::text(0, "")
        }
    }

    /// The transport fails before any response arrives
    pub fn connection_refused() -> Self {
        Self {
            outcome: MockOutcome::ConnectionRefused,
            ..Self::text(0, "")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug)]
struct MockRoute {
    method: HttpMethod,
    path_prefix: String,
    response: MockResponse,
}

/// HttpClient answering from scripted routes
#[derive(Debug, Default)]
pub struct MockHttpClient {
    routes: Mutex<Vec<MockRoute>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` requests whose path starts with `path_prefix`
    pub fn add_mock(&self, method: HttpMethod, path_prefix: &str, response: MockResponse) {
        self.routes.lock().push(MockRoute {
            method,
            path_prefix: path_prefix.to_string(),
            response,
        });
    }

    /// Builder-style variant of [`MockHttpClient::add_mock`]
    pub fn with_mock(self, method: HttpMethod, path_prefix: &str, response: MockResponse) -> Self {
        self.add_mock(method, path_prefix, response);
        self
    }

    /// Every request sent so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn find(&self, request: &HttpRequest) -> Option<MockResponse> {
        self.routes
            .lock()
            .iter()
            .find(|route| {
                route.method == request.method && request.url.path().starts_with(&route.path_prefix)
            })
            .map(|route| route.response.clone())
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let scripted = self.find(&request);
        let key = format!("{} {}", request.method, request.url.path());
        self.requests.lock().push(request);

        let Some(scripted) = scripted else {
            return Err(HttpError::Unmatched(key));
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        match scripted.outcome {
            MockOutcome::Respond => Ok(HttpResponse::new(scripted.status, scripted.body)),
            MockOutcome::Timeout => Err(HttpError::Timeout(format!("{} timed out", key))),
            MockOutcome::ConnectionRefused => {
                Err(HttpError::NetworkError(format!("connection refused: {}", key)))
            }
        }
    }
}
