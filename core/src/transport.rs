/// HTTP transport for the chat service
///
/// The core never talks to the network directly: every call goes through the
/// `Transport` trait so tests can substitute a deterministic fake, and
/// through the `Sender` builder which owns retry behavior (attempt count,
/// acceptable status codes, pause between attempts).
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// HTTP method for an [`ApiRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request to the chat service: method, target URL, form fields
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub form: Vec<(&'static str, String)>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            form: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            form: Vec::new(),
        }
    }

    /// Add a form field (form-encoded on POST)
    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.form.push((name, value.into()));
        self
    }
}

/// Raw response: status code plus body text
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Request execution seam; one call, one response or error
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Production transport over reqwest.
///
/// Redirects are not followed: the login flow reads the 302 status directly
/// as its success signal.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ChatError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url).form(&request.form),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::Transport(format!("{}: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(format!("{}: {}", request.url, e)))?;

        Ok(ApiResponse { status, body })
    }
}

/// Executes a request with retries.
///
/// A 404 is always returned to the caller as-is (it carries meaning for
/// most endpoints); any other status outside the acceptable set counts as a
/// failed attempt, as does a transport error. Attempts are separated by the
/// configured retry pause.
pub struct Sender<'a> {
    transport: &'a dyn Transport,
    request: ApiRequest,
    attempts: u32,
    retry_pause: Duration,
    statuses: Vec<u16>,
}

impl<'a> Sender<'a> {
    pub fn new(transport: &'a dyn Transport, request: ApiRequest, retry_pause: Duration) -> Self {
        Self {
            transport,
            request,
            attempts: 3,
            retry_pause,
            statuses: Vec::new(),
        }
    }

    /// Total number of attempts (minimum 1)
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Acceptable status codes; an empty set accepts any status
    pub fn statuses(mut self, statuses: &[u16]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub async fn send(self) -> Result<ApiResponse> {
        let mut last_error = ChatError::Transport(format!("No attempts made for {}", self.request.url));

        for attempt in 1..=self.attempts {
            if attempt > 1 {
                sleep(self.retry_pause).await;
            }

            match self.transport.execute(&self.request).await {
                Ok(response) => {
                    let acceptable = response.is_not_found()
                        || self.statuses.is_empty()
                        || self.statuses.contains(&response.status);
                    if acceptable {
                        return Ok(response);
                    }
                    debug!(
                        "Attempt {}/{} for {} returned status {}",
                        attempt, self.attempts, self.request.url, response.status
                    );
                    last_error = ChatError::Transport(format!(
                        "Unexpected status {} from {}",
                        response.status, self.request.url
                    ));
                }
                Err(e) => {
                    debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, self.attempts, self.request.url, e
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
