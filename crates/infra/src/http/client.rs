use std::fmt;
use std::time::Duration;

use bdaybot_common::resilience::{
    BackoffStrategy, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy,
};
use bdaybot_domain::{RelayError, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::errors::InfraError;

/// Longest `Retry-After` the client is willing to honour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// HTTP client for the object store.
///
/// Server errors (5xx), `429 Too Many Requests` and connection-level failures
/// are retried with exponential backoff, or after the server's `Retry-After`
/// when it sends one. Any other response is handed back to the caller; so is
/// the last retryable response once attempts run out.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryConfig,
}

/// Why a single attempt did not produce a final response.
enum AttemptFailure {
    Status(Response),
    Transport(reqwest::Error),
    /// The request body is a stream and cannot be replayed.
    NotReplayable,
}

impl fmt::Debug for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(response) => write!(f, "HTTP {}", response.status()),
            Self::Transport(err) => write!(f, "{err}"),
            Self::NotReplayable => f.write_str("request body cannot be replayed"),
        }
    }
}

struct ObjectStoreRetryPolicy;

impl RetryPolicy<AttemptFailure> for ObjectStoreRetryPolicy {
    fn should_retry(&self, failure: &AttemptFailure, _attempt: u32) -> RetryDecision {
        match failure {
            AttemptFailure::Status(response) => match retry_after(response) {
                Some(delay) => RetryDecision::RetryAfter(delay),
                None => RetryDecision::Retry,
            },
            AttemptFailure::Transport(err) if is_transient(err) => RetryDecision::Retry,
            AttemptFailure::Transport(_) | AttemptFailure::NotReplayable => RetryDecision::Stop,
        }
    }
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the request, retrying transient failures.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().map_err(|err| RelayError::from(InfraError::from(err)))?;
        let method = request.method().clone();
        let url = request.url().clone();

        let executor = RetryExecutor::new(self.retry.clone(), ObjectStoreRetryPolicy);
        let mut attempt = 0u32;
        let outcome = executor
            .execute(|| {
                attempt += 1;
                let current = attempt;
                let replay = request.try_clone();
                let (method, url) = (&method, &url);
                async move {
                    debug!(attempt = current, %method, %url, "http.request");
                    self.attempt(replay).await
                }
            })
            .await;

        match outcome {
            Ok(response) => Ok(response),
            Err(err) => match err.into_source() {
                AttemptFailure::Status(response) => {
                    debug!(%method, %url, status = %response.status(), "http.retries_exhausted");
                    Ok(response)
                }
                AttemptFailure::Transport(err) => Err(InfraError::from(err).into()),
                AttemptFailure::NotReplayable => Err(RelayError::Internal(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )),
            },
        }
    }

    async fn attempt(
        &self,
        request: Option<Request>,
    ) -> std::result::Result<Response, AttemptFailure> {
        let request = request.ok_or(AttemptFailure::NotReplayable)?;
        match self.client.execute(request).await {
            Ok(response) if is_retryable_status(response.status()) => {
                debug!(status = %response.status(), "http.response.retryable");
                Err(AttemptFailure::Status(response))
            }
            Ok(response) => {
                debug!(status = %response.status(), "http.response");
                Ok(response)
            }
            Err(err) => {
                debug!(error = %err, "http.failed");
                Err(AttemptFailure::Transport(err))
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            user_agent: Some(concat!("bdaybot/", env!("CARGO_PKG_VERSION")).to_string()),
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| RelayError::from(InfraError::from(err)))?;

        let retry = RetryConfig {
            max_attempts: u32::try_from(self.max_attempts.max(1)).unwrap_or(u32::MAX),
            backoff: BackoffStrategy::Exponential {
                initial_delay: self.base_backoff,
                base: 2.0,
                max_delay: MAX_RETRY_AFTER,
            },
        };

        Ok(HttpClient { client, retry })
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_request() || err.is_connect()
}

/// Delay requested through `Retry-After` (delta-seconds form only).
fn retry_after(response: &Response) -> Option<Duration> {
    let seconds = response.headers().get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}
