use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, header::RETRY_AFTER};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::SyncConfig,
    sync::{
        credential::CredentialProvider,
        request::{Outcome, RequestDescriptor},
    },
};

/// Status, retry hint and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `Retry-After` header in seconds.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("failed to build http client: {0}")]
    Build(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::Build(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Sends one request and returns the raw exchange.
///
/// Implementations perform no retries and no status interpretation; both are
/// the job of [`FetchClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &RequestDescriptor,
        bearer: &str,
    ) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a transport for `base_url` with a per-request timeout.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let transport = ReqwestTransport::new("https://api.spotify.com/v1", Duration::from_secs(30))?;
    /// ```
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        bearer: &str,
    ) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .bearer_auth(bearer)
            .query(request.query_pairs());
        if let Some(body) = request.json_body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Retry and backoff settings of the fetch client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a request is sent at most `max_retries + 1` times.
    pub max_retries: u32,
    /// Delay before the first retry when the server gives no hint.
    pub base_delay: Duration,
    /// Upper bound of any computed backoff delay.
    pub max_delay: Duration,
    /// Longest `Retry-After` the client is willing to wait for.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay for the given zero-based retry, plus up to 50% jitter.
    ///
    /// The result never exceeds `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.min(16);
        let exponential = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let jitter_ceiling = exponential.as_millis() as u64 / 2;
        let jitter = if jitter_ceiling > 0 {
            rand::rng().random_range(0..=jitter_ceiling)
        } else {
            0
        };

        (exponential + Duration::from_millis(jitter)).min(self.max_delay)
    }
}

/// What to do with one raw response.
enum Verdict {
    Done(Outcome),
    Retry {
        outcome: Outcome,
        retry_after: Option<u64>,
    },
}

/// Executes request descriptors against the remote API.
///
/// The client turns every HTTP exchange into an [`Outcome`]:
///
/// - **2xx** - body decoded as JSON, `Success`
/// - **429** - retried after the `Retry-After` hint, `RateLimited` once retries run out
/// - **5xx / transport failure** - retried with exponential backoff, `TransientError` once retries run out
/// - **other 4xx** - `FatalError` immediately, never retried
///
/// Before each attempt the descriptor's cancellation token is checked and a
/// credential is obtained from the [`CredentialProvider`]. An expired credential
/// is reported as `FatalError { status: 401 }` without touching the network.
/// Cancellation during a backoff wait returns `Cancelled` right away; a request
/// already on the wire is allowed to finish.
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    policy: RetryPolicy,
}

impl FetchClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            credentials,
            policy,
        }
    }

    /// Builds a client talking to the configured API URL over reqwest.
    pub fn from_config(
        config: &SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&config.api_url, config.request_timeout)?;
        Ok(Self::new(
            Arc::new(transport),
            credentials,
            config.retry_policy(),
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes one descriptor, retrying rate limits and server errors.
    ///
    /// # Returns
    ///
    /// Exactly one [`Outcome`]. Retryable failures are only surfaced after
    /// `max_retries` retries, or immediately when the server asks for a wait
    /// longer than `max_retry_after`.
    pub async fn execute(&self, request: &RequestDescriptor) -> Outcome {
        let cancel = request.cancel_token();
        let mut retry: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            let credential = match self.credentials.credential().await {
                Ok(credential) => credential,
                Err(err) => {
                    return Outcome::FatalError {
                        status: 401,
                        message: err.to_string(),
                    };
                }
            };
            if credential.is_expired() {
                return Outcome::FatalError {
                    status: 401,
                    message: format!("credential expired at {}", credential.expires_at()),
                };
            }

            debug!(
                method = %request.method(),
                path = request.path(),
                attempt = retry + 1,
                "sending request"
            );

            let (outcome, retry_after) = match self
                .transport
                .send(request, credential.access_token())
                .await
            {
                Ok(response) => match classify(response) {
                    Verdict::Done(outcome) => return outcome,
                    Verdict::Retry {
                        outcome,
                        retry_after,
                    } => (outcome, retry_after),
                },
                Err(err) => {
                    warn!(path = request.path(), error = %err, "transport failure");
                    (Outcome::TransientError { status: None }, None)
                }
            };

            if retry >= self.policy.max_retries {
                warn!(
                    path = request.path(),
                    attempts = retry + 1,
                    "retries exhausted"
                );
                return outcome;
            }

            let delay = match retry_after {
                Some(seconds) if Duration::from_secs(seconds) > self.policy.max_retry_after => {
                    warn!(
                        path = request.path(),
                        retry_after = seconds,
                        "retry-after above the accepted ceiling, giving up"
                    );
                    return outcome;
                }
                Some(seconds) => Duration::from_secs(seconds),
                None => self.policy.backoff(retry),
            };

            debug!(path = request.path(), ?delay, ?outcome, "retrying");
            retry += 1;

            tokio::select! {
                _ = cancel.cancelled() => return Outcome::Cancelled,
                _ = sleep(delay) => {}
            }
        }
    }
}

fn classify(response: RawResponse) -> Verdict {
    match response.status {
        200..=299 => {
            let payload = if response.body.trim().is_empty() {
                Ok(Value::Null)
            } else {
                serde_json::from_str::<Value>(&response.body)
            };
            match payload {
                Ok(value) => Verdict::Done(Outcome::Success(value)),
                Err(err) => Verdict::Done(Outcome::FatalError {
                    status: response.status,
                    message: format!("invalid JSON body: {}", err),
                }),
            }
        }
        429 => Verdict::Retry {
            outcome: Outcome::RateLimited {
                retry_after_secs: response.retry_after,
            },
            retry_after: response.retry_after,
        },
        500..=599 => Verdict::Retry {
            outcome: Outcome::TransientError {
                status: Some(response.status),
            },
            retry_after: response.retry_after,
        },
        status => Verdict::Done(Outcome::FatalError {
            status,
            message: error_message(&response.body),
        }),
    }
}

/// Extracts `error.message` from a Spotify error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
