//! Clients for the hosted embedding and chat-completion APIs.
//!
//! Both clients speak the OpenAI-compatible wire format and share the
//! endpoint, credential and retry handling defined here.

pub mod chat;
pub mod embeddings;

pub use chat::{ChatProvider, ChatRequest, OpenAiChat};
pub use embeddings::{EmbeddingProvider, OpenAiEmbeddings, embed_in_batches};

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::config::RemoteConfig;

/// Errors from remote service calls.
#[derive(Error, Debug)]
pub enum RemoteServiceError {
    #[error("No API key configured for the {service} service")]
    MissingCredentials { service: &'static str },

    #[error("The {service} service rejected the API key ({status}): {body}")]
    Unauthorized {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("The {service} service returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Cannot reach the {service} service: {source}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from the {service} service: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("Failed to build HTTP client: {reason}")]
    Client { reason: String },
}

/// Timeout and retry behaviour for remote calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts including the first one (at least 1).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_backoff: Duration,
    /// Upper bound for a single backoff delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RemoteConfig::default())
    }
}

impl RetryPolicy {
    /// Build the policy from the `[remote]` settings section.
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Policy that never retries.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    fn should_retry_status(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn should_retry_error(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect()
    }
}

/// Where a remote API lives and how to authenticate against it.
#[derive(Clone)]
pub struct RemoteEndpoint {
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl RemoteEndpoint {
    /// Create an endpoint. Blank keys count as missing.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self { base_url, api_key }
    }

    /// Build from the `[remote]` settings section, resolving the key.
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(config.base_url.clone(), config.resolve_api_key())
    }

    /// Join a route onto the base URL.
    pub fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }

    /// Whether a credential is available.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn auth_header(&self, service: &'static str) -> Result<HeaderValue, RemoteServiceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(RemoteServiceError::MissingCredentials { service })?;
        HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
            RemoteServiceError::Client {
                reason: "API key contains characters not allowed in a header".to_string(),
            }
        })
    }
}

/// Build an HTTP client honouring the policy timeout.
pub(crate) fn build_client(policy: &RetryPolicy) -> Result<Client, RemoteServiceError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Client::builder()
        .timeout(policy.timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| RemoteServiceError::Client {
            reason: e.to_string(),
        })
}

/// POST a JSON body, retrying transient failures according to the policy.
///
/// Returns the successful response; 401/403 are never retried.
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    endpoint: &RemoteEndpoint,
    route: &str,
    body: &T,
    policy: &RetryPolicy,
    service: &'static str,
) -> Result<Response, RemoteServiceError> {
    let auth = endpoint.auth_header(service)?;
    let url = endpoint.url(route);
    let mut attempt = 1u32;

    loop {
        let result = client
            .post(&url)
            .header(AUTHORIZATION, auth.clone())
            .json(body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) => {
                let status = resp.status();
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_string());

                if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                    return Err(RemoteServiceError::Unauthorized {
                        service,
                        status: status.as_u16(),
                        body,
                    });
                }
                if policy.should_retry_status(status) && attempt < policy.max_attempts {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        target: "remote",
                        "{service} returned {status}, retry {attempt}/{} in {delay:?}",
                        policy.max_attempts - 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(RemoteServiceError::Status {
                    service,
                    status: status.as_u16(),
                    body,
                });
            }
            Err(err) => {
                if policy.should_retry_error(&err) && attempt < policy.max_attempts {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        target: "remote",
                        "{service} request failed ({err}), retry {attempt}/{} in {delay:?}",
                        policy.max_attempts - 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(RemoteServiceError::Network {
                    service,
                    source: err,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(1),
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(3),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_secs(3));
        assert_eq!(policy.backoff(40), Duration::from_secs(3));
    }

    #[test]
    fn test_policy_from_config_never_zero_attempts() {
        let config = RemoteConfig {
            max_attempts: 0,
            ..RemoteConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }

    #[test]
    fn test_endpoint_normalises_url_and_key() {
        let endpoint = RemoteEndpoint::new("https://api.example.com/v1/", Some("  ".to_string()));
        assert_eq!(
            endpoint.url("/embeddings"),
            "https://api.example.com/v1/embeddings"
        );
        assert!(!endpoint.has_api_key());
        assert!(matches!(
            endpoint.auth_header("embeddings"),
            Err(RemoteServiceError::MissingCredentials { .. })
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let endpoint = RemoteEndpoint::new("http://localhost", Some("sk-secret".to_string()));
        assert!(!format!("{endpoint:?}").contains("sk-secret"));
    }
}
