//! Shared HTTP plumbing for the public REST collaborators
//!
//! All outbound calls go through [`get_json`], which maps not-found responses
//! to `Ok(None)` and retries rate-limit and server errors with exponential
//! backoff before surfacing them.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// User agent sent on every request
pub const USER_AGENT: &str = "poly-updown/0.1";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default retry attempts after the first try
pub const DEFAULT_RETRIES: u32 = 2;

/// Error taxonomy for REST collaborators
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request exceeded the client timeout
    #[error("request timed out")]
    Timeout,
    /// Non-success HTTP status that is not a not-found
    #[error("http {status}: {body}")]
    Status { status: u16, body: String },
    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether a retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => {
                matches!(*status, 403 | 429) || (500..=599).contains(status)
            }
            ApiError::Decode(_) => false,
        }
    }
}

/// Build a reqwest client with the standard timeout and user agent
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Backoff delay before retry number `attempt` (0-based)
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(250 * 2u64.pow(attempt))
}

/// GET a JSON document with bounded retries.
///
/// 404 and 422 are treated as "no data" and return `Ok(None)`, as do empty
/// bodies. 403/429 and 5xx responses, timeouts, and transport failures are
/// retried up to `retries` additional attempts; other failures surface
/// immediately.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    retries: u32,
) -> Result<Option<T>, ApiError> {
    let mut attempt = 0;
    loop {
        let outcome = match client.get(url).query(query).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
                    return Ok(None);
                }
                if status.is_success() {
                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Transport(e.to_string()))?;
                    if bytes.is_empty() {
                        return Ok(None);
                    }
                    return serde_json::from_slice(&bytes)
                        .map(Some)
                        .map_err(|e| ApiError::Decode(e.to_string()));
                }
                let body = resp.text().await.unwrap_or_default();
                Err(ApiError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(e) => {
                if e.is_timeout() {
                    Err(ApiError::Timeout)
                } else {
                    Err(ApiError::Transport(e.to_string()))
                }
            }
        };

        match outcome {
            Ok(v) => return Ok(v),
            Err(err) => {
                if err.is_retryable() && attempt < retries {
                    tracing::debug!(%url, attempt, error = %err, "retrying request");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}
