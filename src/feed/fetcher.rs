use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::backoff::{RetryPolicy, Sleeper};

/// Errors that can occur while fetching the feed.
///
/// Every variant except [`FetchError::RetriesExhausted`] describes a single
/// failed attempt. Attempt failures are logged and retried; only exhaustion of
/// the attempt budget is returned to the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response with any status other than 200
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Attempt exceeded the per-attempt timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the size cap
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Every attempt failed
    #[error("Failed to fetch feed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

/// Fetches the feed body, retrying every failure with exponential backoff.
///
/// # Behavior
///
/// - Each attempt is bounded by `policy.per_attempt_timeout`
/// - Only HTTP 200 counts as success; the body is returned immediately
/// - Non-200 statuses, transport errors, timeouts and oversized or truncated
///   bodies are all retried the same way
/// - After failed attempt `n` the task sleeps `policy.delay_for(n)`
///
/// # Errors
///
/// Returns [`FetchError::RetriesExhausted`] once `policy.max_attempts`
/// attempts have failed. Its source is the last attempt's error.
pub async fn fetch<S: Sleeper>(
    client: &reqwest::Client,
    url: &str,
    policy: &RetryPolicy,
    sleeper: &S,
) -> Result<String, FetchError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let error = match fetch_once(client, url, policy).await {
            Ok(body) => {
                tracing::debug!(url = %url, attempt = attempt + 1, bytes = body.len(), "Feed fetched");
                return Ok(body);
            }
            Err(e) => e,
        };

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            url = %url,
            attempt = attempt + 1,
            max_attempts = attempts,
            delay_secs = delay.as_secs(),
            error = %error,
            "Feed request failed, retrying after delay"
        );
        sleeper.sleep(delay).await;

        attempt += 1;
        if attempt >= attempts {
            return Err(FetchError::RetriesExhausted {
                attempts,
                last: Box::new(error),
            });
        }
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<String, FetchError> {
    let timeout = policy.per_attempt_timeout;
    tokio::time::timeout(timeout, request_body(client, url, policy.max_body_bytes))
        .await
        .map_err(|_| FetchError::Timeout(timeout))?
}

async fn request_body(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, limit).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
