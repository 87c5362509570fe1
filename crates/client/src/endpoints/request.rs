//! Retry helper for HTTP requests with backoff and rate limiting.
//!
//! Every outbound request flows through [`send_request_with_retry`], which
//! takes a token from the shared bucket, sends, and retries HTTP 429 with
//! exponential backoff. Non-2xx responses are mapped to [`ClientError::Api`]
//! with the envelope's first error message when the body parses as one.

use reqwest::{RequestBuilder, Response};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::models::common::{ApiEnvelope, ResultInfo};
use crate::rate_limit::RateLimiter;

/// Maximum number of retry attempts when the caller passes zero.
const DEFAULT_MAX_RETRIES: usize = 3;

/// Sends an HTTP request with rate limiting and automatic retry on 429.
///
/// Backoff is exponential (1s, 2s, 4s = 2^attempt), overridden by a parseable
/// `Retry-After` header. When retries are exhausted the last 429 is wrapped
/// in [`ClientError::MaxRetriesExceeded`]. Other non-success statuses are
/// returned immediately as [`ClientError::Api`].
pub async fn send_request_with_retry(
    builder: RequestBuilder,
    operation: &'static str,
    max_retries: usize,
    limiter: &RateLimiter,
) -> Result<Response> {
    let max_retries = if max_retries == 0 {
        DEFAULT_MAX_RETRIES
    } else {
        max_retries
    };

    for attempt in 0..=max_retries {
        let attempt_builder = match builder.try_clone() {
            Some(cloned) => cloned,
            None => {
                // Single shot for non-clonable bodies; no retry possible.
                if attempt == 0 {
                    debug!(operation, "request builder cannot be cloned, single attempt only");
                    limiter.acquire().await;
                    return builder.send().await.map_err(ClientError::from);
                }
                return Err(ClientError::MaxRetriesExceeded {
                    attempts: attempt,
                    source: Box::new(ClientError::InvalidResponse(
                        "request builder cannot be cloned for retry".to_string(),
                    )),
                });
            }
        };

        limiter.acquire().await;

        let response = attempt_builder.send().await.map_err(ClientError::from)?;

        if response.status().as_u16() == 429 {
            let retry_after = parse_retry_after(&response);
            if attempt < max_retries {
                let backoff_secs = retry_after.unwrap_or_else(|| 2u64.pow(attempt as u32));
                debug!(
                    operation,
                    attempt = attempt + 1,
                    max_retries = max_retries + 1,
                    backoff_secs,
                    "rate limited (HTTP 429), backing off"
                );
                tokio::time::sleep(tokio::time::Duration::from_secs(backoff_secs)).await;
                continue;
            }
            let url = response.url().to_string();
            let message = read_error_message(response).await;
            debug!(operation, attempts = attempt + 1, "rate-limit retries exhausted");
            return Err(ClientError::MaxRetriesExceeded {
                attempts: max_retries + 1,
                source: Box::new(ClientError::Api {
                    status: 429,
                    url,
                    message,
                }),
            });
        }

        if response.status().is_success() {
            if attempt > 0 {
                debug!(operation, attempt = attempt + 1, "request succeeded after retry");
            }
            return Ok(response);
        }

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let message = read_error_message(response).await;
        return Err(ClientError::Api {
            status,
            url,
            message,
        });
    }

    // Unreachable: the loop always returns.
    Err(ClientError::MaxRetriesExceeded {
        attempts: max_retries + 1,
        source: Box::new(ClientError::InvalidResponse("retry loop fell through".to_string())),
    })
}

fn parse_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Extract a display message from an error body, preferring the envelope's
/// first error over the raw text.
async fn read_error_message(response: Response) -> String {
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "could not read error response body".to_string());

    match serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body) {
        Ok(envelope) if !envelope.errors.is_empty() => envelope
            .errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{} ({})", e.message, code),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => body,
    }
}

/// Decode a JSON envelope response body, surfacing decode failures as
/// [`ClientError::InvalidResponse`].
pub async fn decode_envelope<T: serde::de::DeserializeOwned>(
    response: Response,
    operation: &'static str,
) -> Result<ApiEnvelope<T>> {
    response
        .json::<ApiEnvelope<T>>()
        .await
        .map_err(|e| ClientError::InvalidResponse(format!("decoding {operation} response: {e}")))
}

/// Cursor helper: treat an absent or empty cursor as "no continuation".
pub fn continuation_cursor(info: Option<&ResultInfo>) -> Option<String> {
    info.and_then(|i| i.cursor.clone()).filter(|c| !c.is_empty())
}
