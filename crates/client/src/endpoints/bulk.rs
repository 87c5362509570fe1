//! Bulk write and bulk delete endpoints.

use reqwest::Client;
use tracing::debug;

use crate::auth::AuthStrategy;
use crate::endpoints::request::{decode_envelope, send_request_with_retry};
use crate::endpoints::require;
use crate::error::{ClientError, Result};
use crate::models::{BulkWriteResult, DeleteName, WriteItem};
use crate::rate_limit::RateLimiter;
use kvbulk_config::constants::{MAX_BULK_DELETE_KEYS, MAX_BULK_WRITE_ITEMS};

/// Write up to [`MAX_BULK_WRITE_ITEMS`] items in one call.
///
/// Oversized batches are rejected at the validation layer, before any HTTP
/// traffic.
#[allow(clippy::too_many_arguments)]
pub async fn bulk_write(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    namespace_id: &str,
    items: &[WriteItem],
    max_retries: usize,
) -> Result<BulkWriteResult> {
    require(account_id, "account id")?;
    require(namespace_id, "namespace id")?;
    if items.is_empty() {
        return Ok(BulkWriteResult::default());
    }
    if items.len() > MAX_BULK_WRITE_ITEMS {
        return Err(ClientError::Validation(format!(
            "bulk write accepts at most {MAX_BULK_WRITE_ITEMS} items, got {}",
            items.len()
        )));
    }

    let url =
        format!("{base_url}/accounts/{account_id}/storage/kv/namespaces/{namespace_id}/bulk");
    let builder = auth.apply(http.put(&url)).json(items);
    let response = send_request_with_retry(builder, "bulk write", max_retries, limiter).await?;
    let envelope = decode_envelope::<BulkWriteResult>(response, "bulk write").await?;

    if !envelope.success {
        return Err(ClientError::EnvelopeFailure {
            operation: "bulk write",
            message: envelope.first_error().unwrap_or("unknown error").to_string(),
        });
    }
    Ok(envelope.result.unwrap_or_default())
}

/// Delete up to [`MAX_BULK_DELETE_KEYS`] keys in one call.
///
/// `POST …/bulk/delete` with bare key strings is the primary verb; on a 4xx
/// (deployments that predate it answer 404 or 405) the call falls back once
/// to `DELETE …/bulk` carrying `{"name": …}` objects.
#[allow(clippy::too_many_arguments)]
pub async fn bulk_delete(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    namespace_id: &str,
    keys: &[String],
    max_retries: usize,
) -> Result<()> {
    require(account_id, "account id")?;
    require(namespace_id, "namespace id")?;
    if keys.is_empty() {
        return Ok(());
    }
    if keys.len() > MAX_BULK_DELETE_KEYS {
        return Err(ClientError::Validation(format!(
            "bulk delete accepts at most {MAX_BULK_DELETE_KEYS} keys, got {}",
            keys.len()
        )));
    }

    let primary_url = format!(
        "{base_url}/accounts/{account_id}/storage/kv/namespaces/{namespace_id}/bulk/delete"
    );
    let builder = auth.apply(http.post(&primary_url)).json(keys);

    match send_request_with_retry(builder, "delete keys", max_retries, limiter).await {
        Ok(response) => {
            return decode_envelope::<serde_json::Value>(response, "delete keys")
                .await?
                .expect_success("delete keys");
        }
        Err(ClientError::Api { status, .. }) if (400..500).contains(&status) && status != 429 => {
            debug!(status, "primary bulk-delete verb rejected, falling back to DELETE …/bulk");
        }
        Err(e) => return Err(e),
    }

    let fallback_url =
        format!("{base_url}/accounts/{account_id}/storage/kv/namespaces/{namespace_id}/bulk");
    let names: Vec<DeleteName> = keys
        .iter()
        .map(|k| DeleteName { name: k.clone() })
        .collect();
    let builder = auth.apply(http.delete(&fallback_url)).json(&names);
    let response = send_request_with_retry(builder, "delete keys", max_retries, limiter).await?;
    decode_envelope::<serde_json::Value>(response, "delete keys")
        .await?
        .expect_success("delete keys")
}
