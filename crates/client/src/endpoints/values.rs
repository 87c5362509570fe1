//! Single-key value endpoints: read, write, delete.

use reqwest::Client;

use crate::auth::AuthStrategy;
use crate::endpoints::request::{decode_envelope, send_request_with_retry};
use crate::endpoints::url_encoding::encode_path_segment;
use crate::endpoints::require;
use crate::error::{ClientError, Result};
use crate::rate_limit::RateLimiter;

/// Options for a single-key write.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Absolute expiration, seconds since epoch.
    pub expiration: Option<i64>,
    /// Relative expiration, seconds from now.
    pub expiration_ttl: Option<i64>,
    /// JSON metadata to attach to the key.
    pub metadata: Option<serde_json::Value>,
}

fn value_url(base_url: &str, account_id: &str, namespace_id: &str, key: &str) -> String {
    format!(
        "{base_url}/accounts/{account_id}/storage/kv/namespaces/{namespace_id}/values/{}",
        encode_path_segment(key)
    )
}

/// Read the raw value stored under `key`. Returns `None` when the key does
/// not exist (HTTP 404).
#[allow(clippy::too_many_arguments)]
pub async fn get_value(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    namespace_id: &str,
    key: &str,
    max_retries: usize,
) -> Result<Option<String>> {
    require(account_id, "account id")?;
    require(namespace_id, "namespace id")?;
    require(key, "key")?;

    let url = value_url(base_url, account_id, namespace_id, key);
    let builder = auth.apply(http.get(&url));

    match send_request_with_retry(builder, "get value", max_retries, limiter).await {
        Ok(response) => Ok(Some(response.text().await.map_err(ClientError::from)?)),
        Err(ClientError::Api { status: 404, .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write one value, with optional expiration and metadata.
#[allow(clippy::too_many_arguments)]
pub async fn put_value(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    namespace_id: &str,
    key: &str,
    value: &str,
    options: &WriteOptions,
    max_retries: usize,
) -> Result<()> {
    require(account_id, "account id")?;
    require(namespace_id, "namespace id")?;
    require(key, "key")?;

    let url = value_url(base_url, account_id, namespace_id, key);

    let mut query: Vec<(String, String)> = Vec::new();
    if let Some(expiration) = options.expiration {
        query.push(("expiration".to_string(), expiration.to_string()));
    }
    if let Some(ttl) = options.expiration_ttl {
        query.push(("expiration_ttl".to_string(), ttl.to_string()));
    }
    if let Some(metadata) = &options.metadata {
        let encoded = serde_json::to_string(metadata)
            .map_err(|e| ClientError::Validation(format!("metadata is not valid JSON: {e}")))?;
        query.push(("metadata".to_string(), encoded));
    }

    let builder = auth
        .apply(http.put(&url))
        .query(&query)
        .body(value.to_string());
    let response = send_request_with_retry(builder, "write value", max_retries, limiter).await?;
    decode_envelope::<serde_json::Value>(response, "write value")
        .await?
        .expect_success("write value")
}

/// Delete one key.
#[allow(clippy::too_many_arguments)]
pub async fn delete_value(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    namespace_id: &str,
    key: &str,
    max_retries: usize,
) -> Result<()> {
    require(account_id, "account id")?;
    require(namespace_id, "namespace id")?;
    require(key, "key")?;

    let url = value_url(base_url, account_id, namespace_id, key);
    let builder = auth.apply(http.delete(&url));
    let response = send_request_with_retry(builder, "delete value", max_retries, limiter).await?;
    decode_envelope::<serde_json::Value>(response, "delete value")
        .await?
        .expect_success("delete value")
}
