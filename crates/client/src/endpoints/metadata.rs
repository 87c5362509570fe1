//! Per-key metadata endpoint.

use reqwest::Client;

use crate::auth::AuthStrategy;
use crate::endpoints::request::{decode_envelope, send_request_with_retry};
use crate::endpoints::url_encoding::encode_path_segment;
use crate::endpoints::require;
use crate::error::{ClientError, Result};
use crate::rate_limit::RateLimiter;

/// Fetch the metadata attached to one key.
///
/// Returns `None` when the key has no metadata or does not exist: the remote
/// reports both as HTTP 404 or as an envelope with `success == false`, and
/// callers treat either as "nothing to match against", not as an error.
#[allow(clippy::too_many_arguments)]
pub async fn get_metadata(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    namespace_id: &str,
    key: &str,
    max_retries: usize,
) -> Result<Option<serde_json::Value>> {
    require(account_id, "account id")?;
    require(namespace_id, "namespace id")?;
    require(key, "key")?;

    let url = format!(
        "{base_url}/accounts/{account_id}/storage/kv/namespaces/{namespace_id}/metadata/{}",
        encode_path_segment(key)
    );
    let builder = auth.apply(http.get(&url));

    let response = match send_request_with_retry(builder, "get metadata", max_retries, limiter).await
    {
        Ok(response) => response,
        Err(ClientError::Api { status: 404, .. }) => return Ok(None),
        Err(e) => return Err(e),
    };

    let envelope = decode_envelope::<serde_json::Value>(response, "get metadata").await?;
    if !envelope.success {
        return Ok(None);
    }
    Ok(envelope.result.filter(|v| !v.is_null()))
}
