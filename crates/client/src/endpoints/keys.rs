//! Key listing endpoint.

use reqwest::Client;

use crate::auth::AuthStrategy;
use crate::endpoints::request::{continuation_cursor, decode_envelope, send_request_with_retry};
use crate::endpoints::require;
use crate::error::Result;
use crate::models::{KeyEntry, KeyPage};
use crate::rate_limit::RateLimiter;
use kvbulk_config::constants::normalize_list_limit;

/// Fetch one page of the key listing.
///
/// The requested `limit` is normalized into the remote bounds (10..=1000,
/// absent or zero selects 1000). Empty `cursor`/`prefix` values are treated
/// as absent.
#[allow(clippy::too_many_arguments)]
pub async fn list_keys_page(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    namespace_id: &str,
    limit: Option<u32>,
    cursor: Option<&str>,
    prefix: Option<&str>,
    max_retries: usize,
) -> Result<KeyPage> {
    require(account_id, "account id")?;
    require(namespace_id, "namespace id")?;

    let url = format!(
        "{base_url}/accounts/{account_id}/storage/kv/namespaces/{namespace_id}/keys"
    );

    let limit = normalize_list_limit(limit);
    let mut query: Vec<(String, String)> = vec![("limit".to_string(), limit.to_string())];
    if let Some(c) = cursor.filter(|c| !c.is_empty()) {
        query.push(("cursor".to_string(), c.to_string()));
    }
    if let Some(p) = prefix.filter(|p| !p.is_empty()) {
        query.push(("prefix".to_string(), p.to_string()));
    }

    let builder = auth.apply(http.get(&url)).query(&query);
    let response = send_request_with_retry(builder, "list keys", max_retries, limiter).await?;
    let envelope = decode_envelope::<Vec<KeyEntry>>(response, "list keys").await?;

    // The cursor lives in result_info; grab it before unwrapping the payload.
    let cursor = continuation_cursor(envelope.result_info.as_ref());
    let keys = envelope.into_result("list keys")?;

    Ok(KeyPage { keys, cursor })
}
