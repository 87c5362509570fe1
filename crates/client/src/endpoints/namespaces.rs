//! Namespace listing endpoint.

use reqwest::Client;

use crate::auth::AuthStrategy;
use crate::endpoints::request::{decode_envelope, send_request_with_retry};
use crate::endpoints::require;
use crate::error::Result;
use crate::models::Namespace;
use crate::rate_limit::RateLimiter;

/// Page size for the namespace listing, which paginates by page number
/// rather than by cursor.
const NAMESPACES_PER_PAGE: usize = 100;

/// List every namespace under the account.
pub async fn list_namespaces(
    http: &Client,
    base_url: &str,
    auth: &AuthStrategy,
    limiter: &RateLimiter,
    account_id: &str,
    max_retries: usize,
) -> Result<Vec<Namespace>> {
    require(account_id, "account id")?;

    let url = format!("{base_url}/accounts/{account_id}/storage/kv/namespaces");
    let mut namespaces = Vec::new();
    let mut page = 1usize;

    loop {
        let builder = auth.apply(http.get(&url)).query(&[
            ("page", page.to_string()),
            ("per_page", NAMESPACES_PER_PAGE.to_string()),
        ]);
        let response =
            send_request_with_retry(builder, "list namespaces", max_retries, limiter).await?;
        let envelope = decode_envelope::<Vec<Namespace>>(response, "list namespaces").await?;
        let batch = envelope.into_result("list namespaces")?;

        let done = batch.len() < NAMESPACES_PER_PAGE;
        namespaces.extend(batch);
        if done {
            return Ok(namespaces);
        }
        page += 1;
    }
}
