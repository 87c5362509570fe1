//! Main remote KV API client.
//!
//! [`KvClient`] wraps the endpoint functions in `crate::endpoints` with the
//! account scoping, auth, retry budget and shared rate limiter filled in.
//! The client is cheap to clone: the HTTP connection pool and the token
//! bucket are reference-counted, so orchestration workers each own a clone
//! and still share one request budget.

pub mod builder;

use std::sync::Arc;

use crate::auth::AuthStrategy;
use crate::endpoints;
use crate::error::{ClientError, Result};
use crate::models::{BulkWriteResult, KeyPage, Namespace, WriteItem};
use crate::rate_limit::RateLimiter;

pub use builder::KvClientBuilder;
pub use crate::endpoints::WriteOptions;

/// Remote KV API client.
#[derive(Debug, Clone)]
pub struct KvClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) account_id: String,
    pub(crate) auth: AuthStrategy,
    pub(crate) max_retries: usize,
    pub(crate) limiter: Arc<RateLimiter>,
}

impl KvClient {
    /// Create a new client builder.
    pub fn builder() -> KvClientBuilder {
        KvClientBuilder::new()
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The account id scoping every API path.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The retry budget for rate-limited requests.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// List every namespace under the account.
    pub async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        endpoints::list_namespaces(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            self.max_retries,
        )
        .await
    }

    /// Resolve a namespace by id or title (exact match, id first).
    pub async fn resolve_namespace(&self, ident: &str) -> Result<Namespace> {
        let namespaces = self.list_namespaces().await?;
        namespaces
            .iter()
            .find(|ns| ns.id == ident)
            .or_else(|| namespaces.iter().find(|ns| ns.title == ident))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("namespace '{ident}'")))
    }

    /// Fetch one page of the key listing.
    pub async fn list_keys_page(
        &self,
        namespace_id: &str,
        limit: Option<u32>,
        cursor: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<KeyPage> {
        endpoints::list_keys_page(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            namespace_id,
            limit,
            cursor,
            prefix,
            self.max_retries,
        )
        .await
    }

    /// Read the raw value stored under `key`; `None` when absent.
    pub async fn get_value(&self, namespace_id: &str, key: &str) -> Result<Option<String>> {
        endpoints::get_value(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            namespace_id,
            key,
            self.max_retries,
        )
        .await
    }

    /// Write one value with optional expiration and metadata.
    pub async fn put_value(
        &self,
        namespace_id: &str,
        key: &str,
        value: &str,
        options: &WriteOptions,
    ) -> Result<()> {
        endpoints::put_value(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            namespace_id,
            key,
            value,
            options,
            self.max_retries,
        )
        .await
    }

    /// Delete one key.
    pub async fn delete_value(&self, namespace_id: &str, key: &str) -> Result<()> {
        endpoints::delete_value(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            namespace_id,
            key,
            self.max_retries,
        )
        .await
    }

    /// Fetch the metadata attached to one key; `None` when absent.
    pub async fn get_metadata(
        &self,
        namespace_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>> {
        endpoints::get_metadata(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            namespace_id,
            key,
            self.max_retries,
        )
        .await
    }

    /// Write up to 10,000 items in one call.
    pub async fn bulk_write(
        &self,
        namespace_id: &str,
        items: &[WriteItem],
    ) -> Result<BulkWriteResult> {
        endpoints::bulk_write(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            namespace_id,
            items,
            self.max_retries,
        )
        .await
    }

    /// Delete up to 1,000 keys in one call.
    pub async fn bulk_delete(&self, namespace_id: &str, keys: &[String]) -> Result<()> {
        endpoints::bulk_delete(
            &self.http,
            &self.base_url,
            &self.auth,
            &self.limiter,
            &self.account_id,
            namespace_id,
            keys,
            self.max_retries,
        )
        .await
    }
}
