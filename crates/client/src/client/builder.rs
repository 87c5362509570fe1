//! Client builder for constructing [`KvClient`] instances.
//!
//! The builder validates required configuration (account id, auth strategy),
//! normalizes the base URL and configures the underlying HTTP client. The
//! shared rate limiter is created here so every clone of the built client
//! draws from the same bucket.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthStrategy;
use crate::client::KvClient;
use crate::error::{ClientError, Result};
use crate::rate_limit::RateLimiter;
use kvbulk_config::{
    Config,
    constants::{
        DEFAULT_BASE_URL, DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_BURST,
        DEFAULT_RATE_LIMIT_RPS, DEFAULT_TIMEOUT_SECS,
    },
};

/// Builder for creating a new [`KvClient`].
pub struct KvClientBuilder {
    base_url: String,
    account_id: Option<String>,
    auth_strategy: Option<AuthStrategy>,
    timeout: Duration,
    max_retries: usize,
    rate_limit_rps: f64,
    rate_limit_burst: f64,
}

impl Default for KvClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            account_id: None,
            auth_strategy: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
        }
    }
}

impl KvClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL of the remote API. Trailing slashes are removed.
    pub fn base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Set the account id that scopes every API path.
    pub fn account_id(mut self, account_id: String) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Set the authentication strategy.
    pub fn auth_strategy(mut self, strategy: AuthStrategy) -> Self {
        self.auth_strategy = Some(strategy);
        self
    }

    /// Set the HTTP request timeout. Default is 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries for rate-limited requests.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Configure the shared token bucket (requests/second and burst).
    pub fn rate_limit(mut self, rps: f64, burst: f64) -> Self {
        self.rate_limit_rps = rps;
        self.rate_limit_burst = burst;
        self
    }

    /// Pre-configure the builder from a loaded [`Config`].
    pub fn from_config(mut self, config: &Config) -> Self {
        self.base_url = config.api.base_url.clone();
        self.account_id = Some(config.account.account_id.clone());
        self.auth_strategy = Some(AuthStrategy::from_config(&config.auth.strategy));
        self.timeout = config.api.timeout;
        self.max_retries = config.api.max_retries;
        self.rate_limit_rps = config.api.rate_limit_rps;
        self.rate_limit_burst = config.api.rate_limit_burst;
        self
    }

    fn normalize_base_url(url: String) -> String {
        url.trim_end_matches('/').to_string()
    }

    /// Build the [`KvClient`] with the configured options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] if the account id or auth strategy
    /// is missing, and `ClientError::Http` if the HTTP client fails to build.
    pub fn build(self) -> Result<KvClient> {
        let base_url = Self::normalize_base_url(self.base_url);
        if base_url.is_empty() {
            return Err(ClientError::InvalidUrl("base_url is required".to_string()));
        }

        let account_id = self
            .account_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ClientError::Validation("account id is required".to_string()))?;

        let auth = self
            .auth_strategy
            .ok_or_else(|| ClientError::Validation("auth strategy is required".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(DEFAULT_MAX_REDIRECTS))
            .build()?;

        Ok(KvClient {
            http,
            base_url,
            account_id,
            auth,
            max_retries: self.max_retries,
            limiter: Arc::new(RateLimiter::new(self.rate_limit_rps, self.rate_limit_burst)),
        })
    }
}
