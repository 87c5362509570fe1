//! Configuration types for kv-bulk.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_RPS,
    DEFAULT_TIMEOUT_SECS,
};

/// Module for serializing SecretString as strings.
mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        secret.expose_secret().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretString::new(s.into()))
    }
}

/// Module for serializing Duration as seconds (integer).
mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Strategy for authenticating with the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthStrategy {
    /// Scoped API token (bearer authentication).
    #[serde(rename = "token")]
    ApiToken {
        #[serde(with = "secret_string")]
        token: SecretString,
    },
    /// Legacy email + global API key pair.
    #[serde(rename = "key")]
    AuthKey {
        email: String,
        #[serde(with = "secret_string")]
        key: SecretString,
    },
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The authentication strategy to use.
    #[serde(flatten)]
    pub strategy: AuthStrategy,
}

/// Account scoping for every API path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account identifier the storage namespaces live under.
    pub account_id: String,
}

/// Transport-level settings for the API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the remote API.
    pub base_url: String,
    /// HTTP request timeout.
    #[serde(with = "duration_seconds")]
    pub timeout: Duration,
    /// Maximum retries for rate-limited requests.
    pub max_retries: usize,
    /// Sustained request rate (requests/second) for the shared token bucket.
    pub rate_limit_rps: f64,
    /// Burst capacity of the shared token bucket.
    pub rate_limit_burst: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
        }
    }
}

/// Complete configuration for a kv-bulk session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Build a config authenticated by a scoped API token.
    pub fn with_api_token(account_id: String, token: SecretString) -> Self {
        Self {
            account: AccountConfig { account_id },
            auth: AuthConfig {
                strategy: AuthStrategy::ApiToken { token },
            },
            api: ApiConfig::default(),
        }
    }

    /// Build a config authenticated by an email + global key pair.
    pub fn with_auth_key(account_id: String, email: String, key: SecretString) -> Self {
        Self {
            account: AccountConfig { account_id },
            auth: AuthConfig {
                strategy: AuthStrategy::AuthKey { email, key },
            },
            api: ApiConfig::default(),
        }
    }
}

/// A named profile in the config file. All fields optional; unset fields
/// fall through to environment variables and built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<usize>,
    pub rate_limit_rps: Option<f64>,
}

/// On-disk config file: a map of named profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub profiles: std::collections::HashMap<String, ProfileConfig>,
}
