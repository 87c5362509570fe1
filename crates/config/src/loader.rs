//! Configuration loader for environment variables, profiles and overrides.
//!
//! Precedence, lowest to highest: config-file profile, environment variables,
//! explicit overrides set on the loader (typically CLI flags).

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{
    AccountConfig, ApiConfig, AuthConfig, AuthStrategy, Config, ConfigFile, ProfileConfig,
};

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Account id is required (set KV_ACCOUNT_ID or --account-id)")]
    MissingAccountId,

    #[error(
        "Authentication is required (set KV_API_TOKEN, or KV_AUTH_EMAIL and KV_AUTH_KEY together)"
    )]
    MissingAuth,

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Unable to determine config directory: {0}")]
    ConfigDirUnavailable(String),

    #[error("Failed to read config file at {path}")]
    ConfigFileRead { path: PathBuf },

    #[error("Failed to parse config file at {path}")]
    ConfigFileParse { path: PathBuf },

    #[error("Profile '{0}' not found in config file")]
    ProfileNotFound(String),

    #[error("Invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },
}

/// Return the value of an environment variable, treating blank values as unset.
pub fn env_var_or_none(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_var_or_none(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
            var: name.to_string(),
            message: format!("could not parse '{raw}'"),
        }),
    }
}

/// Resolve the default config file path under the platform config directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let dirs = directories::ProjectDirs::from("", "", "kvbulk")
        .ok_or_else(|| ConfigError::ConfigDirUnavailable("no home directory".to_string()))?;
    Ok(dirs.config_dir().join("config.yaml"))
}

/// Configuration loader that builds a [`Config`] from profiles, environment
/// variables and explicit overrides.
#[derive(Default, Debug)]
pub struct ConfigLoader {
    account_id: Option<String>,
    api_token: Option<SecretString>,
    email: Option<String>,
    api_key: Option<SecretString>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<usize>,
    rate_limit_rps: Option<f64>,
    profile_name: Option<String>,
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load environment variables from a `.env` file if present.
    pub fn load_dotenv(self) -> Self {
        dotenvy::dotenv().ok();
        self
    }

    /// Set the active profile name to load from the config file.
    pub fn with_profile_name(mut self, name: String) -> Self {
        self.profile_name = Some(name);
        self
    }

    /// Override the config file path (primarily for testing).
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Override the account id (typically from a CLI flag).
    pub fn with_account_id(mut self, account_id: Option<String>) -> Self {
        if let Some(id) = account_id.filter(|v| !v.trim().is_empty()) {
            self.account_id = Some(id);
        }
        self
    }

    /// Override the base URL (typically from a CLI flag).
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|v| !v.trim().is_empty()) {
            self.base_url = Some(url);
        }
        self
    }

    /// Read the selected profile from the config file, if any.
    pub fn from_profile(mut self) -> Result<Self, ConfigError> {
        let Some(profile_name) = self.profile_name.clone() else {
            return Ok(self);
        };

        let config_path = match &self.config_path {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };

        if !config_path.exists() {
            return Err(ConfigError::ProfileNotFound(profile_name));
        }

        let raw = std::fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::ConfigFileRead { path: config_path.clone() })?;
        let file: ConfigFile = serde_yaml::from_str(&raw)
            .map_err(|_| ConfigError::ConfigFileParse { path: config_path.clone() })?;

        let profile = file
            .profiles
            .get(&profile_name)
            .ok_or_else(|| ConfigError::ProfileNotFound(profile_name.clone()))?;

        tracing::debug!(profile = %profile_name, path = %config_path.display(), "applying config profile");
        self.apply_profile(profile);
        Ok(self)
    }

    fn apply_profile(&mut self, profile: &ProfileConfig) {
        if let Some(id) = &profile.account_id {
            self.account_id.get_or_insert_with(|| id.clone());
        }
        if let Some(token) = &profile.api_token {
            self.api_token
                .get_or_insert_with(|| SecretString::new(token.clone().into()));
        }
        if let Some(email) = &profile.email {
            self.email.get_or_insert_with(|| email.clone());
        }
        if let Some(key) = &profile.api_key {
            self.api_key
                .get_or_insert_with(|| SecretString::new(key.clone().into()));
        }
        if let Some(url) = &profile.base_url {
            self.base_url.get_or_insert_with(|| url.clone());
        }
        if let Some(secs) = profile.timeout_secs {
            self.timeout.get_or_insert(Duration::from_secs(secs));
        }
        if let Some(retries) = profile.max_retries {
            self.max_retries.get_or_insert(retries);
        }
        if let Some(rps) = profile.rate_limit_rps {
            self.rate_limit_rps.get_or_insert(rps);
        }
    }

    /// Read configuration from `KV_*` environment variables.
    ///
    /// Values already set (by an override or a profile applied earlier) win.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        if self.account_id.is_none() {
            self.account_id = env_var_or_none("KV_ACCOUNT_ID");
        }
        if self.api_token.is_none() {
            self.api_token = env_var_or_none("KV_API_TOKEN").map(|t| SecretString::new(t.into()));
        }
        if self.email.is_none() {
            self.email = env_var_or_none("KV_AUTH_EMAIL");
        }
        if self.api_key.is_none() {
            self.api_key = env_var_or_none("KV_AUTH_KEY").map(|k| SecretString::new(k.into()));
        }
        if self.base_url.is_none() {
            self.base_url = env_var_or_none("KV_BASE_URL");
        }
        if self.timeout.is_none() {
            self.timeout = env_parsed::<u64>("KV_TIMEOUT_SECS")?.map(Duration::from_secs);
        }
        if self.max_retries.is_none() {
            self.max_retries = env_parsed::<usize>("KV_MAX_RETRIES")?;
        }
        if self.rate_limit_rps.is_none() {
            self.rate_limit_rps = env_parsed::<f64>("KV_RATE_LIMIT_RPS")?;
        }
        Ok(self)
    }

    /// Validate and assemble the final [`Config`].
    ///
    /// Fails fast on a missing account id or an incomplete auth method; a
    /// token wins over an email/key pair when both are present.
    pub fn build(self) -> Result<Config, ConfigError> {
        let account_id = self.account_id.ok_or(ConfigError::MissingAccountId)?;

        let strategy = match (self.api_token, self.email, self.api_key) {
            (Some(token), _, _) => AuthStrategy::ApiToken { token },
            (None, Some(email), Some(key)) => AuthStrategy::AuthKey { email, key },
            _ => return Err(ConfigError::MissingAuth),
        };

        let mut api = ApiConfig::default();
        if let Some(base_url) = self.base_url {
            url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidBaseUrl {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
            api.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            api.timeout = timeout;
        }
        if let Some(max_retries) = self.max_retries {
            api.max_retries = max_retries;
        }
        if let Some(rps) = self.rate_limit_rps {
            if rps <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    var: "KV_RATE_LIMIT_RPS".to_string(),
                    message: "must be positive".to_string(),
                });
            }
            api.rate_limit_rps = rps;
        }

        Ok(Config {
            account: AccountConfig { account_id },
            auth: AuthConfig { strategy },
            api,
        })
    }
}
