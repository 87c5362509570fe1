//! Authentication strategies for the remote API.
//!
//! Two schemes are supported: scoped API tokens (preferred) and the legacy
//! email + global key header pair. Secrets are held as [`SecretString`] and
//! only exposed at the moment the request headers are built.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

/// Strategy for authenticating requests.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Scoped API token sent as a bearer token.
    ApiToken { token: SecretString },
    /// Legacy email + global API key header pair.
    AuthKey { email: String, key: SecretString },
}

impl AuthStrategy {
    /// Convert from the config crate's strategy type.
    pub fn from_config(strategy: &kvbulk_config::AuthStrategy) -> Self {
        match strategy {
            kvbulk_config::AuthStrategy::ApiToken { token } => Self::ApiToken {
                token: token.clone(),
            },
            kvbulk_config::AuthStrategy::AuthKey { email, key } => Self::AuthKey {
                email: email.clone(),
                key: key.clone(),
            },
        }
    }

    /// Attach the authentication headers to a request.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::ApiToken { token } => builder.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            ),
            Self::AuthKey { email, key } => builder
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key.expose_secret()),
        }
    }

    /// Whether this strategy uses a scoped API token.
    pub fn is_api_token(&self) -> bool {
        matches!(self, Self::ApiToken { .. })
    }
}
