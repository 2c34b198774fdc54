//! Server configuration, read from the environment (an API token and
//! API URL for the Context Engine ... required for
//! any operation that touches it").

use semindex_core::engine::EngineAuth;
use semindex_core::errors::IndexError;

pub const API_KEY_ENV: &str = "SEMINDEX_API_KEY";
pub const API_URL_ENV: &str = "SEMINDEX_API_URL";
pub const WEBHOOK_SECRET_ENV: &str = "SEMINDEX_WEBHOOK_SECRET";
pub const HTTP_BEARER_ENV: &str = "SEMINDEX_SERVER_TOKEN";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub auth: EngineAuth,
    /// `true` advertises and serves only `search`.
    pub search_only: bool,
    /// Bearer token an HTTP caller must present; `None` disables auth.
    pub http_bearer_token: Option<String>,
    /// Shared secret for webhook HMAC verification.
    pub webhook_secret: Option<String>,
}

impl ServerConfig {
    pub fn from_env(search_only: bool) -> Result<Self, IndexError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| IndexError::config(format!("{API_KEY_ENV} is required")))?;
        let api_url = std::env::var(API_URL_ENV)
            .map_err(|_| IndexError::config(format!("{API_URL_ENV} is required")))?;
        Ok(Self {
            auth: EngineAuth { api_key, api_url },
            search_only,
            http_bearer_token: std::env::var(HTTP_BEARER_ENV).ok(),
            webhook_secret: std::env::var(WEBHOOK_SECRET_ENV).ok(),
        })
    }
}
