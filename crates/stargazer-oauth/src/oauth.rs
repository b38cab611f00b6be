//! GitHub OAuth app configuration and the shared token endpoint payload.

use std::fmt;

use serde::Deserialize;

use crate::error::{OAuthError, Result};

pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Scope requested when the caller does not name one.
pub const DEFAULT_SCOPE: &str = "repo";

/// GitHub rejects API requests without a user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("stargazer/", env!("CARGO_PKG_VERSION"));

/// OAuth configuration for a GitHub OAuth app.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub access_token_url: String,
    pub device_code_url: String,
    pub api_base_url: String,
    pub user_agent: String,
}

impl OAuthConfig {
    /// Create config pointing at github.com.
    pub fn github(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_url: GITHUB_AUTHORIZE_URL.to_string(),
            access_token_url: GITHUB_ACCESS_TOKEN_URL.to_string(),
            device_code_url: GITHUB_DEVICE_CODE_URL.to_string(),
            api_base_url: GITHUB_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = url.into();
        self
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Point every endpoint at one base URL (mock providers).
    pub fn with_base_url(self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.with_authorize_url(format!("{base}/login/oauth/authorize"))
            .with_access_token_url(format!("{base}/login/oauth/access_token"))
            .with_device_code_url(format!("{base}/login/device/code"))
            .with_api_base_url(base)
    }

    /// Build an HTTP client carrying the configured user agent.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| OAuthError::InvalidRequest(format!("Failed to build HTTP client: {e}")))
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorize_url", &self.authorize_url)
            .field("access_token_url", &self.access_token_url)
            .field("device_code_url", &self.device_code_url)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Body of the access token endpoint.
///
/// GitHub answers both the code exchange and the device-code exchange with
/// either an `access_token` or an `error` field, usually under a 200 status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}
