//! OAuth 2.0 Device Authorization Grant (RFC 8628) against GitHub.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, Result};
use crate::oauth::{OAuthConfig, TokenResponse};

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Polling interval when the provider does not announce one (RFC 8628 §3.2).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Device-code session details as issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorizationRequest {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds until the device code expires, 0 when unknown.
    #[serde(default)]
    pub expires_in: u64,
    /// Minimum seconds between polls.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

/// Classified result of one device-code exchange.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenExchangeOutcome {
    Granted(String),
    Pending,
    SlowDown,
    Expired,
    Denied,
    UpstreamUnavailable(String),
}

impl TokenExchangeOutcome {
    /// Map a token endpoint body onto an outcome, one wire error code each.
    pub fn from_response(payload: TokenResponse) -> Self {
        if let Some(token) = payload.access_token.filter(|t| !t.is_empty()) {
            return Self::Granted(token);
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => Self::Pending,
            Some("slow_down") => Self::SlowDown,
            Some("expired_token") => Self::Expired,
            Some("access_denied") => Self::Denied,
            Some(other) => {
                let detail = payload
                    .error_description
                    .map(|d| format!(": {d}"))
                    .unwrap_or_default();
                Self::UpstreamUnavailable(format!("Device code error {other}{detail}"))
            }
            None => Self::UpstreamUnavailable(
                "Device token response missing token and error".to_string(),
            ),
        }
    }
}

impl std::fmt::Debug for TokenExchangeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted(_) => write!(f, "Granted([redacted])"),
            Self::Pending => write!(f, "Pending"),
            Self::SlowDown => write!(f, "SlowDown"),
            Self::Expired => write!(f, "Expired"),
            Self::Denied => write!(f, "Denied"),
            Self::UpstreamUnavailable(msg) => f.debug_tuple("UpstreamUnavailable").field(msg).finish(),
        }
    }
}

/// One token exchange attempt for a device code.
#[async_trait]
pub trait DeviceTokenExchanger: Send + Sync {
    async fn exchange_device_code(&self, device_code: &str) -> TokenExchangeOutcome;
}

/// HTTP client for the provider's device-code endpoints.
#[derive(Debug, Clone)]
pub struct DeviceAuthorizationClient {
    client: reqwest::Client,
    config: Arc<OAuthConfig>,
}

impl DeviceAuthorizationClient {
    pub fn new(config: Arc<OAuthConfig>) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { client, config })
    }

    /// Ask the provider for a device code and the user-facing verification code.
    pub async fn request_device_code(&self, scope: &str) -> Result<DeviceAuthorizationRequest> {
        let response = self
            .client
            .post(&self.config.device_code_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| {
                OAuthError::UpstreamUnavailable(format!("Device code request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::UpstreamUnavailable(format!(
                "Device code request failed ({status}): {text}"
            )));
        }

        let request: DeviceAuthorizationRequest = response.json().await.map_err(|e| {
            OAuthError::UpstreamUnavailable(format!("Failed to parse device code response: {e}"))
        })?;

        tracing::info!(
            user_code = %request.user_code,
            verification_uri = %request.verification_uri,
            interval_secs = request.interval,
            expires_in = request.expires_in,
            "Device code issued"
        );
        Ok(request)
    }
}

#[async_trait]
impl DeviceTokenExchanger for DeviceAuthorizationClient {
    async fn exchange_device_code(&self, device_code: &str) -> TokenExchangeOutcome {
        let response = match self
            .client
            .post(&self.config.access_token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return TokenExchangeOutcome::UpstreamUnavailable(format!(
                    "Device token request failed: {e}"
                ));
            }
        };

        // GitHub reports protocol errors under 200; RFC 8628 servers use 400.
        let status = response.status();
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            return TokenExchangeOutcome::UpstreamUnavailable(format!(
                "Device token request failed ({status}): {text}"
            ));
        }

        match response.json::<TokenResponse>().await {
            Ok(payload) => TokenExchangeOutcome::from_response(payload),
            Err(e) => TokenExchangeOutcome::UpstreamUnavailable(format!(
                "Failed to parse device token response ({status}): {e}"
            )),
        }
    }
}
