//! Application state shared across handlers.

use std::sync::Arc;

use stargazer_oauth::{
    BrowserAuthorizationFlow, DeviceAuthorizationClient, OAuthConfig, TokenStore,
};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::starred::StarredClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Provider endpoints and app credentials.
    pub oauth: Arc<OAuthConfig>,

    /// Session and durable token storage.
    pub tokens: TokenStore,

    pub browser: Arc<BrowserAuthorizationFlow>,

    pub device: Arc<DeviceAuthorizationClient>,

    pub starred: Arc<StarredClient>,

    /// Parent of every background polling task's cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServerConfig, oauth: OAuthConfig, tokens: TokenStore) -> Result<Self> {
        let oauth = Arc::new(oauth);
        let browser = BrowserAuthorizationFlow::new(oauth.clone(), tokens.clone())
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let device = DeviceAuthorizationClient::new(oauth.clone())
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let starred =
            StarredClient::new(&oauth).map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            oauth,
            tokens,
            browser: Arc::new(browser),
            device: Arc::new(device),
            starred: Arc::new(starred),
            shutdown: CancellationToken::new(),
        })
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
