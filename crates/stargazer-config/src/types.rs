//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [session]
//! max_sessions = 10000
//! ttl_secs = 3600
//!
//! [github]
//! client_id = "Iv1.abc"
//! redirect_uri = "http://127.0.0.1:8000/callback"
//! token_file = ".token"
//! scope = "repo"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Default durable token file, relative to the working directory.
pub const DEFAULT_TOKEN_FILE: &str = ".token";

/// Default OAuth scope requested by both flows.
pub const DEFAULT_SCOPE: &str = "repo";

/// Default maximum number of browser sessions held in memory.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default idle time before a browser session expires.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Default interval between expired-session sweeps.
pub const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StargazerConfig {
    /// Server configuration.
    pub server: Option<ServerConfig>,

    /// Browser session limits.
    pub session: Option<SessionConfig>,

    /// GitHub OAuth app configuration.
    pub github: Option<GithubConfig>,
}

impl StargazerConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// `[server]` and `[session]` are replaced wholesale, `[github]` is merged
    /// field by field.
    pub fn merge(&mut self, other: StargazerConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.session.is_some() {
            self.session = other.session;
        }

        match (&mut self.github, other.github) {
            (Some(base), Some(layer)) => base.merge(layer),
            (slot @ None, Some(layer)) => *slot = Some(layer),
            (_, None) => {}
        }
    }

    /// Listen address, falling back to [`DEFAULT_BIND`].
    pub fn bind(&self) -> &str {
        self.server
            .as_ref()
            .map(|s| s.bind.as_str())
            .unwrap_or(DEFAULT_BIND)
    }

    /// Session limits, falling back to the defaults.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Durable token file, falling back to [`DEFAULT_TOKEN_FILE`].
    pub fn token_file(&self) -> PathBuf {
        self.github
            .as_ref()
            .and_then(|g| g.token_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE))
    }

    /// Requested OAuth scope, falling back to [`DEFAULT_SCOPE`].
    pub fn scope(&self) -> &str {
        self.github
            .as_ref()
            .and_then(|g| g.scope.as_deref())
            .unwrap_or(DEFAULT_SCOPE)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.github.as_ref().and_then(|g| g.user_agent.as_deref())
    }
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to, `host:port`.
    pub bind: String,
    /// Enable HTTP request tracing.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            request_logging: true,
        }
    }
}

/// Browser session section.
///
/// Sessions are in memory only; these bound how many are kept and for how long.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of sessions before the least recently used is evicted.
    pub max_sessions: usize,
    /// Idle seconds before a session expires. `0` disables expiry.
    pub ttl_secs: u64,
    /// Seconds between sweeps of expired sessions.
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            cleanup_interval_secs: DEFAULT_SESSION_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// GitHub OAuth app section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub client_id: Option<String>,
    /// Client secret. Prefer `STARGAZER_CLIENT_SECRET` or `.env`.
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_file: Option<PathBuf>,
    pub scope: Option<String>,
    pub user_agent: Option<String>,
}

impl GithubConfig {
    /// Overlay the fields set in `other`.
    pub fn merge(&mut self, other: GithubConfig) {
        if other.client_id.is_some() {
            self.client_id = other.client_id;
        }
        if other.client_secret.is_some() {
            self.client_secret = other.client_secret;
        }
        if other.redirect_uri.is_some() {
            self.redirect_uri = other.redirect_uri;
        }
        if other.token_file.is_some() {
            self.token_file = other.token_file;
        }
        if other.scope.is_some() {
            self.scope = other.scope;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
    }

    pub fn has_plaintext_secret(&self) -> bool {
        self.client_secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}
