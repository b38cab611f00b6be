//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listen address, `127.0.0.1:8000`.
pub const DEFAULT_BIND_ADDRESS: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::LOCALHOST),
    8000,
);

/// Default period of the expired-session sweep.
pub const DEFAULT_SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Enable HTTP request tracing.
    pub request_logging: bool,

    /// Allow cross-origin requests from any origin.
    pub enable_cors: bool,

    /// Scope requested when a login route gets none.
    pub default_scope: String,

    /// How often expired browser sessions are swept.
    pub session_cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            request_logging: true,
            enable_cors: false,
            default_scope: stargazer_oauth::oauth::DEFAULT_SCOPE.to_string(),
            session_cleanup_interval: DEFAULT_SESSION_CLEANUP_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.enable_cors = enabled;
        self
    }

    pub fn with_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scope = scope.into();
        self
    }

    /// Set the expired-session sweep period (at least one second).
    pub fn with_session_cleanup_interval(mut self, interval: Duration) -> Self {
        self.session_cleanup_interval = interval.max(Duration::from_secs(1));
        self
    }
}
