//! Error types for the OAuth flows and token storage.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while authorizing or resolving tokens.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Callback `state` did not match the one stored in the session.
    #[error("Invalid CSRF token")]
    CsrfMismatch,

    /// Transport-level failure or unexpected response from the provider.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Provider rejected the bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Durable token store I/O failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No token in the session nor in the durable store.
    #[error("No access token found. Authorize at /login/browser or /login/cli first")]
    NotFound,

    /// Invalid request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::UpstreamUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for OAuthError {
    fn from(e: std::io::Error) -> Self {
        OAuthError::Persistence(e.to_string())
    }
}
