//! GitHub OAuth for Stargazer.
//!
//! Two entry flows converge on one outcome: a bearer token that the
//! [`TokenStore`] can resolve.
//!
//! # Components
//!
//! - [`csrf`] - anti-forgery `state` nonces
//! - [`oauth`] - provider endpoints and credentials
//! - [`browser`] - redirect + callback flow, token lands in the session
//! - [`device`] - device-code request and token exchange classification
//! - [`polling`] - detached, provider-paced polling loop, token lands on disk
//! - [`session`] - per-client ephemeral session state
//! - [`token_store`] - session-first, file-second token resolution

pub mod browser;
pub mod csrf;
pub mod device;
pub mod error;
pub mod oauth;
pub mod polling;
pub mod session;
pub mod token_store;

pub use browser::{
    AuthorizationParams, AuthorizationResult, BrowserAuthorizationFlow, ProviderRejection,
};
pub use device::{
    DeviceAuthorizationClient, DeviceAuthorizationRequest, DeviceTokenExchanger,
    TokenExchangeOutcome,
};
pub use error::{OAuthError, Result};
pub use oauth::OAuthConfig;
pub use polling::{DevicePollingLoop, PollState};
pub use session::{AuthorizationSession, SessionId, SessionStore};
pub use token_store::{
    DurableTokenStore, FileTokenStore, InMemoryTokenStore, ResolvedToken, SharedDurableStore,
    TokenSource, TokenStore,
};
