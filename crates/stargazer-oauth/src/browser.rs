//! Browser (authorization code) flow.
//!
//! `begin_authorization` stores a fresh CSRF state in the caller's session and
//! hands back where the browser should go; `complete_authorization` checks the
//! state echoed back by the provider and trades the code for a token that ends
//! up in the same session.

use std::sync::Arc;

use reqwest::header::{ACCEPT, LOCATION};
use serde::{Deserialize, Serialize};

use crate::csrf::{generate_state, states_match};
use crate::error::{OAuthError, Result};
use crate::oauth::{DEFAULT_SCOPE, OAuthConfig, TokenResponse};
use crate::session::SessionId;
use crate::token_store::TokenStore;

/// Guidance returned alongside recoverable authorization failures.
pub const RESTART_GUIDANCE: &str =
    "Restart the authorization at /login/browser or /login/cli";

/// User-facing knobs of the authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationParams {
    /// Suggested GitHub account, empty for none.
    pub login: String,
    /// Space-separated scopes.
    pub scope: String,
    /// Offer account creation on the authorization page.
    pub allow_signup: bool,
}

impl Default for AuthorizationParams {
    fn default() -> Self {
        Self {
            login: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            allow_signup: true,
        }
    }
}

/// Provider refused the code exchange (expired or already used code, etc).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRejection {
    pub error: String,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

/// Outcome of a callback that passed the CSRF check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    /// Token stored in the session.
    Granted { scope: Option<String> },
    /// Expected business outcome, the user has to start over.
    ProviderRejected(ProviderRejection),
}

/// Build the authorization URL for the OAuth flow.
pub fn build_authorization_url(
    config: &OAuthConfig,
    params: &AuthorizationParams,
    state: &str,
) -> String {
    let allow_signup = if params.allow_signup { "true" } else { "false" };
    let query_params = [
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", params.scope.as_str()),
        ("state", state),
        ("allow_signup", allow_signup),
        ("login", params.login.as_str()),
        ("response_type", "code"),
    ];

    let query = query_params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.authorize_url, query)
}

/// Redirect + callback authorization against the provider.
#[derive(Debug, Clone)]
pub struct BrowserAuthorizationFlow {
    client: reqwest::Client,
    config: Arc<OAuthConfig>,
    tokens: TokenStore,
}

impl BrowserAuthorizationFlow {
    pub fn new(config: Arc<OAuthConfig>, tokens: TokenStore) -> Result<Self> {
        // The redirect target is read from the provider's response, not followed.
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OAuthError::InvalidRequest(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    /// Start an authorization attempt and return the redirect target.
    pub async fn begin_authorization(
        &self,
        session: SessionId,
        params: &AuthorizationParams,
    ) -> Result<String> {
        let state = generate_state();
        self.tokens
            .sessions()
            .set_csrf_state(session, state.clone())
            .await;

        let auth_url = build_authorization_url(&self.config, params, &state);

        let response = self.client.get(&auth_url).send().await.map_err(|e| {
            OAuthError::UpstreamUnavailable(format!("Authorization request failed: {e}"))
        })?;

        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match target {
            Some(location) => {
                tracing::debug!(status = %response.status(), "Provider issued redirect");
                Ok(location)
            }
            None if response.status().is_success() => Ok(auth_url),
            None => Err(OAuthError::UpstreamUnavailable(format!(
                "Authorization request failed with status {}",
                response.status()
            ))),
        }
    }

    /// Validate the callback state and exchange the code for a token.
    pub async fn complete_authorization(
        &self,
        session: SessionId,
        code: &str,
        state: &str,
    ) -> Result<AuthorizationResult> {
        let expected = self.tokens.sessions().csrf_state(session).await;
        if !states_match(expected.as_deref(), state) {
            tracing::warn!(%session, "Callback state does not match session");
            return Err(OAuthError::CsrfMismatch);
        }

        let response = self
            .client
            .post(&self.config.access_token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::UpstreamUnavailable(format!("Token exchange failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OAuthError::UpstreamUnavailable(format!(
                "Token exchange failed ({status}): {error_text}"
            )));
        }

        let payload: TokenResponse = response.json().await.map_err(|e| {
            OAuthError::UpstreamUnavailable(format!("Failed to parse token response: {e}"))
        })?;

        if let Some(error) = payload.error {
            tracing::info!(%error, "Provider rejected authorization code");
            return Ok(AuthorizationResult::ProviderRejected(ProviderRejection {
                error,
                error_description: payload.error_description,
                error_uri: payload.error_uri,
            }));
        }

        let token = payload.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            OAuthError::UpstreamUnavailable(
                "Token response missing access_token and error".to_string(),
            )
        })?;

        self.tokens.put(token, session).await;
        tracing::info!(%session, "Browser authorization complete");

        Ok(AuthorizationResult::Granted {
            scope: payload.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::InMemoryTokenStore;
    use crate::session::SessionStore;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> Arc<OAuthConfig> {
        Arc::new(
            OAuthConfig::github("client-123", "secret-456", "http://localhost:8000/callback")
                .with_base_url(&server.uri()),
        )
    }

    fn test_flow(server: &MockServer) -> (BrowserAuthorizationFlow, TokenStore) {
        let tokens = TokenStore::new(SessionStore::new(), Arc::new(InMemoryTokenStore::new()));
        let flow = BrowserAuthorizationFlow::new(test_config(server), tokens.clone()).unwrap();
        (flow, tokens)
    }

    #[test]
    fn test_authorization_url() {
        let config = OAuthConfig::github("client-123", "s", "http://localhost:8000/callback");
        let params = AuthorizationParams {
            login: "octocat".to_string(),
            ..Default::default()
        };
        let url = build_authorization_url(&config, &params, "test_state");

        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fcallback"));
        assert!(url.contains("scope=repo"));
        assert!(url.contains("state=test_state"));
        assert!(url.contains("allow_signup=true"));
        assert!(url.contains("login=octocat"));
        assert!(url.contains("response_type=code"));
    }

    #[tokio::test]
    async fn test_begin_returns_provider_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login/oauth/authorize"))
            .and(query_param("client_id", "client-123"))
            .and(query_param("response_type", "code"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "https://github.com/login?return_to=x"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (flow, tokens) = test_flow(&server);
        let session = SessionId::new();
        let target = flow
            .begin_authorization(session, &AuthorizationParams::default())
            .await
            .unwrap();

        assert_eq!(target, "https://github.com/login?return_to=x");
        let state = tokens.sessions().csrf_state(session).await.unwrap();
        assert_eq!(state.len(), 43);
    }

    #[tokio::test]
    async fn test_begin_without_location_uses_built_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login/oauth/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let (flow, _tokens) = test_flow(&server);
        let target = flow
            .begin_authorization(SessionId::new(), &AuthorizationParams::default())
            .await
            .unwrap();

        assert!(target.starts_with(&format!("{}/login/oauth/authorize?", server.uri())));
    }

    #[tokio::test]
    async fn test_begin_upstream_unavailable() {
        let config = Arc::new(
            OAuthConfig::github("id", "s", "r").with_authorize_url("http://127.0.0.1:1/authorize"),
        );
        let tokens = TokenStore::new(SessionStore::new(), Arc::new(InMemoryTokenStore::new()));
        let flow = BrowserAuthorizationFlow::new(config, tokens).unwrap();

        let result = flow
            .begin_authorization(SessionId::new(), &AuthorizationParams::default())
            .await;
        assert!(matches!(result, Err(OAuthError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_complete_csrf_mismatch() {
        let server = MockServer::start().await;
        let (flow, tokens) = test_flow(&server);
        let session = SessionId::new();
        tokens
            .sessions()
            .set_csrf_state(session, "expected".to_string())
            .await;

        let result = flow
            .complete_authorization(session, "526r3fe25", "jabhdvzjhgx")
            .await;
        assert!(matches!(result, Err(OAuthError::CsrfMismatch)));
    }

    #[tokio::test]
    async fn test_complete_without_session_state_is_mismatch() {
        let server = MockServer::start().await;
        let (flow, _tokens) = test_flow(&server);

        let result = flow
            .complete_authorization(SessionId::new(), "code", "state")
            .await;
        assert!(matches!(result, Err(OAuthError::CsrfMismatch)));
    }

    #[tokio::test]
    async fn test_complete_stores_token_in_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_secret=secret-456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_browser",
                "token_type": "bearer",
                "scope": "repo"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (flow, tokens) = test_flow(&server);
        let session = SessionId::new();
        tokens
            .sessions()
            .set_csrf_state(session, "good-state".to_string())
            .await;

        let result = flow
            .complete_authorization(session, "the-code", "good-state")
            .await
            .unwrap();

        assert_eq!(
            result,
            AuthorizationResult::Granted {
                scope: Some("repo".to_string())
            }
        );
        assert_eq!(
            tokens.sessions().access_token(session).await.as_deref(),
            Some("gho_browser")
        );
        // Durable store is untouched by the browser flow.
        assert!(!tokens.durable().exists());
    }

    #[tokio::test]
    async fn test_complete_provider_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired.",
                "error_uri": "https://docs.github.com/apps/troubleshooting"
            })))
            .mount(&server)
            .await;

        let (flow, tokens) = test_flow(&server);
        let session = SessionId::new();
        tokens
            .sessions()
            .set_csrf_state(session, "s".to_string())
            .await;

        let result = flow.complete_authorization(session, "old", "s").await.unwrap();

        match result {
            AuthorizationResult::ProviderRejected(rejection) => {
                assert_eq!(rejection.error, "bad_verification_code");
                assert!(rejection.error_description.is_some());
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(tokens.sessions().access_token(session).await.is_none());
    }

    #[tokio::test]
    async fn test_complete_upstream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let (flow, tokens) = test_flow(&server);
        let session = SessionId::new();
        tokens
            .sessions()
            .set_csrf_state(session, "s".to_string())
            .await;

        let result = flow.complete_authorization(session, "code", "s").await;
        assert!(matches!(result, Err(OAuthError::UpstreamUnavailable(_))));
    }
}
