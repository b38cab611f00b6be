//! Browser authorization endpoints.
//!
//! - `GET /login/browser` - redirect to the provider's authorization page
//! - `GET /callback` - provider redirect target, exchanges the code

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use stargazer_oauth::browser::RESTART_GUIDANCE;
use stargazer_oauth::csrf::states_match;
use stargazer_oauth::{AuthorizationParams, AuthorizationResult, ProviderRejection, SessionId};

use crate::error::{Result, ServerError};
use crate::state::AppState;

fn default_signup() -> bool {
    true
}

/// Query parameters for `GET /login/browser`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginQuery {
    /// Suggested GitHub account.
    #[serde(default)]
    pub login: String,
    /// Offer account creation on the authorization page.
    #[serde(default = "default_signup")]
    pub signup: bool,
    pub scope: Option<String>,
}

/// Query parameters the provider sends back to `GET /callback`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: String,
    /// Set instead of `code` when the user declined on the provider's page.
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub message: String,
    /// Where the token can be used.
    pub next: String,
}

/// Provider refused the authorization.
#[derive(Debug, Serialize, Deserialize)]
pub struct RejectionResponse {
    pub error: String,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
    pub message: String,
}

impl From<ProviderRejection> for RejectionResponse {
    fn from(rejection: ProviderRejection) -> Self {
        Self {
            error: rejection.error,
            error_description: rejection.error_description,
            error_uri: rejection.error_uri,
            message: RESTART_GUIDANCE.to_string(),
        }
    }
}

/// GET /login/browser
pub async fn login_browser_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    query: std::result::Result<Query<LoginQuery>, QueryRejection>,
) -> Result<Redirect> {
    let Query(query) = query?;
    let params = AuthorizationParams {
        login: query.login,
        scope: query
            .scope
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| state.config().default_scope.clone()),
        allow_signup: query.signup,
    };

    let target = state.browser.begin_authorization(session, &params).await?;
    tracing::info!(%session, scope = %params.scope, "Browser authorization started");

    Ok(Redirect::temporary(&target))
}

/// GET /callback
pub async fn callback_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    query: std::result::Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;
    let result = match query.code {
        Some(code) => {
            state
                .browser
                .complete_authorization(session, &code, &query.state)
                .await?
        }
        None => {
            let expected = state.tokens.sessions().csrf_state(session).await;
            if !states_match(expected.as_deref(), &query.state) {
                return Err(ServerError::CsrfMismatch);
            }
            let error = query
                .error
                .ok_or_else(|| ServerError::BadRequest("Missing 'code' parameter".to_string()))?;
            tracing::info!(%session, %error, "Authorization declined on provider page");
            AuthorizationResult::ProviderRejected(ProviderRejection {
                error,
                error_description: query.error_description,
                error_uri: query.error_uri,
            })
        }
    };

    let response = match result {
        AuthorizationResult::Granted { .. } => Json(CallbackResponse {
            message: "Authorization successful".to_string(),
            next: "/starred".to_string(),
        })
        .into_response(),
        AuthorizationResult::ProviderRejected(rejection) => {
            Json(RejectionResponse::from(rejection)).into_response()
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: serde::de::DeserializeOwned>(query: &str) -> T {
        let uri: axum::http::Uri = format!("/x?{query}").parse().unwrap();
        Query::<T>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_login_query_defaults() {
        let query: LoginQuery = parse("");
        assert_eq!(query.login, "");
        assert!(query.signup);
        assert!(query.scope.is_none());

        let query: LoginQuery = parse("login=octocat&signup=false&scope=public_repo");
        assert_eq!(query.login, "octocat");
        assert!(!query.signup);
        assert_eq!(query.scope.as_deref(), Some("public_repo"));
    }

    #[test]
    fn test_callback_query_error_form() {
        let query: CallbackQuery =
            parse("error=access_denied&error_description=denied&state=abc");
        assert!(query.code.is_none());
        assert_eq!(query.error.as_deref(), Some("access_denied"));
        assert_eq!(query.state, "abc");
    }

    #[test]
    fn test_rejection_carries_guidance() {
        let response = RejectionResponse::from(ProviderRejection {
            error: "bad_verification_code".into(),
            error_description: Some("The code passed is incorrect or expired.".into()),
            error_uri: None,
        });
        assert_eq!(response.message, RESTART_GUIDANCE);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], "bad_verification_code");
        assert!(json.get("error_uri").is_some());
    }
}
