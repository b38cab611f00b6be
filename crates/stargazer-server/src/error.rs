//! Error types for the server.

use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use stargazer_oauth::OAuthError;
use stargazer_oauth::browser::RESTART_GUIDANCE;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Callback state did not match the session.
    #[error("Invalid CSRF token")]
    CsrfMismatch,

    /// No token available for this client.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Provider rejected the stored token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Provider unreachable or answered unexpectedly.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Token file could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<OAuthError> for ServerError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::CsrfMismatch => ServerError::CsrfMismatch,
            OAuthError::NotFound => ServerError::NotAuthenticated(format!(
                "No access token found. {RESTART_GUIDANCE}"
            )),
            OAuthError::Unauthorized(msg) => {
                ServerError::Unauthorized(format!("{msg}. {RESTART_GUIDANCE}"))
            }
            OAuthError::UpstreamUnavailable(msg) => ServerError::Upstream(msg),
            OAuthError::Persistence(msg) => ServerError::Storage(msg),
            OAuthError::InvalidRequest(msg) => ServerError::BadRequest(msg),
        }
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::CsrfMismatch => (StatusCode::BAD_REQUEST, "csrf_mismatch"),
            ServerError::NotAuthenticated(_) => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            ServerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = match &self {
            ServerError::NotAuthenticated(msg) | ServerError::Unauthorized(msg) => msg.clone(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        // CSRF failures keep the `{"detail": ...}` body of the callback route.
        if matches!(self, ServerError::CsrfMismatch) {
            return (status, Json(json!({ "detail": message }))).into_response();
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_csrf_mismatch_body() {
        let response = ServerError::from(OAuthError::CsrfMismatch).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "Invalid CSRF token" })
        );
    }

    #[tokio::test]
    async fn test_not_found_is_401_with_guidance() {
        let response = ServerError::from(OAuthError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], "not_authenticated");
        assert!(body["message"].as_str().unwrap().contains("/login/browser"));
    }

    #[tokio::test]
    async fn test_upstream_is_500_with_message() {
        let response =
            ServerError::from(OAuthError::UpstreamUnavailable("connection refused".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], "upstream_error");
        assert!(body["message"].as_str().unwrap().contains("connection refused"));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServerError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServerError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_query_rejection_is_json_bad_request() {
        use axum::extract::Query;
        use axum::http::Uri;

        #[derive(Debug, serde::Deserialize)]
        struct Paging {
            #[allow(dead_code)]
            page: u32,
        }

        let uri: Uri = "/starred?page=abc".parse().unwrap();
        let rejection = Query::<Paging>::try_from_uri(&uri).unwrap_err();
        let response = ServerError::from(rejection).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "bad_request");
        assert!(body["message"].as_str().unwrap().contains("page"));
    }
}
