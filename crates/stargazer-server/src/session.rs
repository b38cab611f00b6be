//! Cookie-carried session identity.
//!
//! Every request gets a [`SessionId`] in its extensions. A client without a
//! valid `stargazer_session` cookie is assigned a fresh id, and the response
//! sets the cookie.

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderValue, Request,
        header::{COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};
use stargazer_oauth::SessionId;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "stargazer_session";

/// Attach a [`SessionId`] to the request, issuing a cookie if needed.
pub async fn session_middleware(mut request: Request<Body>, next: Next) -> Response {
    let existing = session_from_headers(request.headers());
    let session = existing.unwrap_or_default();
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    if existing.is_none() {
        match HeaderValue::from_str(&session_cookie(session)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
                tracing::debug!(%session, "Issued session cookie");
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode session cookie"),
        }
    }

    response
}

/// Read the session id from the request's `Cookie` headers.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value))
}

/// `Set-Cookie` value for a session id.
pub fn session_cookie(session: SessionId) -> String {
    format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Router, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(session): Extension<SessionId>| async move { session.to_string() }),
            )
            .layer(axum::middleware::from_fn(session_middleware))
    }

    #[test]
    fn test_parse_among_other_cookies() {
        let session = SessionId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={session}; x=1")).unwrap(),
        );
        assert_eq!(session_from_headers(&headers), Some(session));
    }

    #[test]
    fn test_invalid_cookie_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("stargazer_session=not-a-uuid"),
        );
        assert_eq!(session_from_headers(&headers), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie(SessionId::new());
        assert!(cookie.starts_with("stargazer_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
    }

    #[tokio::test]
    async fn test_new_client_gets_cookie() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let session = String::from_utf8(body.to_vec()).unwrap();
        assert!(cookie.contains(&session));
    }

    #[tokio::test]
    async fn test_known_client_keeps_session() {
        let session = SessionId::new();
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(COOKIE, format!("{SESSION_COOKIE}={session}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], session.to_string().as_bytes());
    }
}
