//! `GET /starred` - the authenticated user's public starred repositories.

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::QueryRejection},
};
use stargazer_oauth::SessionId;

use crate::error::{Result, ServerError};
use crate::starred::{StarredQuery, StarredResponse};
use crate::state::AppState;

/// GET /starred
pub async fn starred_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    query: std::result::Result<Query<StarredQuery>, QueryRejection>,
) -> Result<Json<StarredResponse>> {
    let Query(query) = query?;
    query.validate().map_err(ServerError::BadRequest)?;

    let resolved = state.tokens.resolve(Some(session)).await?;
    tracing::debug!(%session, source = ?resolved.source, "Resolved access token");

    let repos = state.starred.fetch_starred(&resolved.token, &query).await?;
    Ok(Json(StarredResponse::from_page(repos)))
}
