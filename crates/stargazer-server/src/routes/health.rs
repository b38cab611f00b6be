//! Root and health check endpoints.

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Service banner.
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    #[serde(rename = "Message")]
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "API for fetching GitHub starred repositories".to_string(),
    })
}

/// Simple health check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create root and health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}
