//! `GET /login/cli` - device authorization.
//!
//! Answers with the user code right away and leaves a detached polling task
//! behind. The task's only output is the durable token file.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::{Deserialize, Serialize};
use stargazer_oauth::{DeviceAuthorizationRequest, DevicePollingLoop, DeviceTokenExchanger};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceLoginQuery {
    pub scope: Option<String>,
}

/// What the user needs to complete the authorization elsewhere.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceLoginResponse {
    pub message: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
}

impl From<&DeviceAuthorizationRequest> for DeviceLoginResponse {
    fn from(request: &DeviceAuthorizationRequest) -> Self {
        Self {
            message: format!(
                "Enter the code {} at {}. The token is saved once you approve; then call /starred.",
                request.user_code, request.verification_uri
            ),
            user_code: request.user_code.clone(),
            verification_uri: request.verification_uri.clone(),
            expires_in: request.expires_in,
            interval: request.interval,
        }
    }
}

/// GET /login/cli
pub async fn login_cli_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<DeviceLoginQuery>, QueryRejection>,
) -> Result<Json<DeviceLoginResponse>> {
    let Query(query) = query?;
    let scope = query
        .scope
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.config().default_scope.clone());

    let request = state.device.request_device_code(&scope).await?;

    let exchanger: Arc<dyn DeviceTokenExchanger> = state.device.clone();
    let mut polling = DevicePollingLoop::new(exchanger, state.tokens.durable().clone())
        .with_cancellation(state.shutdown.child_token());
    if request.expires_in > 0 {
        polling = polling.with_deadline(
            tokio::time::Instant::now() + Duration::from_secs(request.expires_in),
        );
    }

    let handle = polling.spawn(&request);
    let user_code = request.user_code.clone();
    tokio::spawn(async move {
        match handle.await {
            Ok(outcome) => tracing::info!(%user_code, ?outcome, "Device polling finished"),
            Err(e) => tracing::error!(%user_code, error = %e, "Device polling task panicked"),
        }
    });

    Ok(Json(DeviceLoginResponse::from(&request)))
}
