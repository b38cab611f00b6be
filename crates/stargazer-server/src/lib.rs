//! HTTP API for Stargazer.
//!
//! Exposes both GitHub authorization flows and a proxy for the
//! authenticated user's starred repositories.
//!
//! # Routes
//!
//! - `GET /` and `GET /health`
//! - `GET /login/browser` and `GET /callback` (authorization code flow)
//! - `GET /login/cli` (device flow, polls in the background)
//! - `GET /starred`
//!
//! # Example
//!
//! ```ignore
//! use stargazer_oauth::{OAuthConfig, TokenStore};
//! use stargazer_server::{AppState, Server, ServerConfig};
//!
//! let oauth = OAuthConfig::github(client_id, client_secret, redirect_uri);
//! let state = AppState::new(ServerConfig::new(), oauth, TokenStore::with_file(".token"))?;
//! Server::from_state(state).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod starred;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use session::{SESSION_COOKIE, session_middleware};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Stargazer HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(routes::health_routes())
            .route("/login/browser", get(routes::login_browser_handler))
            .route("/callback", get(routes::callback_handler))
            .route("/login/cli", get(routes::login_cli_handler))
            .route("/starred", get(routes::starred_handler))
            .layer(middleware::from_fn(session::session_middleware));

        if self.state.config().enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.state.config().request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router.with_state(self.state.clone())
    }

    /// Cancelling this token stops the server and every polling task it started.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config().bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Periodically drop expired browser sessions until shutdown.
    pub fn spawn_session_cleanup(&self) -> JoinHandle<()> {
        let sessions = self.state.tokens.sessions().clone();
        let shutdown = self.state.shutdown.child_token();
        let period = self.state.config().session_cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        sessions.cleanup_expired().await;
                    }
                }
            }
        })
    }

    /// Serve on an already bound listener until the shutdown token fires.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        let shutdown = self.state.shutdown.clone();
        let cleanup = self.spawn_session_cleanup();

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Starting server");
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))?;

        cleanup.abort();
        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config().bind_address
    }
}
