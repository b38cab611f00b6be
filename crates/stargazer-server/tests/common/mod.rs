//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use stargazer_oauth::{OAuthConfig, TokenStore};
use stargazer_server::{AppState, Server, ServerConfig};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

/// A test server backed by a mock GitHub.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client with a cookie jar and redirects disabled.
    pub client: Client,
    /// Mock provider (OAuth endpoints and REST API).
    pub provider: MockServer,
    /// Durable token file used by the server.
    pub token_path: PathBuf,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
    /// Temporary directory holding the token file.
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server with an empty token file location.
    pub async fn start() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let token_path = temp_dir.path().join(".token");
        let provider = MockServer::start().await;

        let addr = find_available_port().await?;

        let oauth = OAuthConfig::github(
            "client-123",
            "secret-456",
            format!("http://{addr}/callback"),
        )
        .with_base_url(&provider.uri());
        let config = ServerConfig::new()
            .with_bind_address(addr)
            .with_request_logging(false);
        let state = AppState::new(config, oauth, TokenStore::with_file(&token_path))?;

        let server = Server::from_state(state);
        let shutdown = server.shutdown_token();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            provider,
            token_path,
            shutdown,
            handle: Some(handle),
            temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    /// Wait until the durable token file holds a token.
    pub async fn wait_for_token_file(&self, within: Duration) -> Result<String> {
        let result = timeout(within, async {
            loop {
                if let Ok(contents) = tokio::fs::read_to_string(&self.token_path).await
                    && !contents.trim().is_empty()
                {
                    return contents.trim().to_string();
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match result {
            Ok(token) => Ok(token),
            Err(_) => anyhow::bail!("Timeout waiting for token file"),
        }
    }

    /// Trigger graceful shutdown and wait for the server task.
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            timeout(Duration::from_secs(5), handle).await??;
        }
        Ok(())
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
