//! Start command - launches the Stargazer server.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use stargazer_config::DEFAULT_BIND;
use stargazer_oauth::{FileTokenStore, OAuthConfig, SessionStore, TokenStore};
use stargazer_server::{AppState, Server, ServerConfig};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to, host or host:port (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Durable token file (overrides config)
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Allow cross-origin requests
    #[arg(long)]
    pub cors: bool,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    let credentials = stargazer_config::resolve_credentials(config)?;
    let addr = resolve_bind_address(config.bind(), args.bind.as_deref(), args.port)?;
    let token_file = args.token_file.unwrap_or_else(|| config.token_file());
    let session = config.session();
    let request_logging = config
        .server
        .as_ref()
        .map(|s| s.request_logging)
        .unwrap_or(true);

    let mut oauth = OAuthConfig::github(
        credentials.client_id,
        credentials.client_secret,
        credentials.redirect_uri,
    );
    if let Some(user_agent) = config.user_agent() {
        oauth = oauth.with_user_agent(user_agent);
    }

    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_request_logging(request_logging)
        .with_cors(args.cors)
        .with_default_scope(config.scope())
        .with_session_cleanup_interval(session.cleanup_interval());

    if ctx.verbose {
        println!("Bind address: {}", addr);
        println!("Redirect URI: {}", oauth.redirect_uri);
        println!("Default scope: {}", config.scope());
    }
    println!("Token file: {}", token_file.display());

    let tokens = TokenStore::new(
        SessionStore::with_config(session.max_sessions, session.ttl()),
        Arc::new(FileTokenStore::new(&token_file)),
    );
    let state = AppState::new(server_config, oauth, tokens)?;
    let server = Server::from_state(state);

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    println!("Listening on http://{}", addr);
    server.run().await.context("server failed")?;
    Ok(())
}

/// Combine the configured `host:port` with `--bind` and `--port`.
///
/// `--bind` may be a bare host or a full `host:port`; `--port` wins over either.
pub fn resolve_bind_address(
    configured: &str,
    bind: Option<&str>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    let fallback_port = configured
        .parse::<SocketAddr>()
        .map(|a| a.port())
        .or_else(|_| DEFAULT_BIND.parse::<SocketAddr>().map(|a| a.port()))?;

    let raw = bind.unwrap_or(configured);
    let mut addr = match raw.parse::<SocketAddr>() {
        Ok(addr) => addr,
        Err(_) => {
            let ip: IpAddr = raw
                .parse()
                .with_context(|| format!("invalid bind address '{raw}'"))?;
            SocketAddr::new(ip, fallback_port)
        }
    };

    if let Some(port) = port {
        addr.set_port(port);
    }
    Ok(addr)
}
