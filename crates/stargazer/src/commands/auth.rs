//! Auth command - device authorization from the terminal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use stargazer_oauth::{
    DeviceAuthorizationClient, DevicePollingLoop, DurableTokenStore, FileTokenStore, OAuthConfig,
    PollState,
};
use tokio_util::sync::CancellationToken;

use super::{Context, mask_token};

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Durable token file (overrides config)
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Authorize with GitHub using a device code
    Login {
        /// OAuth scope to request (overrides config)
        #[arg(long)]
        scope: Option<String>,
    },

    /// Show whether a token is stored
    Status,

    /// Delete the stored token
    Logout,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = loaded.config;
    let store = FileTokenStore::new(args.token_file.unwrap_or_else(|| config.token_file()));

    match args.command {
        AuthCommand::Login { scope } => {
            let scope = scope.unwrap_or_else(|| config.scope().to_string());
            let client_id = stargazer_config::resolve_client_id(&config)?;
            let mut oauth = OAuthConfig::github(client_id, "", "");
            if let Some(user_agent) = config.user_agent() {
                oauth = oauth.with_user_agent(user_agent);
            }
            cmd_login(oauth, store, &scope).await
        }
        AuthCommand::Status => cmd_status(&store, ctx).await,
        AuthCommand::Logout => cmd_logout(&store).await,
    }
}

async fn cmd_login(oauth: OAuthConfig, store: FileTokenStore, scope: &str) -> Result<()> {
    let client = Arc::new(DeviceAuthorizationClient::new(Arc::new(oauth))?);
    let request = client.request_device_code(scope).await?;

    println!("GitHub Device Authorization");
    println!("===========================");
    println!();
    println!("Open {} and enter the code:", request.verification_uri);
    println!();
    println!("  {}", request.user_code);
    println!();
    if request.expires_in > 0 {
        println!(
            "The code expires in {} minutes. Waiting for approval (Ctrl-C to cancel)...",
            request.expires_in / 60
        );
    } else {
        println!("Waiting for approval (Ctrl-C to cancel)...");
    }

    let token_path = store.token_path().to_path_buf();
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut polling = DevicePollingLoop::new(client, Arc::new(store)).with_cancellation(cancel);
    if request.expires_in > 0 {
        polling = polling.with_deadline(
            tokio::time::Instant::now() + Duration::from_secs(request.expires_in),
        );
    }

    let outcome = polling
        .run(&request.device_code, Duration::from_secs(request.interval))
        .await;

    match outcome {
        PollState::Granted => {
            println!();
            println!("Authorization successful!");
            println!("Token saved to {}", token_path.display());
            Ok(())
        }
        PollState::Expired => anyhow::bail!("The device code expired. Run 'stargazer auth login' again."),
        PollState::Denied => anyhow::bail!("Authorization was denied."),
        PollState::Cancelled => {
            println!("Cancelled.");
            Ok(())
        }
        PollState::Failed(message) => anyhow::bail!("Authorization failed: {message}"),
        PollState::Polling(_) => anyhow::bail!("Polling stopped before a terminal state"),
    }
}

async fn cmd_status(store: &FileTokenStore, ctx: &Context) -> Result<()> {
    let token = store.load().await?;
    let path = store.token_path().display().to_string();
    let saved_at = tokio::fs::metadata(store.token_path())
        .await
        .and_then(|m| m.modified())
        .ok()
        .map(|t| chrono::DateTime::<chrono::Local>::from(t).to_rfc3339());

    if ctx.json_output {
        let status = serde_json::json!({
            "authenticated": token.is_some(),
            "token_file": path,
            "token": token.as_deref().map(mask_token),
            "saved_at": saved_at,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Authentication Status");
    println!("---------------------");
    match token {
        Some(token) => {
            println!("Token: {} ({})", mask_token(&token), path);
            if let Some(saved_at) = saved_at {
                println!("  Saved: {}", saved_at);
            }
        }
        None => {
            println!("Token: not stored ({})", path);
            println!("  Run 'stargazer auth login' or use /login/cli on a running server");
        }
    }
    Ok(())
}

async fn cmd_logout(store: &FileTokenStore) -> Result<()> {
    if store.exists() {
        store.delete().await?;
        println!("Token removed from {}", store.token_path().display());
    } else {
        println!("No stored token found.");
    }
    Ok(())
}
