//! Stargazer - GitHub OAuth login and starred repositories API
//!
//! Main entry point for the Stargazer CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, start};

/// Stargazer - GitHub OAuth login and starred repositories API
#[derive(Parser)]
#[command(name = "stargazer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(short, long, global = true, env = "STARGAZER_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start(start::StartArgs),

    /// GitHub authorization from the terminal
    Auth(auth::AuthArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` never overrides variables that are already set.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "stargazer=debug,stargazer_server=debug,stargazer_oauth=debug,stargazer_config=debug,tower_http=debug,info"
    } else {
        "stargazer=info,stargazer_server=info,stargazer_oauth=info,stargazer_config=info,warn"
    };

    let log_dir = stargazer_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "stargazer.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "stargazer=trace,stargazer_server=trace,stargazer_oauth=trace,stargazer_config=trace,tower_http=debug,info",
                )),
        )
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env"),
    }

    let ctx = commands::Context {
        config_path: cli.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Auth(args) => auth::run(args, &ctx).await,
    }
}
