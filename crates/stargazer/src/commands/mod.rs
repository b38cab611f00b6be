//! CLI command handlers.

pub mod auth;
pub mod start;

use std::path::PathBuf;

use anyhow::Result;
use stargazer_config::{ConfigSource, LoadedConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, skips discovery.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the explicit config file or discover the layered one.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = if let Some(ref path) = self.config_path {
            let config = stargazer_config::load_config_file(path)?;
            LoadedConfig {
                config,
                sources: vec![ConfigSource {
                    path: path.clone(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            }
        } else {
            stargazer_config::load_config(None)?
        };

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }

        if self.verbose {
            let sources = loaded.loaded_from();
            if sources.is_empty() {
                println!("No config files found, using defaults + environment");
            } else {
                for source in sources {
                    println!("Loaded config: {}", source.display());
                }
            }
        }

        Ok(loaded)
    }
}

/// Show only the ends of a token.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
