//! Configuration for the stargazer service.
//!
//! Provides:
//! - TOML config layering (user config dir + project-local `stargazer.toml`)
//! - OAuth credential resolution (env var → legacy env var → config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    Credentials, ResolvedSecret, SecretSource, resolve_client_id, resolve_client_id_with,
    resolve_credentials, resolve_credentials_with, resolve_secret,
};
pub use types::*;
