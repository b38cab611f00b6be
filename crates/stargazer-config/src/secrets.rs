//! OAuth app credential resolution.
//!
//! Resolution order per credential:
//! 1. `STARGAZER_*` environment variable
//! 2. Legacy unprefixed variable (`CLIENT_ID`, `CLIENT_SECRET`, `REDIRECT_URI`)
//! 3. `[github]` section of the config file (warned about for the secret)
//!
//! A `.env` file is loaded into the process environment by the binary before
//! resolution runs, without overriding variables that are already set.

use std::fmt;

use crate::{ConfigError, Result, StargazerConfig};

const CLIENT_ID_VARS: &[&str] = &["STARGAZER_CLIENT_ID", "CLIENT_ID"];
const CLIENT_SECRET_VARS: &[&str] = &["STARGAZER_CLIENT_SECRET", "CLIENT_SECRET"];
const REDIRECT_URI_VARS: &[&str] = &["STARGAZER_REDIRECT_URI", "REDIRECT_URI"];

/// A resolved value with provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub value: String,
    pub source: SecretSource,
}

impl fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"[redacted]")
            .field("source", &self.source)
            .finish()
    }
}

/// Where a value was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    EnvVar(String),
    /// Config file (plaintext, not recommended for the secret).
    ConfigFile,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {var}"),
            SecretSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Resolve one value: the first non-empty variable in `vars`, then `config_value`.
pub fn resolve_secret(
    vars: &[&str],
    config_value: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<ResolvedSecret> {
    for var in vars {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            return Some(ResolvedSecret {
                value: value.trim().to_string(),
                source: SecretSource::EnvVar((*var).to_string()),
            });
        }
    }

    config_value
        .filter(|v| !v.trim().is_empty())
        .map(|v| ResolvedSecret {
            value: v.trim().to_string(),
            source: SecretSource::ConfigFile,
        })
}

/// OAuth app credentials needed by the browser flow.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Resolve all credentials from the process environment and `config`.
pub fn resolve_credentials(config: &StargazerConfig) -> Result<Credentials> {
    resolve_credentials_with(config, |var| std::env::var(var).ok())
}

/// Resolve all credentials with a custom variable lookup.
pub fn resolve_credentials_with(
    config: &StargazerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
    let github = config.github.clone().unwrap_or_default();

    let client_id = required(
        "client_id",
        CLIENT_ID_VARS,
        github.client_id.as_deref(),
        &lookup,
    )?;
    let client_secret = required(
        "client_secret",
        CLIENT_SECRET_VARS,
        github.client_secret.as_deref(),
        &lookup,
    )?;
    if client_secret.source == SecretSource::ConfigFile {
        tracing::warn!("Using client_secret from plaintext config file");
    }
    let redirect_uri = required(
        "redirect_uri",
        REDIRECT_URI_VARS,
        github.redirect_uri.as_deref(),
        &lookup,
    )?;
    if !redirect_uri.value.starts_with("http://") && !redirect_uri.value.starts_with("https://") {
        return Err(ConfigError::InvalidValue {
            field: "redirect_uri".to_string(),
            message: "must be an http(s) URL".to_string(),
        });
    }

    tracing::debug!(
        client_id_source = %client_id.source,
        client_secret_source = %client_secret.source,
        redirect_uri_source = %redirect_uri.source,
        "Resolved OAuth credentials"
    );

    Ok(Credentials {
        client_id: client_id.value,
        client_secret: client_secret.value,
        redirect_uri: redirect_uri.value,
    })
}

/// Resolve only the client id (all the device flow needs).
pub fn resolve_client_id(config: &StargazerConfig) -> Result<String> {
    resolve_client_id_with(config, |var| std::env::var(var).ok())
}

pub fn resolve_client_id_with(
    config: &StargazerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let config_value = config.github.as_ref().and_then(|g| g.client_id.as_deref());
    required("client_id", CLIENT_ID_VARS, config_value, &lookup).map(|s| s.value)
}

fn required(
    field: &str,
    vars: &[&str],
    config_value: Option<&str>,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<ResolvedSecret> {
    resolve_secret(vars, config_value, lookup).ok_or_else(|| ConfigError::MissingField {
        field: field.to_string(),
        env_var: vars[0].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn config_with_github(toml: &str) -> StargazerConfig {
        StargazerConfig::from_toml(toml).unwrap()
    }

    #[test]
    fn test_prefixed_var_wins_over_legacy() {
        let resolved = resolve_secret(
            CLIENT_ID_VARS,
            Some("from-config"),
            env(&[("STARGAZER_CLIENT_ID", "new"), ("CLIENT_ID", "old")]),
        )
        .unwrap();
        assert_eq!(resolved.value, "new");
        assert_eq!(
            resolved.source,
            SecretSource::EnvVar("STARGAZER_CLIENT_ID".to_string())
        );
    }

    #[test]
    fn test_legacy_var_used() {
        let resolved = resolve_secret(CLIENT_ID_VARS, None, env(&[("CLIENT_ID", "old")])).unwrap();
        assert_eq!(resolved.value, "old");
    }

    #[test]
    fn test_empty_var_skipped() {
        let resolved = resolve_secret(
            CLIENT_ID_VARS,
            Some("from-config"),
            env(&[("STARGAZER_CLIENT_ID", "  ")]),
        )
        .unwrap();
        assert_eq!(resolved.value, "from-config");
        assert_eq!(resolved.source, SecretSource::ConfigFile);
    }

    #[test]
    fn test_nothing_found() {
        assert!(resolve_secret(CLIENT_ID_VARS, None, env(&[])).is_none());
    }

    #[test]
    fn test_resolve_credentials_mixed_sources() {
        let config = config_with_github(
            r#"
[github]
client_id = "cfg-id"
redirect_uri = "http://127.0.0.1:8000/callback"
"#,
        );
        let creds =
            resolve_credentials_with(&config, env(&[("CLIENT_SECRET", "shh")])).unwrap();
        assert_eq!(creds.client_id, "cfg-id");
        assert_eq!(creds.client_secret, "shh");
        assert_eq!(creds.redirect_uri, "http://127.0.0.1:8000/callback");
        assert!(!format!("{creds:?}").contains("shh"));
    }

    #[test]
    fn test_missing_secret_names_env_var() {
        let config = config_with_github("[github]\nclient_id = \"id\"\n");
        let err = resolve_credentials_with(&config, env(&[])).unwrap_err();
        match err {
            ConfigError::MissingField { field, env_var } => {
                assert_eq!(field, "client_secret");
                assert_eq!(env_var, "STARGAZER_CLIENT_SECRET");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_redirect_uri() {
        let err = resolve_credentials_with(
            &StargazerConfig::new(),
            env(&[
                ("CLIENT_ID", "id"),
                ("CLIENT_SECRET", "secret"),
                ("REDIRECT_URI", "localhost/callback"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_resolve_client_id_only() {
        let id = resolve_client_id_with(&StargazerConfig::new(), env(&[("CLIENT_ID", "id")])).unwrap();
        assert_eq!(id, "id");
        assert!(resolve_client_id_with(&StargazerConfig::new(), env(&[])).is_err());
    }
}
