//! Starred repositories proxy.
//!
//! Fetches one page of `GET /user/starred` with the resolved bearer token
//! and reshapes it: private repositories are dropped and each entry is
//! trimmed to name, description, url, license and topics.

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stargazer_oauth::{OAuthConfig, OAuthError};

const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// GitHub caps `per_page` at 100.
pub const MAX_PER_PAGE: u32 = 100;

fn default_sort() -> String {
    "created".to_string()
}

fn default_direction() -> String {
    "desc".to_string()
}

fn default_per_page() -> u32 {
    30
}

fn default_page() -> u32 {
    1
}

/// Paging and ordering of the starred list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarredQuery {
    /// `created` (when starred) or `updated` (last push).
    #[serde(default = "default_sort")]
    pub sort: String,
    /// `asc` or `desc`.
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

impl Default for StarredQuery {
    fn default() -> Self {
        Self {
            sort: default_sort(),
            direction: default_direction(),
            per_page: default_per_page(),
            page: default_page(),
        }
    }
}

impl StarredQuery {
    /// Reject values the provider would refuse or silently reinterpret.
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.sort.as_str(), "created" | "updated") {
            return Err(format!(
                "sort must be 'created' or 'updated', got '{}'",
                self.sort
            ));
        }
        if !matches!(self.direction.as_str(), "asc" | "desc") {
            return Err(format!(
                "direction must be 'asc' or 'desc', got '{}'",
                self.direction
            ));
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(format!("per_page must be between 1 and {MAX_PER_PAGE}"));
        }
        if self.page == 0 {
            return Err("page must be at least 1".to_string());
        }
        Ok(())
    }
}

/// A starred repository as returned by the provider (fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct StarredRepo {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub private: bool,
    /// License object, passed through as-is.
    pub license: Option<Value>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Projected repository entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<Value>,
    pub topics: Vec<String>,
}

/// Response of `GET /starred`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarredResponse {
    /// Size of the raw page, private repositories included.
    pub n_starred_repos: usize,
    pub list_of_starred_repos: Vec<RepoSummary>,
}

impl StarredResponse {
    pub fn from_page(repos: Vec<StarredRepo>) -> Self {
        Self {
            n_starred_repos: repos.len(),
            list_of_starred_repos: format_repo_list(repos),
        }
    }
}

/// Keep public repositories and project them onto [`RepoSummary`].
pub fn format_repo_list(repos: Vec<StarredRepo>) -> Vec<RepoSummary> {
    repos
        .into_iter()
        .filter(|r| !r.private)
        .map(|r| RepoSummary {
            name: r.name,
            description: r.description,
            url: r.url,
            license: r.license.filter(|l| !l.is_null()),
            topics: r.topics,
        })
        .collect()
}

/// Client for the provider's REST API.
#[derive(Debug, Clone)]
pub struct StarredClient {
    client: reqwest::Client,
    api_base_url: String,
}

impl StarredClient {
    pub fn new(config: &OAuthConfig) -> stargazer_oauth::Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one page of the authenticated user's starred repositories.
    pub async fn fetch_starred(
        &self,
        token: &str,
        query: &StarredQuery,
    ) -> stargazer_oauth::Result<Vec<StarredRepo>> {
        let url = format!("{}/user/starred", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, GITHUB_JSON)
            .header(API_VERSION_HEADER, API_VERSION)
            .query(&[
                ("sort", query.sort.as_str()),
                ("direction", query.direction.as_str()),
            ])
            .query(&[("per_page", query.per_page), ("page", query.page)])
            .send()
            .await
            .map_err(|e| {
                OAuthError::UpstreamUnavailable(format!("Starred request failed: {e}"))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(%status, "Provider rejected bearer token");
            return Err(OAuthError::Unauthorized(format!(
                "Provider rejected the access token ({status})"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::UpstreamUnavailable(format!(
                "Starred request failed ({status}): {text}"
            )));
        }

        let repos: Vec<StarredRepo> = response.json().await.map_err(|e| {
            OAuthError::UpstreamUnavailable(format!("Failed to parse starred repositories: {e}"))
        })?;
        tracing::debug!(count = repos.len(), page = query.page, "Fetched starred page");
        Ok(repos)
    }
}
