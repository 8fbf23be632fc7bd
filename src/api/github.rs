//! GitHub REST API client
//!
//! Covers the six endpoints the GitHub tools need:
//! - create a repository for the authenticated user
//! - create a git ref (branch)
//! - create and merge pull requests
//! - list repositories and branches

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use super::ApiError;
use crate::core::utils::{env_lookup, parse_or, ConfigError};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the GitHub client.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// REST API base URL (e.g., https://api.github.com)
    pub api_url: String,

    /// Personal access token, sent as a bearer token
    pub token: SecretString,

    /// User-Agent header; GitHub rejects requests without one
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl GitHubConfig {
    /// Load from the process environment. `GITHUB_TOKEN` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("GITHUB_TOKEN").ok_or(ConfigError::MissingRequired("GITHUB_TOKEN"))?;

        Ok(Self {
            api_url: lookup("GITHUB_API_URL")
                .unwrap_or_else(|| "https://api.github.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: SecretString::new(token),
            user_agent: lookup("GITHUB_USER_AGENT")
                .unwrap_or_else(|| format!("github-mcp/{}", env!("CARGO_PKG_VERSION"))),
            timeout_seconds: parse_or(&lookup, "GITHUB_TIMEOUT_SECS", 30)?,
        })
    }
}

// =============================================================================
// API Types
// =============================================================================

/// Repository visibility filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    All,
    Public,
    Private,
}

/// Repository type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    All,
    Owner,
    Public,
    Private,
    Member,
}

/// Property to sort repositories by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoSort {
    Created,
    Updated,
    #[default]
    Pushed,
    FullName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// How a pull request is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRepositoryRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub private: bool,
}

/// Repository as returned by create and list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRefRequest {
    /// Fully qualified ref, e.g. `refs/heads/feature`
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergePullRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    pub merge_method: MergeMethod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeResult {
    pub merged: bool,
    pub message: String,
    #[serde(default)]
    pub sha: Option<String>,
}

/// Query for `GET /user/repos`. Filters left as `None` are not sent.
#[derive(Debug, Clone, Serialize)]
pub struct ListRepositoriesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub repo_type: Option<RepoType>,
    pub sort: RepoSort,
    pub direction: SortDirection,
    pub per_page: u32,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageQuery {
    pub per_page: u32,
    pub page: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub name: String,
}

// =============================================================================
// API Trait
// =============================================================================

/// Operations the GitHub tools perform.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn create_repository(
        &self,
        request: &CreateRepositoryRequest,
    ) -> Result<Repository, ApiError>;

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        request: &CreateRefRequest,
    ) -> Result<GitRef, ApiError>;

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &CreatePullRequest,
    ) -> Result<PullRequest, ApiError>;

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pull_number: u64,
        request: &MergePullRequest,
    ) -> Result<MergeResult, ApiError>;

    async fn list_repositories(
        &self,
        query: &ListRepositoriesQuery,
    ) -> Result<Vec<Repository>, ApiError>;

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
        query: &PageQuery,
    ) -> Result<Vec<Branch>, ApiError>;
}

// =============================================================================
// HTTP Client
// =============================================================================

/// reqwest-backed GitHub client.
pub struct GitHubClient {
    client: Client,
    api_url: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, ConfigError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.expose_secret()))
            .map_err(|_| ConfigError::Invalid {
                key: "GITHUB_TOKEN",
                value: "<redacted>".to_string(),
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

/// `/repos/{owner}/{repo}{rest}` with owner and repo escaped as single path
/// segments.
fn repo_path(owner: &str, repo: &str, rest: &str) -> String {
    format!(
        "/repos/{}/{}{rest}",
        urlencoding::encode(owner),
        urlencoding::encode(repo)
    )
}

impl GitHubClient {
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = rejection_from_body(status.as_u16(), status.canonical_reason(), &body);
            error!(status = status.as_u16(), message = %err, "GitHub API error");
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Build a `RemoteRejected` error from a GitHub error body.
///
/// GitHub error bodies look like `{"message": "...", "errors": [...]}`. When
/// the body isn't JSON the HTTP reason phrase is used instead.
pub fn rejection_from_body(status: u16, reason: Option<&str>, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .or_else(|| reason.map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"));

    let details = parsed
        .as_ref()
        .and_then(|v| v.get("errors"))
        .filter(|e| !e.is_null())
        .cloned();

    ApiError::RemoteRejected {
        status,
        message,
        details,
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn create_repository(
        &self,
        request: &CreateRepositoryRequest,
    ) -> Result<Repository, ApiError> {
        let url = self.url("/user/repos");
        debug!(url = %url, name = %request.name, "Creating repository");
        self.send(self.client.post(&url).json(request)).await
    }

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        request: &CreateRefRequest,
    ) -> Result<GitRef, ApiError> {
        let url = self.url(&repo_path(owner, repo, "/git/refs"));
        debug!(url = %url, ref_name = %request.ref_name, "Creating ref");
        self.send(self.client.post(&url).json(request)).await
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &CreatePullRequest,
    ) -> Result<PullRequest, ApiError> {
        let url = self.url(&repo_path(owner, repo, "/pulls"));
        debug!(url = %url, head = %request.head, base = %request.base, "Creating pull request");
        self.send(self.client.post(&url).json(request)).await
    }

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pull_number: u64,
        request: &MergePullRequest,
    ) -> Result<MergeResult, ApiError> {
        let url = self.url(&repo_path(owner, repo, &format!("/pulls/{pull_number}/merge")));
        debug!(url = %url, method = ?request.merge_method, "Merging pull request");
        self.send(self.client.put(&url).json(request)).await
    }

    async fn list_repositories(
        &self,
        query: &ListRepositoriesQuery,
    ) -> Result<Vec<Repository>, ApiError> {
        let url = self.url("/user/repos");
        debug!(url = %url, page = query.page, per_page = query.per_page, "Listing repositories");
        self.send(self.client.get(&url).query(query)).await
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
        query: &PageQuery,
    ) -> Result<Vec<Branch>, ApiError> {
        let url = self.url(&repo_path(owner, repo, "/branches"));
        debug!(url = %url, page = query.page, per_page = query.per_page, "Listing branches");
        self.send(self.client.get(&url).query(query)).await
    }
}
