//! GitHub Tools
//!
//! Six tools, each a pass-through to one GitHub REST call:
//! create_repository, create_branch, create_pull_request, merge_pull_request,
//! list_repositories and list_branches.
//!
//! Every handler catches its own failure and answers with an `isError` reply;
//! nothing is propagated to the transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::api::github::{
    CreatePullRequest, CreateRefRequest, CreateRepositoryRequest, GitHubApi,
    ListRepositoriesQuery, MergeMethod, MergePullRequest, PageQuery, RepoSort, RepoType,
    SortDirection, Visibility,
};
use crate::api::ApiError;
use crate::core::reply::ToolReply;
use crate::core::server::{MCPTool, Tool, ToolRegistry};

const DEFAULT_PER_PAGE: u32 = 30;
const MAX_PER_PAGE: u32 = 100;

/// Register all GitHub tools against one API client.
pub fn register(registry: &mut ToolRegistry, api: Arc<dyn GitHubApi>) {
    registry.register(CreateRepository { api: Arc::clone(&api) });
    registry.register(CreateBranch { api: Arc::clone(&api) });
    registry.register(CreatePullRequestTool { api: Arc::clone(&api) });
    registry.register(MergePullRequestTool { api: Arc::clone(&api) });
    registry.register(ListRepositories { api: Arc::clone(&api) });
    registry.register(ListBranches { api });
}

// =============================================================================
// Shared formatting
// =============================================================================

fn error_message(err: &ApiError) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        "An unknown error occurred.".to_string()
    } else {
        message
    }
}

/// `Details:` line for create tools, which always report one.
fn details_line(err: &ApiError) -> String {
    match err.details() {
        Some(details) => format!("\nDetails: {details}"),
        None => "\nDetails: No further details.".to_string(),
    }
}

/// `Details:` line only when the API sent sub-errors.
fn optional_details_line(err: &ApiError) -> String {
    err.details()
        .map(|details| format!("\nDetails: {details}"))
        .unwrap_or_default()
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn default_page() -> u32 {
    1
}

/// Clamp a requested page size to what GitHub accepts.
fn effective_per_page(requested: u32) -> u32 {
    if requested == 0 {
        DEFAULT_PER_PAGE
    } else {
        requested.min(MAX_PER_PAGE)
    }
}

/// Note appended when a page came back full.
///
/// GitHub's Link header is not consulted, so a full page only suggests more
/// results; an exact multiple of `per_page` yields one empty extra page.
fn more_results_note(returned: usize, per_page: u32, page: u32) -> Option<String> {
    (returned == per_page as usize).then(|| {
        format!(
            "\n\nNote: More results might be available on the next page (page {}).",
            u64::from(page) + 1
        )
    })
}

// =============================================================================
// create_repository
// =============================================================================

pub struct CreateRepository {
    api: Arc<dyn GitHubApi>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRepositoryParams {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
}

#[async_trait]
impl Tool for CreateRepository {
    type Params = CreateRepositoryParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "create_repository".to_string(),
            description: "Create a new GitHub repository for the authenticated user.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Required. The name of the repository."
                    },
                    "description": {
                        "type": "string",
                        "description": "A short description of the repository."
                    },
                    "private": {
                        "type": "boolean",
                        "default": false,
                        "description": "Whether the repository is private."
                    }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        }
    }

    async fn handle(&self, params: CreateRepositoryParams) -> ToolReply {
        info!(name = %params.name, "Attempting to create repository");
        let request = CreateRepositoryRequest {
            name: params.name.clone(),
            description: params.description,
            private: params.private,
        };

        match self.api.create_repository(&request).await {
            Ok(repo) => {
                info!(url = %repo.html_url, "Created repository");
                ToolReply::text(format!("Successfully created repository: {}", repo.html_url))
            }
            Err(err) => {
                error!(name = %params.name, error = %err, "Error creating repository");
                ToolReply::error(format!(
                    "Error creating repository '{}': {}{}",
                    params.name,
                    error_message(&err),
                    details_line(&err)
                ))
            }
        }
    }
}

// =============================================================================
// create_branch
// =============================================================================

pub struct CreateBranch {
    api: Arc<dyn GitHubApi>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBranchParams {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub sha: String,
}

#[async_trait]
impl Tool for CreateBranch {
    type Params = CreateBranchParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "create_branch".to_string(),
            description: "Create a new branch in a repository from a commit SHA.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {
                        "type": "string",
                        "description": "Required. The account owner of the repository (e.g., 'octocat')."
                    },
                    "repo": {
                        "type": "string",
                        "description": "Required. The name of the repository without the .git extension."
                    },
                    "branch": {
                        "type": "string",
                        "description": "Required. The name for the new branch."
                    },
                    "sha": {
                        "type": "string",
                        "description": "Required. The SHA1 value for the commit to base the new branch from."
                    }
                },
                "required": ["owner", "repo", "branch", "sha"],
                "additionalProperties": false
            }),
        }
    }

    async fn handle(&self, params: CreateBranchParams) -> ToolReply {
        let CreateBranchParams { owner, repo, branch, sha } = params;
        info!(%owner, %repo, %branch, %sha, "Attempting to create branch");

        let request = CreateRefRequest {
            ref_name: format!("refs/heads/{branch}"),
            sha,
        };

        match self.api.create_ref(&owner, &repo, &request).await {
            Ok(git_ref) => {
                info!(ref_name = %git_ref.ref_name, "Created branch");
                ToolReply::text(format!(
                    "Successfully created branch '{branch}' in repository {owner}/{repo}. Ref: {}",
                    git_ref.ref_name
                ))
            }
            Err(err) => {
                error!(%owner, %repo, %branch, error = %err, "Error creating branch");
                ToolReply::error(format!(
                    "Error creating branch '{branch}' in {owner}/{repo}: {}{}",
                    error_message(&err),
                    details_line(&err)
                ))
            }
        }
    }
}

// =============================================================================
// create_pull_request
// =============================================================================

pub struct CreatePullRequestTool {
    api: Arc<dyn GitHubApi>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePullRequestParams {
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub head: String,
    pub base: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[async_trait]
impl Tool for CreatePullRequestTool {
    type Params = CreatePullRequestParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "create_pull_request".to_string(),
            description: "Open a pull request from one branch into another.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {
                        "type": "string",
                        "description": "Required. The account owner of the repository."
                    },
                    "repo": {
                        "type": "string",
                        "description": "Required. The name of the repository."
                    },
                    "title": {
                        "type": "string",
                        "description": "Required. The title of the pull request."
                    },
                    "head": {
                        "type": "string",
                        "description": "Required. The name of the branch where your changes are implemented."
                    },
                    "base": {
                        "type": "string",
                        "description": "Required. The name of the branch you want the changes pulled into."
                    },
                    "body": {
                        "type": "string",
                        "description": "The contents of the pull request body (description)."
                    }
                },
                "required": ["owner", "repo", "title", "head", "base"],
                "additionalProperties": false
            }),
        }
    }

    async fn handle(&self, params: CreatePullRequestParams) -> ToolReply {
        let CreatePullRequestParams { owner, repo, title, head, base, body } = params;
        info!(%owner, %repo, %title, %head, %base, "Attempting to create pull request");

        let request = CreatePullRequest { title, head, base, body };

        match self.api.create_pull_request(&owner, &repo, &request).await {
            Ok(pr) => {
                info!(url = %pr.html_url, number = pr.number, "Created pull request");
                ToolReply::text(format!("Successfully created pull request: {}", pr.html_url))
            }
            Err(err) => {
                error!(%owner, %repo, error = %err, "Error creating pull request");
                ToolReply::error(format!(
                    "Error creating pull request in {owner}/{repo}: {}{}",
                    error_message(&err),
                    details_line(&err)
                ))
            }
        }
    }
}

// =============================================================================
// merge_pull_request
// =============================================================================

pub struct MergePullRequestTool {
    api: Arc<dyn GitHubApi>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergePullRequestParams {
    pub owner: String,
    pub repo: String,
    pub pull_number: u64,
    #[serde(default)]
    pub commit_title: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub merge_method: Option<MergeMethod>,
}

/// Extra guidance for merge failures GitHub signals by status code.
fn merge_hint(status: Option<u16>) -> &'static str {
    match status {
        Some(405) => {
            " (Hint: The PR might not be mergeable yet. Check for conflicts or required checks.)"
        }
        Some(409) => " (Hint: A conflict occurred during the merge attempt.)",
        _ => "",
    }
}

#[async_trait]
impl Tool for MergePullRequestTool {
    type Params = MergePullRequestParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "merge_pull_request".to_string(),
            description: "Merge an open pull request.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {
                        "type": "string",
                        "description": "Required. The account owner of the repository."
                    },
                    "repo": {
                        "type": "string",
                        "description": "Required. The name of the repository."
                    },
                    "pull_number": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Required. The number that identifies the pull request."
                    },
                    "commit_title": {
                        "type": "string",
                        "description": "Title for the automatic commit message."
                    },
                    "commit_message": {
                        "type": "string",
                        "description": "Extra detail to append to automatic commit message."
                    },
                    "merge_method": {
                        "type": "string",
                        "enum": ["merge", "squash", "rebase"],
                        "description": "Merge method to use. Default: 'merge'"
                    }
                },
                "required": ["owner", "repo", "pull_number"],
                "additionalProperties": false
            }),
        }
    }

    async fn handle(&self, params: MergePullRequestParams) -> ToolReply {
        let MergePullRequestParams {
            owner,
            repo,
            pull_number,
            commit_title,
            commit_message,
            merge_method,
        } = params;
        info!(%owner, %repo, pull_number, "Attempting to merge pull request");

        let request = MergePullRequest {
            commit_title,
            commit_message,
            merge_method: merge_method.unwrap_or_default(),
        };

        match self
            .api
            .merge_pull_request(&owner, &repo, pull_number, &request)
            .await
        {
            Ok(result) if result.merged => {
                info!(pull_number, message = %result.message, "Merged pull request");
                ToolReply::text(format!(
                    "Successfully merged pull request #{pull_number}. Message: {}",
                    result.message
                ))
            }
            Ok(result) => {
                error!(pull_number, message = %result.message, "Pull request was not merged");
                ToolReply::error(format!(
                    "Failed to merge pull request #{pull_number}. Message: {}",
                    result.message
                ))
            }
            Err(err) => {
                error!(%owner, %repo, pull_number, error = %err, "Error merging pull request");
                ToolReply::error(format!(
                    "Error merging pull request #{pull_number} in {owner}/{repo}: {}{}{}",
                    error_message(&err),
                    merge_hint(err.status()),
                    optional_details_line(&err)
                ))
            }
        }
    }
}

// =============================================================================
// list_repositories
// =============================================================================

pub struct ListRepositories {
    api: Arc<dyn GitHubApi>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListRepositoriesParams {
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default, rename = "type")]
    pub repo_type: Option<RepoType>,
    #[serde(default)]
    pub sort: RepoSort,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

#[async_trait]
impl Tool for ListRepositories {
    type Params = ListRepositoriesParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "list_repositories".to_string(),
            description: "List repositories the authenticated user can access. A full page \
                          only suggests that more results exist."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "visibility": {
                        "type": "string",
                        "enum": ["all", "public", "private"],
                        "default": "all",
                        "description": "Limit results by repository visibility."
                    },
                    "affiliation": {
                        "type": "string",
                        "default": "owner,collaborator,organization_member",
                        "description": "Comma-separated list of affiliations (e.g., owner,collaborator,organization_member)."
                    },
                    "type": {
                        "type": "string",
                        "enum": ["all", "owner", "public", "private", "member"],
                        "default": "all",
                        "description": "Limit results by repository type. Cannot be combined with visibility or affiliation."
                    },
                    "sort": {
                        "type": "string",
                        "enum": ["created", "updated", "pushed", "full_name"],
                        "default": "pushed",
                        "description": "The property to sort the results by."
                    },
                    "direction": {
                        "type": "string",
                        "enum": ["asc", "desc"],
                        "default": "desc",
                        "description": "The order to sort by."
                    },
                    "per_page": {
                        "type": "integer",
                        "default": DEFAULT_PER_PAGE,
                        "maximum": MAX_PER_PAGE,
                        "description": "The number of results per page (max 100)."
                    },
                    "page": {
                        "type": "integer",
                        "default": 1,
                        "description": "Page number of the results to fetch."
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    async fn handle(&self, params: ListRepositoriesParams) -> ToolReply {
        let per_page = effective_per_page(params.per_page);
        let page = params.page;
        info!(?params, "Attempting to list repositories");

        let query = ListRepositoriesQuery {
            visibility: params.visibility,
            affiliation: params.affiliation,
            repo_type: params.repo_type,
            sort: params.sort,
            direction: params.direction,
            per_page,
            page,
        };

        match self.api.list_repositories(&query).await {
            Ok(repos) => {
                info!(count = repos.len(), "Listed repositories");
                let names: Vec<&str> = repos.iter().map(|r| r.full_name.as_str()).collect();
                let mut text = format!("Found {} repositories:\n{}", names.len(), names.join("\n"));
                if let Some(note) = more_results_note(repos.len(), per_page, page) {
                    text.push_str(&note);
                }
                ToolReply::text(text)
            }
            Err(err) => {
                error!(error = %err, "Error listing repositories");
                ToolReply::error(format!(
                    "Error listing repositories: {}{}",
                    error_message(&err),
                    optional_details_line(&err)
                ))
            }
        }
    }
}

// =============================================================================
// list_branches
// =============================================================================

pub struct ListBranches {
    api: Arc<dyn GitHubApi>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListBranchesParams {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

#[async_trait]
impl Tool for ListBranches {
    type Params = ListBranchesParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "list_branches".to_string(),
            description: "List branches in a repository. A full page only suggests that more \
                          results exist."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "owner": {
                        "type": "string",
                        "description": "Required. The account owner of the repository."
                    },
                    "repo": {
                        "type": "string",
                        "description": "Required. The name of the repository."
                    },
                    "per_page": {
                        "type": "integer",
                        "default": DEFAULT_PER_PAGE,
                        "maximum": MAX_PER_PAGE,
                        "description": "The number of results per page (max 100)."
                    },
                    "page": {
                        "type": "integer",
                        "default": 1,
                        "description": "Page number of the results to fetch."
                    }
                },
                "required": ["owner", "repo"],
                "additionalProperties": false
            }),
        }
    }

    async fn handle(&self, params: ListBranchesParams) -> ToolReply {
        let ListBranchesParams { owner, repo, per_page, page } = params;
        let per_page = effective_per_page(per_page);
        info!(%owner, %repo, page, "Attempting to list branches");

        match self
            .api
            .list_branches(&owner, &repo, &PageQuery { per_page, page })
            .await
        {
            Ok(branches) => {
                info!(%owner, %repo, count = branches.len(), "Listed branches");
                let names: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
                let mut text = format!(
                    "Found {} branches in {owner}/{repo}:\n{}",
                    names.len(),
                    names.join("\n")
                );
                if let Some(note) = more_results_note(branches.len(), per_page, page) {
                    text.push_str(&note);
                }
                ToolReply::text(text)
            }
            Err(err) => {
                error!(%owner, %repo, error = %err, "Error listing branches");
                ToolReply::error(format!(
                    "Error listing branches for {owner}/{repo}: {}{}",
                    error_message(&err),
                    optional_details_line(&err)
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::github::{Branch, GitRef, MergeResult, PullRequest, Repository};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Canned GitHub: every call either succeeds with fixed data or fails
    /// with the configured error. Records the last request it saw.
    #[derive(Default)]
    struct FakeGitHub {
        fail_with: Option<ApiError>,
        merged: bool,
        repo_count: usize,
        branch_count: usize,
        last_call: Mutex<Option<Value>>,
    }

    impl FakeGitHub {
        fn ok() -> Self {
            Self {
                merged: true,
                ..Self::default()
            }
        }

        fn failing(err: ApiError) -> Self {
            Self {
                fail_with: Some(err),
                ..Self::default()
            }
        }

        fn check(&self, call: Value) -> Result<(), ApiError> {
            *self.last_call.lock().unwrap() = Some(call);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn last_call(&self) -> Value {
            self.last_call.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl GitHubApi for FakeGitHub {
        async fn create_repository(
            &self,
            request: &CreateRepositoryRequest,
        ) -> Result<Repository, ApiError> {
            self.check(serde_json::to_value(request).unwrap())?;
            Ok(Repository {
                full_name: format!("octocat/{}", request.name),
                html_url: format!("https://github.com/octocat/{}", request.name),
            })
        }

        async fn create_ref(
            &self,
            owner: &str,
            repo: &str,
            request: &CreateRefRequest,
        ) -> Result<GitRef, ApiError> {
            self.check(json!({ "owner": owner, "repo": repo, "body": request }))?;
            Ok(GitRef {
                ref_name: request.ref_name.clone(),
            })
        }

        async fn create_pull_request(
            &self,
            owner: &str,
            repo: &str,
            request: &CreatePullRequest,
        ) -> Result<PullRequest, ApiError> {
            self.check(json!({ "owner": owner, "repo": repo, "body": request }))?;
            Ok(PullRequest {
                number: 42,
                html_url: format!("https://github.com/{owner}/{repo}/pull/42"),
            })
        }

        async fn merge_pull_request(
            &self,
            owner: &str,
            repo: &str,
            pull_number: u64,
            request: &MergePullRequest,
        ) -> Result<MergeResult, ApiError> {
            self.check(json!({ "owner": owner, "repo": repo, "number": pull_number, "body": request }))?;
            Ok(MergeResult {
                merged: self.merged,
                message: if self.merged {
                    "Pull Request successfully merged".to_string()
                } else {
                    "Head branch was modified".to_string()
                },
                sha: Some("6dcb09b".to_string()),
            })
        }

        async fn list_repositories(
            &self,
            query: &ListRepositoriesQuery,
        ) -> Result<Vec<Repository>, ApiError> {
            self.check(serde_json::to_value(query).unwrap())?;
            Ok((0..self.repo_count)
                .map(|i| Repository {
                    full_name: format!("octocat/repo-{i}"),
                    html_url: format!("https://github.com/octocat/repo-{i}"),
                })
                .collect())
        }

        async fn list_branches(
            &self,
            owner: &str,
            repo: &str,
            query: &PageQuery,
        ) -> Result<Vec<Branch>, ApiError> {
            self.check(json!({ "owner": owner, "repo": repo, "query": query }))?;
            Ok((0..self.branch_count)
                .map(|i| Branch {
                    name: format!("branch-{i}"),
                })
                .collect())
        }
    }

    fn validation_failed() -> ApiError {
        ApiError::RemoteRejected {
            status: 422,
            message: "Validation Failed".to_string(),
            details: Some(json!([{ "resource": "Repository", "field": "name", "code": "already_exists" }])),
        }
    }

    fn not_found() -> ApiError {
        ApiError::RemoteRejected {
            status: 404,
            message: "Not Found".to_string(),
            details: None,
        }
    }

    async fn run<T: Tool>(tool: &T, args: Value) -> ToolReply {
        let params = tool.validate(args).expect("arguments should validate");
        tool.handle(params).await
    }

    #[tokio::test]
    async fn test_create_repository_success() {
        let api = Arc::new(FakeGitHub::ok());
        let tool = CreateRepository { api: api.clone() };

        let reply = run(&tool, json!({ "name": "hello-world", "private": true })).await;

        assert!(!reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Successfully created repository: https://github.com/octocat/hello-world"
        );
        assert_eq!(api.last_call(), json!({ "name": "hello-world", "private": true }));
    }

    #[tokio::test]
    async fn test_create_repository_failure_includes_details() {
        let tool = CreateRepository {
            api: Arc::new(FakeGitHub::failing(validation_failed())),
        };

        let reply = run(&tool, json!({ "name": "hello-world" })).await;

        assert!(reply.is_error);
        let text = reply.text_content();
        assert!(text.starts_with("Error creating repository 'hello-world': Validation Failed"));
        assert!(text.contains("already_exists"));
    }

    #[tokio::test]
    async fn test_create_repository_failure_without_details() {
        let tool = CreateRepository {
            api: Arc::new(FakeGitHub::failing(ApiError::Network("connection refused".into()))),
        };

        let reply = run(&tool, json!({ "name": "x" })).await;

        assert!(reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Error creating repository 'x': connection refused\nDetails: No further details."
        );
    }

    #[test]
    fn test_create_repository_rejects_unknown_fields() {
        let tool = CreateRepository {
            api: Arc::new(FakeGitHub::ok()),
        };
        assert!(tool.validate(json!({ "name": "x", "auto_init": true })).is_err());
        assert!(tool.validate(json!({ "description": "no name" })).is_err());
    }

    #[tokio::test]
    async fn test_create_branch_success_uses_heads_ref() {
        let api = Arc::new(FakeGitHub::ok());
        let tool = CreateBranch { api: api.clone() };

        let reply = run(
            &tool,
            json!({ "owner": "octocat", "repo": "hello", "branch": "feature", "sha": "abc123" }),
        )
        .await;

        assert!(!reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Successfully created branch 'feature' in repository octocat/hello. Ref: refs/heads/feature"
        );
        assert_eq!(api.last_call()["body"]["ref"], "refs/heads/feature");
        assert_eq!(api.last_call()["body"]["sha"], "abc123");
    }

    #[tokio::test]
    async fn test_create_branch_failure() {
        let err = ApiError::RemoteRejected {
            status: 422,
            message: "Reference already exists".to_string(),
            details: Some(json!(["ref exists"])),
        };
        let tool = CreateBranch {
            api: Arc::new(FakeGitHub::failing(err)),
        };

        let reply = run(
            &tool,
            json!({ "owner": "octocat", "repo": "hello", "branch": "main", "sha": "abc" }),
        )
        .await;

        assert!(reply.is_error);
        let text = reply.text_content();
        assert!(text.contains("Error creating branch 'main' in octocat/hello: Reference already exists"));
        assert!(text.contains("ref exists"));
    }

    #[tokio::test]
    async fn test_create_pull_request_success() {
        let api = Arc::new(FakeGitHub::ok());
        let tool = CreatePullRequestTool { api: api.clone() };

        let reply = run(
            &tool,
            json!({
                "owner": "octocat", "repo": "hello", "title": "Add feature",
                "head": "feature", "base": "main"
            }),
        )
        .await;

        assert!(!reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Successfully created pull request: https://github.com/octocat/hello/pull/42"
        );
        assert!(api.last_call()["body"].get("body").is_none());
    }

    #[tokio::test]
    async fn test_create_pull_request_failure() {
        let err = ApiError::RemoteRejected {
            status: 422,
            message: "Validation Failed".to_string(),
            details: Some(json!([{ "message": "No commits between main and feature" }])),
        };
        let tool = CreatePullRequestTool {
            api: Arc::new(FakeGitHub::failing(err)),
        };

        let reply = run(
            &tool,
            json!({
                "owner": "octocat", "repo": "hello", "title": "t",
                "head": "feature", "base": "main", "body": "desc"
            }),
        )
        .await;

        assert!(reply.is_error);
        let text = reply.text_content();
        assert!(text.contains("Error creating pull request in octocat/hello: Validation Failed"));
        assert!(text.contains("No commits between main and feature"));
    }

    #[tokio::test]
    async fn test_merge_defaults_to_merge_method() {
        let api = Arc::new(FakeGitHub::ok());
        let tool = MergePullRequestTool { api: api.clone() };

        let reply = run(&tool, json!({ "owner": "o", "repo": "r", "pull_number": 7 })).await;

        assert!(!reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Successfully merged pull request #7. Message: Pull Request successfully merged"
        );
        assert_eq!(api.last_call()["body"]["merge_method"], "merge");
    }

    #[tokio::test]
    async fn test_merge_not_merged_is_error() {
        let tool = MergePullRequestTool {
            api: Arc::new(FakeGitHub::default()),
        };

        let reply = run(
            &tool,
            json!({ "owner": "o", "repo": "r", "pull_number": 7, "merge_method": "squash" }),
        )
        .await;

        assert!(reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Failed to merge pull request #7. Message: Head branch was modified"
        );
    }

    #[tokio::test]
    async fn test_merge_405_adds_mergeability_hint() {
        let err = ApiError::RemoteRejected {
            status: 405,
            message: "Pull Request is not mergeable".to_string(),
            details: None,
        };
        let tool = MergePullRequestTool {
            api: Arc::new(FakeGitHub::failing(err)),
        };

        let reply = run(&tool, json!({ "owner": "o", "repo": "r", "pull_number": 3 })).await;

        assert!(reply.is_error);
        let text = reply.text_content();
        assert!(text.contains("Pull Request is not mergeable"));
        assert!(text.contains("might not be mergeable yet"));
    }

    #[tokio::test]
    async fn test_merge_409_adds_conflict_hint() {
        let err = ApiError::RemoteRejected {
            status: 409,
            message: "Head branch was modified. Review and try the merge again.".to_string(),
            details: Some(json!(["sha mismatch"])),
        };
        let tool = MergePullRequestTool {
            api: Arc::new(FakeGitHub::failing(err)),
        };

        let reply = run(&tool, json!({ "owner": "o", "repo": "r", "pull_number": 3 })).await;

        assert!(reply.is_error);
        let text = reply.text_content();
        assert!(text.contains("(Hint: A conflict occurred during the merge attempt.)"));
        assert!(text.contains("sha mismatch"));
    }

    #[test]
    fn test_merge_rejects_unknown_method() {
        let tool = MergePullRequestTool {
            api: Arc::new(FakeGitHub::ok()),
        };
        let result = tool.validate(json!({
            "owner": "o", "repo": "r", "pull_number": 3, "merge_method": "octopus"
        }));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_repositories_full_page_adds_note() {
        let api = Arc::new(FakeGitHub {
            repo_count: 30,
            ..FakeGitHub::ok()
        });
        let tool = ListRepositories { api: api.clone() };

        let reply = run(&tool, json!({ "per_page": 30 })).await;

        assert!(!reply.is_error);
        let text = reply.text_content();
        assert!(text.starts_with("Found 30 repositories:\noctocat/repo-0\n"));
        assert!(text.ends_with(
            "\n\nNote: More results might be available on the next page (page 2)."
        ));
        let query = api.last_call();
        assert_eq!(query["sort"], "pushed");
        assert_eq!(query["direction"], "desc");
        assert_eq!(query["page"], 1);
        assert!(query.get("type").is_none());
    }

    #[tokio::test]
    async fn test_list_repositories_partial_page_has_no_note() {
        let tool = ListRepositories {
            api: Arc::new(FakeGitHub {
                repo_count: 29,
                ..FakeGitHub::ok()
            }),
        };

        let reply = run(&tool, json!({ "per_page": 30 })).await;

        assert!(!reply.is_error);
        assert!(reply.text_content().starts_with("Found 29 repositories:"));
        assert!(!reply.text_content().contains("More results"));
    }

    #[tokio::test]
    async fn test_list_repositories_clamps_per_page() {
        let api = Arc::new(FakeGitHub {
            repo_count: 100,
            ..FakeGitHub::ok()
        });
        let tool = ListRepositories { api: api.clone() };

        let reply = run(&tool, json!({ "per_page": 250, "page": 4 })).await;

        assert_eq!(api.last_call()["per_page"], 100);
        assert!(reply.text_content().contains("(page 5)"));
    }

    #[tokio::test]
    async fn test_list_repositories_failure() {
        let err = ApiError::RemoteRejected {
            status: 401,
            message: "Bad credentials".to_string(),
            details: None,
        };
        let tool = ListRepositories {
            api: Arc::new(FakeGitHub::failing(err)),
        };

        let reply = run(&tool, json!({})).await;

        assert!(reply.is_error);
        assert_eq!(reply.text_content(), "Error listing repositories: Bad credentials");
    }

    #[tokio::test]
    async fn test_list_repositories_failure_with_details() {
        let tool = ListRepositories {
            api: Arc::new(FakeGitHub::failing(validation_failed())),
        };

        let reply = run(&tool, json!({ "type": "owner", "visibility": "public" })).await;

        assert!(reply.is_error);
        let text = reply.text_content();
        assert!(text.contains("Validation Failed"));
        assert!(text.contains("already_exists"));
    }

    #[tokio::test]
    async fn test_list_branches_full_page_adds_note() {
        let api = Arc::new(FakeGitHub {
            branch_count: 30,
            ..FakeGitHub::ok()
        });
        let tool = ListBranches { api: api.clone() };

        let reply = run(&tool, json!({ "owner": "octocat", "repo": "hello" })).await;

        assert!(!reply.is_error);
        let text = reply.text_content();
        assert!(text.starts_with("Found 30 branches in octocat/hello:\nbranch-0\n"));
        assert!(text.contains("(page 2)"));
        assert_eq!(api.last_call()["query"], json!({ "per_page": 30, "page": 1 }));
    }

    #[tokio::test]
    async fn test_list_branches_note_on_last_representable_page() {
        let tool = ListBranches {
            api: Arc::new(FakeGitHub {
                branch_count: 1,
                ..FakeGitHub::ok()
            }),
        };

        let reply = run(
            &tool,
            json!({ "owner": "octocat", "repo": "hello", "per_page": 1, "page": 4294967295u64 }),
        )
        .await;

        assert!(!reply.is_error);
        assert!(reply.text_content().ends_with("(page 4294967296)."));
    }

    #[tokio::test]
    async fn test_list_branches_partial_page_has_no_note() {
        let tool = ListBranches {
            api: Arc::new(FakeGitHub {
                branch_count: 29,
                ..FakeGitHub::ok()
            }),
        };

        let reply = run(
            &tool,
            json!({ "owner": "octocat", "repo": "hello", "per_page": 30 }),
        )
        .await;

        assert!(!reply.text_content().contains("More results"));
    }

    #[tokio::test]
    async fn test_list_branches_failure() {
        let tool = ListBranches {
            api: Arc::new(FakeGitHub::failing(not_found())),
        };

        let reply = run(&tool, json!({ "owner": "octocat", "repo": "missing" })).await;

        assert!(reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Error listing branches for octocat/missing: Not Found"
        );
    }

    #[test]
    fn test_register_adds_all_six_tools() {
        let mut registry = ToolRegistry::new();
        register(&mut registry, Arc::new(FakeGitHub::ok()));

        let names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "create_repository",
                "create_branch",
                "create_pull_request",
                "merge_pull_request",
                "list_repositories",
                "list_branches"
            ]
        );
    }

    #[test]
    fn test_effective_per_page() {
        assert_eq!(effective_per_page(0), 30);
        assert_eq!(effective_per_page(50), 50);
        assert_eq!(effective_per_page(101), 100);
    }
}
