//! GitHub MCP Server Entry Point
//!
//! Exposes repository, branch and pull-request operations as MCP tools.
//! Logs go to stderr so stdout stays reserved for JSON-RPC.
//!
//! Environment Variables:
//! - GITHUB_TOKEN: Personal access token (required; startup fails without it)
//! - GITHUB_API_URL: REST API base (default: "https://api.github.com")
//! - GITHUB_USER_AGENT: User-Agent header (default: "github-mcp/<version>")
//! - GITHUB_TIMEOUT_SECS: Request timeout (default: 30)
//! - plus the transport variables described in `core::utils`

use std::process::ExitCode;
use std::sync::Arc;

use mcp_api_servers::api::github::{GitHubClient, GitHubConfig};
use mcp_api_servers::core::server::{self, ToolRegistry};
use mcp_api_servers::core::utils::{self, ConfigError, ServerConfig};
use mcp_api_servers::tools;
use tracing::{error, info};

fn startup() -> Result<(ServerConfig, ToolRegistry), ConfigError> {
    let config = ServerConfig::from_env("GitHub Actions")?;
    let github = GitHubConfig::from_env()?;
    let client = GitHubClient::new(&github)?;

    info!(api_url = %github.api_url, "GitHub client ready");
    Ok((config, tools::initialize_github_tools(Arc::new(client))))
}

#[tokio::main]
async fn main() -> ExitCode {
    utils::load_dotenv();
    utils::init_stderr_logging();

    let (config, registry) = match startup() {
        Ok(ready) => ready,
        Err(e) => {
            error!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server::run(config, registry).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to run GitHub MCP server");
            ExitCode::FAILURE
        }
    }
}
