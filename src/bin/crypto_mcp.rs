//! Crypto Price MCP Server Entry Point
//!
//! Exposes CoinGecko price lookups as MCP tools. Diagnostics are written to a
//! log file that is cleared on every start.
//!
//! Environment Variables:
//! - CRYPTO_MCP_LOG_FILE: Debug log path (default: "./crypto-mcp-debug.log")
//! - COINGECKO_API_URL: API base (default: "https://api.coingecko.com/api/v3")
//! - COINGECKO_TIMEOUT_SECS: Request timeout (default: 30)
//! - plus the transport variables described in `core::utils`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use mcp_api_servers::api::coingecko::{CoinGeckoClient, CoinGeckoConfig};
use mcp_api_servers::core::server::{self, ToolRegistry};
use mcp_api_servers::core::utils::{self, ConfigError, ServerConfig};
use mcp_api_servers::tools;
use mcp_api_servers::tools::crypto::{AliasTable, CryptoPriceService};
use tracing::{error, info, warn};

fn startup() -> Result<(ServerConfig, ToolRegistry), ConfigError> {
    let config = ServerConfig::from_env("CryptoPrice")?;
    let coingecko = CoinGeckoConfig::from_env()?;
    let client = CoinGeckoClient::new(&coingecko)?;

    let aliases = Arc::new(AliasTable::builtin());
    info!(api_url = %coingecko.api_url, aliases = aliases.len(), "CoinGecko client ready");

    let service = CryptoPriceService::new(Arc::new(client), aliases);
    Ok((config, tools::initialize_crypto_tools(Arc::new(service))))
}

#[tokio::main]
async fn main() -> ExitCode {
    utils::load_dotenv();

    let log_path = PathBuf::from(utils::get_env_var(
        "CRYPTO_MCP_LOG_FILE",
        "./crypto-mcp-debug.log",
    ));
    if let Err(e) = utils::init_file_logging(&log_path) {
        // Without a log file, stderr is the only safe side channel
        utils::init_stderr_logging();
        warn!(error = %e, "Falling back to stderr logging");
    }

    let (config, registry) = match startup() {
        Ok(ready) => ready,
        Err(e) => {
            error!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Crypto Price MCP Server is running...");
    match server::run(config, registry).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to run Crypto Price MCP server");
            ExitCode::FAILURE
        }
    }
}
