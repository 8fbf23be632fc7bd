//! Tools Module
//!
//! Tool implementations grouped by the API they front. Each group exports a
//! `register` function that adds its tools to a registry during startup.

pub mod crypto;
pub mod github;

use std::sync::Arc;

use crate::api::github::GitHubApi;
use crate::core::server::ToolRegistry;
use crypto::CryptoPriceService;

/// Registry for the GitHub server.
pub fn initialize_github_tools(api: Arc<dyn GitHubApi>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    github::register(&mut registry, api);
    registry
}

/// Registry for the crypto price server.
pub fn initialize_crypto_tools(service: Arc<CryptoPriceService>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    crypto::register(&mut registry, service);
    registry
}
