//! MCP tool servers for third-party HTTP APIs
//!
//! Two servers share one framework:
//!
//! - **github-mcp** - repository, branch and pull-request operations against
//!   the GitHub REST API
//! - **crypto-mcp** - cryptocurrency prices and comparisons from CoinGecko
//!
//! Both speak JSON-RPC 2.0 (MCP) over stdio by default, with an optional HTTP
//! transport. Diagnostics never go to stdout.

pub mod api;
pub mod core;
pub mod tools;

pub use crate::api::ApiError;
pub use crate::core::reply::{Content, ToolReply};
pub use crate::core::server::{MCPTool, Tool, ToolHandler, ToolRegistry};
pub use crate::core::utils::{ConfigError, ServerConfig, TransportMode};
