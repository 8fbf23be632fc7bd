//! Configuration and Environment Utilities
//!
//! Servers are configured from environment variables (optionally seeded from
//! a `.env` file). Config structs are built from a lookup function rather
//! than reading `std::env` directly, so tests can supply their own values.
//!
//! Common variables:
//! - SERVER_NAME: Name reported in `initialize` (default depends on binary)
//! - SERVER_VERSION: Version reported in `initialize` (default: crate version)
//! - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "stdio")
//! - HOST: Bind address for HTTP mode (default: "127.0.0.1")
//! - PORT: Port number for HTTP mode (default: 3000)
//! - WORKER_THREADS: HTTP worker count (default: CPU count, max 16)

use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors raised while reading startup configuration. Any of these is fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingRequired(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Transport(s) the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Line-delimited JSON-RPC over stdin/stdout
    Stdio,
    /// JSON-RPC over HTTP POST
    Http,
    /// Both at once; stdio runs in a background task
    Both,
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportMode::Stdio),
            "http" => Ok(TransportMode::Http),
            "both" => Ok(TransportMode::Both),
            _ => Err(ConfigError::Invalid {
                key: "MCP_TRANSPORT_MODE",
                value: s.to_string(),
            }),
        }
    }
}

/// Server-level settings shared by both binaries.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn from_env(default_name: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(default_name, env_lookup)
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(default_name: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = match lookup("MCP_TRANSPORT_MODE") {
            Some(mode) => mode.parse()?,
            None => TransportMode::Stdio,
        };

        // Worker count defaults to CPU count, capped at 16
        let workers = lookup("WORKER_THREADS")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or_else(|| num_cpus::get().clamp(1, 16));

        Ok(Self {
            name: lookup("SERVER_NAME").unwrap_or_else(|| default_name.to_string()),
            version: lookup("SERVER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            transport,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            workers,
        })
    }
}

/// Read an environment variable, treating blank values as unset.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get environment variable value with a default fallback.
pub fn get_env_var(key: &str, default: &str) -> String {
    env_lookup(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional variable, falling back to `default` when unset.
pub fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

/// Load `.env` from the working directory if present.
pub fn load_dotenv() {
    // A missing .env is the normal case
    let _ = dotenvy::dotenv();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging to stderr (stdout is reserved for the MCP protocol).
pub fn init_stderr_logging() {
    fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Open (create or truncate) the debug log file.
pub fn open_log_file(path: &Path) -> Result<File, ConfigError> {
    File::create(path).map_err(|source| ConfigError::LogFile {
        path: path.display().to_string(),
        source,
    })
}

/// Initialize logging to a file, truncating it first.
pub fn init_file_logging(path: &Path) -> Result<(), ConfigError> {
    let file = open_log_file(path)?;

    fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}
