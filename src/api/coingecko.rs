//! CoinGecko market-data client
//!
//! Unauthenticated access to two endpoints:
//! - `coins/list`: the full id/symbol/name catalog
//! - `coins/{id}`: market data, description and images for one coin

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

use super::ApiError;
use crate::core::utils::{env_lookup, parse_or, ConfigError};

/// Configuration for the CoinGecko client.
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    /// API base URL (e.g., https://api.coingecko.com/api/v3)
    pub api_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl CoinGeckoConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            api_url: lookup("COINGECKO_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            timeout_seconds: parse_or(&lookup, "COINGECKO_TIMEOUT_SECS", defaults.timeout_seconds)?,
        })
    }
}

/// Entry of the `coins/list` catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinListing {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// Subset of the `coins/{id}` record the price tools use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub market_data: Option<MarketData>,
    #[serde(default)]
    pub description: Option<Description>,
    #[serde(default)]
    pub image: Option<CoinImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub current_price: UsdAmount,
    #[serde(default)]
    pub market_cap: UsdAmount,
}

/// A per-currency map reduced to its USD entry.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UsdAmount {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Description {
    #[serde(default)]
    pub en: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinImage {
    #[serde(default)]
    pub large: Option<String>,
}

/// Market-data operations used by the price lookup.
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    /// Full coin catalog.
    async fn list_coins(&self) -> Result<Vec<CoinListing>, ApiError>;

    /// Detailed record for a canonical coin id.
    async fn coin_detail(&self, id: &str) -> Result<CoinDetail, ApiError>;
}

/// reqwest-backed CoinGecko client.
pub struct CoinGeckoClient {
    client: Client,
    api_url: String,
}

impl CoinGeckoClient {
    pub fn new(config: &CoinGeckoConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(format!("crypto-mcp/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = format!(
                "CoinGecko API error: {}",
                status.canonical_reason().unwrap_or("unknown status")
            );
            error!(status = status.as_u16(), url = %url, "CoinGecko API error");
            return Err(ApiError::RemoteRejected {
                status: status.as_u16(),
                message,
                details: None,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketDataApi for CoinGeckoClient {
    async fn list_coins(&self) -> Result<Vec<CoinListing>, ApiError> {
        let url = format!("{}/coins/list", self.api_url);
        debug!(url = %url, "Fetching coin catalog");
        self.get_json(&url, &[]).await
    }

    async fn coin_detail(&self, id: &str) -> Result<CoinDetail, ApiError> {
        let url = format!("{}/coins/{}", self.api_url, id);
        debug!(url = %url, "Fetching coin detail");
        self.get_json(
            &url,
            &[
                ("localization", "false"),
                ("tickers", "false"),
                ("market_data", "true"),
                ("community_data", "false"),
                ("developer_data", "false"),
            ],
        )
        .await
    }
}
