//! Crypto price lookup
//!
//! Resolves a caller-supplied symbol or name to a CoinGecko id and builds a
//! `CryptoQuote` from the coin's detail record.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::coingecko::{CoinListing, MarketDataApi};
use crate::api::ApiError;

/// Common symbols and names mapped to CoinGecko ids. Saves a catalog fetch.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("bitcoin", "bitcoin"),
    ("btc", "bitcoin"),
    ("ethereum", "ethereum"),
    ("eth", "ethereum"),
    ("tether", "tether"),
    ("usdt", "tether"),
    ("bnb", "binancecoin"),
    ("solana", "solana"),
    ("sol", "solana"),
    ("xrp", "ripple"),
    ("dogecoin", "dogecoin"),
    ("doge", "dogecoin"),
    ("cardano", "cardano"),
    ("ada", "cardano"),
    ("polkadot", "polkadot"),
    ("dot", "polkadot"),
];

/// Lowercase alias → canonical coin id.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_ALIASES.iter().copied())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(alias, id)| (alias.as_ref().trim().to_lowercase(), id.into()))
            .collect();
        Self { entries }
    }

    /// Look up an already-normalized alias.
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Price snapshot returned to the agent as structured data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoQuote {
    pub name: String,
    /// Symbol exactly as the caller passed it
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    pub market_cap: Option<f64>,
    pub description: String,
    pub image: Option<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

/// A lookup failure, always naming the caller's original input.
#[derive(Debug, Error)]
#[error("Failed to fetch price for {symbol}: {source}")]
pub struct PriceError {
    pub symbol: String,
    pub source: ApiError,
}

/// Search the catalog: exact id, then symbol, then name.
///
/// `needle` must already be trimmed and lowercased.
pub fn find_coin<'a>(coins: &'a [CoinListing], needle: &str) -> Option<&'a CoinListing> {
    coins
        .iter()
        .find(|c| c.id == needle)
        .or_else(|| coins.iter().find(|c| c.symbol.to_lowercase() == needle))
        .or_else(|| coins.iter().find(|c| c.name.to_lowercase() == needle))
}

/// First line of the English description, or a stock sentence.
fn summary(description: Option<&str>, name: &str) -> String {
    match description.filter(|d| !d.is_empty()) {
        Some(text) => text.split('\n').next().unwrap_or_default().trim_end().to_string(),
        None => format!("{name} price information"),
    }
}

/// Resolves symbols and fetches quotes against a market-data API.
pub struct CryptoPriceService {
    api: Arc<dyn MarketDataApi>,
    aliases: Arc<AliasTable>,
}

impl CryptoPriceService {
    pub fn new(api: Arc<dyn MarketDataApi>, aliases: Arc<AliasTable>) -> Self {
        Self { api, aliases }
    }

    /// Map caller input to a canonical coin id.
    pub async fn resolve_id(&self, input: &str) -> Result<String, ApiError> {
        let needle = input.trim().to_lowercase();

        if let Some(id) = self.aliases.resolve(&needle) {
            debug!(symbol = %needle, id, "Using direct lookup");
            return Ok(id.to_string());
        }

        debug!(symbol = %needle, "Performing catalog search");
        let coins = self.api.list_coins().await?;
        match find_coin(&coins, &needle) {
            Some(coin) => {
                debug!(symbol = %needle, id = %coin.id, "Found match");
                Ok(coin.id.clone())
            }
            None => Err(ApiError::NotFound(format!(
                "Could not find cryptocurrency with symbol: {input}"
            ))),
        }
    }

    /// Current USD quote for `input` (symbol, name or id).
    pub async fn fetch_price(&self, input: &str) -> Result<CryptoQuote, PriceError> {
        self.quote(input).await.map_err(|source| {
            warn!(symbol = %input, error = %source, "Error fetching price");
            PriceError {
                symbol: input.to_string(),
                source,
            }
        })
    }

    async fn quote(&self, input: &str) -> Result<CryptoQuote, ApiError> {
        let id = self.resolve_id(input).await?;
        let detail = self.api.coin_detail(&id).await?;

        let market = detail.market_data.unwrap_or_default();
        let price = market
            .current_price
            .usd
            .ok_or_else(|| ApiError::Decode(format!("no USD price for {id}")))?;

        let description = summary(
            detail.description.as_ref().and_then(|d| d.en.as_deref()),
            &detail.name,
        );

        Ok(CryptoQuote {
            symbol: input.to_string(),
            price,
            currency: "USD".to_string(),
            market_cap: market.market_cap.usd,
            description,
            image: detail.image.and_then(|i| i.large),
            source: "CoinGecko".to_string(),
            fetched_at: Utc::now(),
            name: detail.name,
        })
    }
}
