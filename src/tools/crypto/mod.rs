//! Crypto Price Tools
//!
//! `getCryptoPrice` and `compareCryptoPrices`, backed by CoinGecko. Lookup
//! failures come back as `isError` replies naming the caller's input.

pub mod format;
pub mod price;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::core::reply::ToolReply;
use crate::core::server::{MCPTool, Tool, ToolRegistry};
use format::{format_compact_usd, format_price};
pub use price::{AliasTable, CryptoPriceService, CryptoQuote, PriceError};

/// Register both crypto tools against one price service.
pub fn register(registry: &mut ToolRegistry, service: Arc<CryptoPriceService>) {
    registry.register(GetCryptoPrice {
        service: Arc::clone(&service),
    });
    registry.register(CompareCryptoPrices { service });
}

fn symbol_schema(description: &str) -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "description": description
    })
}

fn require_symbol(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("Invalid arguments: {field} must not be empty"))
    } else {
        Ok(())
    }
}

fn quote_value(quote: &CryptoQuote) -> Value {
    // CryptoQuote holds only strings, numbers and a timestamp
    serde_json::to_value(quote).unwrap_or(Value::Null)
}

// =============================================================================
// getCryptoPrice
// =============================================================================

pub struct GetCryptoPrice {
    service: Arc<CryptoPriceService>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GetCryptoPriceParams {
    pub crypto_symbol: String,
}

#[async_trait]
impl Tool for GetCryptoPrice {
    type Params = GetCryptoPriceParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "getCryptoPrice".to_string(),
            description: "Get the current price of a cryptocurrency from CoinGecko".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cryptoSymbol": symbol_schema(
                        "The symbol of the cryptocurrency (e.g., bitcoin, ethereum, solana)"
                    )
                },
                "required": ["cryptoSymbol"],
                "additionalProperties": false
            }),
        }
    }

    fn validate(&self, arguments: Value) -> Result<GetCryptoPriceParams, String> {
        let params: GetCryptoPriceParams = serde_json::from_value(arguments)
            .map_err(|e| format!("Invalid arguments: {e}"))?;
        require_symbol("cryptoSymbol", &params.crypto_symbol)?;
        Ok(params)
    }

    async fn handle(&self, params: GetCryptoPriceParams) -> ToolReply {
        let symbol = params.crypto_symbol;
        info!(%symbol, "getCryptoPrice");

        match self.service.fetch_price(&symbol).await {
            Ok(quote) => {
                let market_cap = quote
                    .market_cap
                    .map(format_compact_usd)
                    .unwrap_or_else(|| "N/A".to_string());
                let text = format!(
                    "Current price of {} ({symbol}) is ${} {}.\n\nMarket Cap: {market_cap}\n\n{}",
                    quote.name,
                    format_price(quote.price),
                    quote.currency,
                    quote.description
                );
                ToolReply::text(text).with_data(quote_value(&quote))
            }
            Err(err) => ToolReply::error(format!("Error: {err}")),
        }
    }
}

// =============================================================================
// compareCryptoPrices
// =============================================================================

pub struct CompareCryptoPrices {
    service: Arc<CryptoPriceService>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CompareCryptoPricesParams {
    pub crypto_symbol1: String,
    pub crypto_symbol2: String,
}

#[async_trait]
impl Tool for CompareCryptoPrices {
    type Params = CompareCryptoPricesParams;

    fn definition(&self) -> MCPTool {
        MCPTool {
            name: "compareCryptoPrices".to_string(),
            description: "Compare the prices of two cryptocurrencies".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cryptoSymbol1": symbol_schema(
                        "The symbol of the first cryptocurrency (e.g., bitcoin)"
                    ),
                    "cryptoSymbol2": symbol_schema(
                        "The symbol of the second cryptocurrency (e.g., ethereum)"
                    )
                },
                "required": ["cryptoSymbol1", "cryptoSymbol2"],
                "additionalProperties": false
            }),
        }
    }

    fn validate(&self, arguments: Value) -> Result<CompareCryptoPricesParams, String> {
        let params: CompareCryptoPricesParams = serde_json::from_value(arguments)
            .map_err(|e| format!("Invalid arguments: {e}"))?;
        require_symbol("cryptoSymbol1", &params.crypto_symbol1)?;
        require_symbol("cryptoSymbol2", &params.crypto_symbol2)?;
        Ok(params)
    }

    async fn handle(&self, params: CompareCryptoPricesParams) -> ToolReply {
        let CompareCryptoPricesParams {
            crypto_symbol1: symbol1,
            crypto_symbol2: symbol2,
        } = params;
        info!(%symbol1, %symbol2, "compareCryptoPrices");

        // Both lookups in flight at once; the first failure wins
        let (first, second) = match try_join(
            self.service.fetch_price(&symbol1),
            self.service.fetch_price(&symbol2),
        )
        .await
        {
            Ok(quotes) => quotes,
            Err(err) => return ToolReply::error(format!("Error: {err}")),
        };

        if first.price == 0.0 || second.price == 0.0 {
            return ToolReply::error(format!(
                "Error: Cannot compare {} and {}: a USD price of zero has no ratio",
                first.name, second.name
            ));
        }

        let ratio = first.price / second.price;
        let text = format!(
            "Current price comparison:\n\n\
             {} ({symbol1}): ${} {}\n\
             {} ({symbol2}): ${} {}\n\n\
             1 {} = {ratio:.6} {}\n\
             1 {} = {:.6} {}",
            first.name,
            format_price(first.price),
            first.currency,
            second.name,
            format_price(second.price),
            second.currency,
            first.name,
            second.name,
            second.name,
            1.0 / ratio,
            first.name,
        );

        ToolReply::text(text).with_data(json!({
            "crypto1": quote_value(&first),
            "crypto2": quote_value(&second),
            "ratio": ratio
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::coingecko::{CoinDetail, CoinListing, MarketData, MarketDataApi, UsdAmount};
    use crate::api::ApiError;
    use price::tests::{service, FakeMarket};
    use tokio::sync::Barrier;

    /// Holds every detail request until two are waiting at once.
    struct RendezvousMarket {
        barrier: Barrier,
    }

    #[async_trait]
    impl MarketDataApi for RendezvousMarket {
        async fn list_coins(&self) -> Result<Vec<CoinListing>, ApiError> {
            Ok(Vec::new())
        }

        async fn coin_detail(&self, id: &str) -> Result<CoinDetail, ApiError> {
            self.barrier.wait().await;
            Ok(CoinDetail {
                id: id.to_string(),
                name: id.to_string(),
                market_data: Some(MarketData {
                    current_price: UsdAmount { usd: Some(2.0) },
                    market_cap: UsdAmount::default(),
                }),
                ..CoinDetail::default()
            })
        }
    }

    async fn run<T: Tool>(tool: &T, args: Value) -> ToolReply {
        let params = tool.validate(args).expect("arguments should validate");
        tool.handle(params).await
    }

    #[tokio::test]
    async fn test_get_price_reply() {
        let tool = GetCryptoPrice {
            service: Arc::new(service(FakeMarket::new())),
        };

        let reply = run(&tool, json!({ "cryptoSymbol": "BTC" })).await;

        assert!(!reply.is_error);
        assert_eq!(
            reply.text_content(),
            "Current price of Bitcoin (BTC) is $64,000 USD.\n\n\
             Market Cap: $1.2T\n\n\
             Bitcoin is a decentralized currency."
        );
        let data = reply.data.unwrap();
        assert_eq!(data["name"], "Bitcoin");
        assert_eq!(data["symbol"], "BTC");
        assert_eq!(data["price"], 64000.0);
        assert_eq!(data["source"], "CoinGecko");
    }

    #[tokio::test]
    async fn test_get_price_unknown_symbol_is_error() {
        let tool = GetCryptoPrice {
            service: Arc::new(service(FakeMarket::new())),
        };

        let reply = run(&tool, json!({ "cryptoSymbol": "Zzz" })).await;

        assert!(reply.is_error);
        assert!(reply.data.is_none());
        assert_eq!(
            reply.text_content(),
            "Error: Failed to fetch price for Zzz: Could not find cryptocurrency with symbol: Zzz"
        );
    }

    #[test]
    fn test_get_price_rejects_blank_and_unknown_fields() {
        let tool = GetCryptoPrice {
            service: Arc::new(service(FakeMarket::new())),
        };
        assert!(tool.validate(json!({ "cryptoSymbol": "   " })).is_err());
        assert!(tool.validate(json!({ "cryptoSymbol": "btc", "currency": "eur" })).is_err());
        assert!(tool.validate(json!({})).is_err());
    }

    #[tokio::test]
    async fn test_compare_ratio_and_reciprocal() {
        let tool = CompareCryptoPrices {
            service: Arc::new(service(FakeMarket::new())),
        };

        let reply = run(
            &tool,
            json!({ "cryptoSymbol1": "bitcoin", "cryptoSymbol2": "ethereum" }),
        )
        .await;

        assert!(!reply.is_error);
        let data = reply.data.clone().unwrap();
        let ratio = data["ratio"].as_f64().unwrap();
        assert!((ratio - 20.0).abs() < 1e-9);
        assert!((ratio * (1.0 / ratio) - 1.0).abs() < 1e-12);
        assert_eq!(data["crypto1"]["name"], "Bitcoin");
        assert_eq!(data["crypto2"]["name"], "Ethereum");

        let text = reply.text_content();
        assert!(text.contains("Bitcoin (bitcoin): $64,000 USD"));
        assert!(text.contains("Ethereum (ethereum): $3,200 USD"));
        assert!(text.contains("1 Bitcoin = 20.000000 Ethereum"));
        assert!(text.contains("1 Ethereum = 0.050000 Bitcoin"));
    }

    #[tokio::test]
    async fn test_compare_fails_when_either_lookup_fails() {
        let tool = CompareCryptoPrices {
            service: Arc::new(service(FakeMarket::new().failing("ethereum"))),
        };

        let reply = run(
            &tool,
            json!({ "cryptoSymbol1": "btc", "cryptoSymbol2": "eth" }),
        )
        .await;

        assert!(reply.is_error);
        assert!(reply.data.is_none());
        assert_eq!(
            reply.text_content(),
            "Error: Failed to fetch price for eth: connection reset"
        );

        let tool = CompareCryptoPrices {
            service: Arc::new(service(FakeMarket::new())),
        };
        let reply = run(
            &tool,
            json!({ "cryptoSymbol1": "nope", "cryptoSymbol2": "eth" }),
        )
        .await;
        assert!(reply.is_error);
        assert!(reply.text_content().contains("nope"));
    }

    #[tokio::test]
    async fn test_compare_fetches_both_prices_concurrently() {
        let market = RendezvousMarket {
            barrier: Barrier::new(2),
        };
        let tool = CompareCryptoPrices {
            service: Arc::new(CryptoPriceService::new(
                Arc::new(market),
                Arc::new(AliasTable::builtin()),
            )),
        };
        let params = tool
            .validate(json!({ "cryptoSymbol1": "btc", "cryptoSymbol2": "eth" }))
            .unwrap();

        // A sequential fetch would park forever on the barrier
        let reply = tokio::time::timeout(Duration::from_secs(5), tool.handle(params))
            .await
            .expect("both lookups should be in flight together");

        assert!(!reply.is_error);
        assert_eq!(reply.data.unwrap()["ratio"], 1.0);
    }

    #[tokio::test]
    async fn test_compare_zero_price_is_error() {
        let mut market = FakeMarket::new();
        market.prices.insert("ethereum".to_string(), 0.0);
        let tool = CompareCryptoPrices {
            service: Arc::new(service(market)),
        };

        let reply = run(
            &tool,
            json!({ "cryptoSymbol1": "btc", "cryptoSymbol2": "eth" }),
        )
        .await;

        assert!(reply.is_error);
        assert!(reply.text_content().contains("Cannot compare Bitcoin and Ethereum"));
    }

    #[test]
    fn test_register_adds_both_tools() {
        let mut registry = ToolRegistry::new();
        register(&mut registry, Arc::new(service(FakeMarket::new())));
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["getCryptoPrice", "compareCryptoPrices"]);
    }
}
