//! CoinGecko Market Data Gateway
//!
//! Implementation of `MarketDataGateway` against the public CoinGecko v3
//! REST API. Missing data (unknown coin, no price for a date) comes back
//! as `Ok(None)`; HTTP and transport failures as `SimError::Upstream`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use simufolio_core::error::{Result, SimError};
use simufolio_core::market::MarketDataGateway;
use simufolio_core::model::{AssetListing, AssetMetadata};

const VS_CURRENCY: &str = "usd";

/// CoinGecko client configuration
#[derive(Clone, Debug)]
pub struct CoinGeckoConfig {
    /// API base URL
    pub base_url: String,

    /// Demo API key, sent as a query parameter when present
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".into(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl CoinGeckoConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("COINGECKO_API_KEY").ok(),
            ..Default::default()
        }
    }
}

/// CoinGecko market data gateway
pub struct CoinGeckoGateway {
    client: Client,
    config: CoinGeckoConfig,
}

impl CoinGeckoGateway {
    /// Create from configuration
    pub fn from_config(config: CoinGeckoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SimError::Upstream(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(CoinGeckoConfig::from_env())
    }

    /// GET a JSON payload; 404 becomes `None`, other failures `Err`
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = format!("{}{path}", self.config.base_url);
        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("x_cg_demo_api_key", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SimError::Upstream(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SimError::Upstream(format!(
                "CoinGecko returned {} for {path}",
                response.status(),
            )));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| SimError::Upstream(e.to_string()))
    }
}

// Response payloads (only the fields we consume)

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    market_data: Option<HistoryMarketData>,
}

#[derive(Debug, Deserialize)]
struct HistoryMarketData {
    current_price: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize)]
struct CoinResponse {
    id: String,
    name: String,
    symbol: String,
    market_data: CoinMarketData,
}

#[derive(Debug, Deserialize)]
struct CoinMarketData {
    current_price: HashMap<String, Decimal>,
    market_cap_rank: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    symbol: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MarketCoin {
    id: String,
    symbol: String,
    name: String,
}

#[async_trait]
impl MarketDataGateway for CoinGeckoGateway {
    async fn current_price(&self, asset_id: &str) -> Result<Option<Decimal>> {
        let prices: Option<HashMap<String, HashMap<String, Decimal>>> = self
            .get_json(
                "/simple/price",
                &[("ids", asset_id), ("vs_currencies", VS_CURRENCY)],
            )
            .await?;

        Ok(prices
            .and_then(|p| p.get(asset_id).and_then(|c| c.get(VS_CURRENCY)).copied()))
    }

    async fn historical_price(
        &self,
        asset_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Decimal>> {
        // The history endpoint wants DD-MM-YYYY and prices the day at
        // 00:00 UTC.
        let date = date.format("%d-%m-%Y").to_string();
        let response: Option<HistoryResponse> = self
            .get_json(
                &format!("/coins/{asset_id}/history"),
                &[("date", date.as_str()), ("localization", "false")],
            )
            .await?;

        let price = response
            .and_then(|r| r.market_data)
            .and_then(|m| m.current_price.get(VS_CURRENCY).copied());

        if price.is_none() {
            warn!(asset = %asset_id, date = %date, "no historical price in response");
        }
        Ok(price)
    }

    async fn metadata(&self, asset_id: &str) -> Result<Option<AssetMetadata>> {
        let response: Option<CoinResponse> = self
            .get_json(&format!("/coins/{asset_id}"), &[("localization", "false")])
            .await?;

        let Some(coin) = response else {
            return Ok(None);
        };
        let Some(current_price) = coin.market_data.current_price.get(VS_CURRENCY).copied()
        else {
            warn!(asset = %asset_id, "coin has no {VS_CURRENCY} price");
            return Ok(None);
        };

        Ok(Some(AssetMetadata {
            id: coin.id,
            name: coin.name,
            symbol: coin.symbol.to_uppercase(),
            market_rank: coin.market_data.market_cap_rank,
            current_price,
        }))
    }

    async fn search(&self, query: &str) -> Result<Vec<AssetListing>> {
        let response: Option<SearchResponse> =
            self.get_json("/search", &[("query", query)]).await?;

        Ok(response
            .map(|r| {
                r.coins
                    .into_iter()
                    .map(|c| AssetListing {
                        id: c.id,
                        symbol: c.symbol,
                        name: c.name,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn top_assets(&self, limit: usize) -> Result<Vec<AssetListing>> {
        let per_page = limit.to_string();
        let response: Option<Vec<MarketCoin>> = self
            .get_json(
                "/coins/markets",
                &[
                    ("vs_currency", VS_CURRENCY),
                    ("order", "market_cap_desc"),
                    ("per_page", per_page.as_str()),
                    ("page", "1"),
                ],
            )
            .await?;

        Ok(response
            .map(|coins| {
                coins
                    .into_iter()
                    .map(|c| AssetListing {
                        id: c.id,
                        symbol: c.symbol,
                        name: c.name,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
