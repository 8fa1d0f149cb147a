//! Mock Market Gateway
//!
//! For testing and demo purposes. Serves realistic static prices from a
//! small coin table.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::MarketDataGateway;
use crate::error::Result;
use crate::model::{AssetListing, AssetMetadata};

#[derive(Clone, Debug)]
struct MockCoin {
    id: String,
    name: String,
    symbol: String,
    rank: u32,
    current_price: Decimal,
    historical_price: Option<Decimal>,
}

/// Mock market gateway with a static coin table
pub struct MockMarketGateway {
    coins: Vec<MockCoin>,
}

impl Default for MockMarketGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMarketGateway {
    /// Gateway pre-seeded with the usual suspects
    pub fn new() -> Self {
        let table: &[(&str, &str, &str, u32, Decimal)] = &[
            ("bitcoin", "Bitcoin", "BTC", 1, dec!(97500)),
            ("ethereum", "Ethereum", "ETH", 2, dec!(3450)),
            ("ripple", "Ripple", "XRP", 3, dec!(2.35)),
            ("solana", "Solana", "SOL", 4, dec!(195)),
            ("dogecoin", "Dogecoin", "DOGE", 5, dec!(0.38)),
            ("cardano", "Cardano", "ADA", 6, dec!(0.95)),
            ("avalanche-2", "Avalanche", "AVAX", 7, dec!(42.00)),
            ("chainlink", "Chainlink", "LINK", 8, dec!(24.50)),
            ("polkadot", "Polkadot", "DOT", 9, dec!(7.20)),
            ("litecoin", "Litecoin", "LTC", 10, dec!(105)),
        ];

        let coins = table
            .iter()
            .map(|(id, name, symbol, rank, price)| MockCoin {
                id: (*id).into(),
                name: (*name).into(),
                symbol: (*symbol).into(),
                rank: *rank,
                current_price: *price,
                historical_price: Some(*price),
            })
            .collect();

        Self { coins }
    }

    /// Gateway with no coins at all
    pub fn empty() -> Self {
        Self { coins: Vec::new() }
    }

    /// Add a coin; `historical_price = None` makes the start-price
    /// lookup fail for that coin
    pub fn with_coin(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        rank: u32,
        current_price: Decimal,
        historical_price: Option<Decimal>,
    ) -> Self {
        self.coins.push(MockCoin {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
            rank,
            current_price,
            historical_price,
        });
        self
    }

    fn find(&self, asset_id: &str) -> Option<&MockCoin> {
        self.coins.iter().find(|c| c.id == asset_id)
    }
}

fn listing(coin: &MockCoin) -> AssetListing {
    AssetListing {
        id: coin.id.clone(),
        symbol: coin.symbol.clone(),
        name: coin.name.clone(),
    }
}

#[async_trait]
impl MarketDataGateway for MockMarketGateway {
    async fn current_price(&self, asset_id: &str) -> Result<Option<Decimal>> {
        Ok(self.find(asset_id).map(|c| c.current_price))
    }

    async fn historical_price(
        &self,
        asset_id: &str,
        _date: NaiveDate,
    ) -> Result<Option<Decimal>> {
        Ok(self.find(asset_id).and_then(|c| c.historical_price))
    }

    async fn metadata(&self, asset_id: &str) -> Result<Option<AssetMetadata>> {
        Ok(self.find(asset_id).map(|c| AssetMetadata {
            id: c.id.clone(),
            name: c.name.clone(),
            symbol: c.symbol.clone(),
            market_rank: Some(c.rank),
            current_price: c.current_price,
        }))
    }

    async fn search(&self, query: &str) -> Result<Vec<AssetListing>> {
        let query = query.to_lowercase();
        Ok(self
            .coins
            .iter()
            .filter(|c| {
                c.id.contains(&query)
                    || c.symbol.to_lowercase().contains(&query)
                    || c.name.to_lowercase().contains(&query)
            })
            .map(listing)
            .collect())
    }

    async fn top_assets(&self, limit: usize) -> Result<Vec<AssetListing>> {
        let mut coins: Vec<_> = self.coins.iter().collect();
        coins.sort_by_key(|c| c.rank);
        Ok(coins.into_iter().take(limit).map(listing).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_coin_prices() {
        let gateway = MockMarketGateway::new();

        let price = gateway.current_price("bitcoin").await.unwrap().unwrap();
        assert!(price > Decimal::ZERO);

        let meta = gateway.metadata("bitcoin").await.unwrap().unwrap();
        assert_eq!(meta.symbol, "BTC");
        assert_eq!(meta.market_rank, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_coin_is_none() {
        let gateway = MockMarketGateway::new();
        assert!(gateway.current_price("notreal").await.unwrap().is_none());
        assert!(gateway.metadata("notreal").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_matches_id_symbol_and_name() {
        let gateway = MockMarketGateway::new();

        let by_symbol = gateway.search("eth").await.unwrap();
        assert!(by_symbol.iter().any(|c| c.id == "ethereum"));

        let by_name = gateway.search("Ripple").await.unwrap();
        assert_eq!(by_name.len(), 1);

        assert!(gateway.search("doesnotexist123").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_assets_ordered_by_rank() {
        let gateway = MockMarketGateway::new();
        let top = gateway.top_assets(3).await.unwrap();

        assert_eq!(top.len(), 3);
        assert_eq!(top[0].id, "bitcoin");
        assert_eq!(top[1].id, "ethereum");
    }
}
