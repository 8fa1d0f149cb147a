//! Market Data
//!
//! Abstraction over the price provider, plus a mock for development.

mod mock;

pub use mock::MockMarketGateway;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::{AssetListing, AssetMetadata};

/// Market data provider trait (Strategy pattern)
///
/// Price lookups return `Ok(None)` when the provider has no data for
/// that asset or date; transport failures surface as `Err`. Every call
/// is expected to be bounded by a timeout at the implementation.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Spot price in the quote currency
    async fn current_price(&self, asset_id: &str) -> Result<Option<Decimal>>;

    /// Price at 00:00 UTC on the given date
    async fn historical_price(&self, asset_id: &str, date: NaiveDate)
        -> Result<Option<Decimal>>;

    /// Display metadata for one asset
    async fn metadata(&self, asset_id: &str) -> Result<Option<AssetMetadata>>;

    /// Assets matching a free-text query, best match first
    async fn search(&self, query: &str) -> Result<Vec<AssetListing>>;

    /// The top assets by market cap
    async fn top_assets(&self, limit: usize) -> Result<Vec<AssetListing>>;
}
