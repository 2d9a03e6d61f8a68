//! Market and account collaborator traits
//!
//! The engine never talks to an exchange directly. Whatever fetches tickers,
//! price history, balances and order state implements these traits, which
//! keeps the trading logic independent of any one exchange and easy to mock.

use async_trait::async_trait;

use crate::domain::entities::balance::PositionBalance;
use crate::domain::entities::coin::Ticker;
use crate::domain::entities::order::OrderDetail;
use crate::domain::entities::time_series::PricePoint;
use crate::domain::errors::FeedError;

/// Common result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

/// Read-only market data
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Latest ticker of every tradable asset
    async fn fetch_tickers(&self) -> FeedResult<Vec<Ticker>>;

    /// Price history of one asset
    ///
    /// # Arguments
    /// * `asset_id` - Asset to fetch
    ///
    /// # Returns
    /// Samples ordered most recent first
    async fn fetch_time_series(&self, asset_id: &str) -> FeedResult<Vec<PricePoint>>;
}

/// Read-only account state
#[async_trait]
pub trait AccountFeed: Send + Sync {
    /// Holdings of every coin in the wallet
    async fn fetch_balances(&self) -> FeedResult<Vec<PositionBalance>>;

    /// Execution state of one order
    ///
    /// # Arguments
    /// * `order_id` - Client order id used when the order was placed
    async fn fetch_order_detail(&self, order_id: &str) -> FeedResult<OrderDetail>;
}
