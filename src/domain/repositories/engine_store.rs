//! Persistence collaborator for analysis results, configuration and orders

use async_trait::async_trait;

use crate::domain::entities::coin::CoinProperties;
use crate::domain::entities::market::{CoinSelectionCriteria, MarketCharacterization, RatingThreshold};
use crate::domain::entities::order::{BuyOrder, SellOrder};
use crate::domain::entities::time_series::TimeSeriesSummary;
use crate::domain::errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Replace the stored batch of summaries with this cycle's batch
    async fn save_summaries(&self, batch: &[TimeSeriesSummary]) -> StoreResult<()>;

    /// The most recently saved batch
    async fn load_summaries(&self) -> StoreResult<Vec<TimeSeriesSummary>>;

    /// Record the cycle's rating together with the median that produced it
    async fn save_characterization(
        &self,
        characterization: MarketCharacterization,
        median_change: f64,
    ) -> StoreResult<()>;

    /// The most recent rating, if any cycle has completed
    async fn load_characterization(&self) -> StoreResult<Option<MarketCharacterization>>;

    async fn load_thresholds(&self) -> StoreResult<Vec<RatingThreshold>>;

    async fn load_criteria(
        &self,
        characterization: MarketCharacterization,
    ) -> StoreResult<Option<CoinSelectionCriteria>>;

    async fn load_coin_properties(&self, coin_name: &str) -> StoreResult<Option<CoinProperties>>;

    async fn create_buy_order(&self, order: &BuyOrder) -> StoreResult<()>;

    /// Buy orders without a linked sell order
    async fn open_buy_orders(&self) -> StoreResult<Vec<BuyOrder>>;

    /// Link a sell order to its purchase and close the purchase, atomically.
    ///
    /// Fails with `OrderError::AlreadySold` when the purchase is already closed.
    async fn record_sale(&self, buy_order_id: &str, sell_order_id: &str) -> StoreResult<SellOrder>;

    /// Remove purchases that will never be sold, returning how many went
    async fn delete_buy_orders(&self, buy_order_ids: &[String]) -> StoreResult<u64>;
}
