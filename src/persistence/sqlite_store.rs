//! SQLite implementation of the engine store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info, warn};

use super::DbPool;
use crate::config::{default_rating_thresholds, default_selection_criteria};
use crate::domain::entities::coin::CoinProperties;
use crate::domain::entities::market::{
    CoinSelectionCriteria, MarketCharacterization, RatingThreshold,
};
use crate::domain::entities::order::{BuyOrder, SellOrder};
use crate::domain::entities::time_series::{TimeSeriesSummary, TrendState};
use crate::domain::errors::StoreError;
use crate::domain::repositories::engine_store::{EngineStore, StoreResult};

pub struct SqliteEngineStore {
    pool: DbPool,
}

impl SqliteEngineStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Seed the default rating partition and tier criteria into empty tables
    pub async fn seed_defaults(&self) -> StoreResult<()> {
        let (thresholds,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rating_thresholds")
            .fetch_one(&self.pool)
            .await?;
        if thresholds == 0 {
            self.save_thresholds(&default_rating_thresholds()).await?;
            info!("Seeded default rating thresholds");
        }

        let (criteria,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coin_selection_criteria")
            .fetch_one(&self.pool)
            .await?;
        if criteria == 0 {
            for tier in default_selection_criteria() {
                self.save_criteria(&tier).await?;
            }
            info!("Seeded default coin selection criteria");
        }

        Ok(())
    }

    /// Replace the rating partition
    pub async fn save_thresholds(&self, thresholds: &[RatingThreshold]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM rating_thresholds")
            .execute(&mut *tx)
            .await?;

        for threshold in thresholds {
            sqlx::query(
                r#"
                INSERT INTO rating_thresholds (
                    rating, upper_bound, upper_unbounded, lower_bound, lower_unbounded
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(threshold.rating.to_string())
            .bind(threshold.upper_bound)
            .bind(threshold.upper_unbounded)
            .bind(threshold.lower_bound)
            .bind(threshold.lower_unbounded)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn save_criteria(&self, criteria: &CoinSelectionCriteria) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO coin_selection_criteria (
                characterization, coin_should_be_volatile, coin_should_be_nominal,
                coin_should_be_an_outlier, coin_should_be_rising, coin_should_be_flat,
                coin_should_be_falling, maximum_number_of_orders, minimum_order_value_usd
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(criteria.characterization.to_string())
        .bind(criteria.coin_should_be_volatile)
        .bind(criteria.coin_should_be_nominal)
        .bind(criteria.coin_should_be_an_outlier)
        .bind(criteria.coin_should_be_rising)
        .bind(criteria.coin_should_be_flat)
        .bind(criteria.coin_should_be_falling)
        .bind(criteria.maximum_number_of_orders as i64)
        .bind(criteria.minimum_order_value_usd)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_coin_properties(&self, props: &CoinProperties) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO coin_properties (
                coin_name, quantity_tick_size, quantity_decimals, price_tick_size, price_decimals
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&props.coin_name)
        .bind(props.quantity_tick_size)
        .bind(props.quantity_decimals as i64)
        .bind(props.price_tick_size)
        .bind(props.price_decimals as i64)
        .execute(&self.pool)
        .await?;

        debug!(coin = %props.coin_name, "Saved coin properties");
        Ok(())
    }

    /// Look up one purchase, sold or not
    pub async fn find_buy_order(&self, buy_order_id: &str) -> StoreResult<Option<BuyOrder>> {
        let row = sqlx::query(
            "SELECT buy_order_id, coin_name, price_per_coin, sell_order_id FROM buy_orders WHERE buy_order_id = ?1",
        )
        .bind(buy_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(buy_order_from_row).transpose()
    }
}

#[async_trait]
impl EngineStore for SqliteEngineStore {
    async fn save_summaries(&self, batch: &[TimeSeriesSummary]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM time_series_summaries")
            .execute(&mut *tx)
            .await?;

        for (position, summary) in batch.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO time_series_summaries (
                    asset_id, batch_position, mean, std, percentage_std, modes_json,
                    trend_coefficient, trend_offset, normalized_coefficient,
                    normalized_start_value, trend_percentage_change, trend_state,
                    is_volatile, is_outlier_in_gradient, is_outlier_in_offset,
                    is_outlier_in_deviation, dataset_count, time_offset_ms,
                    latest_value, ranking
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                "#,
            )
            .bind(&summary.asset_id)
            .bind(position as i64)
            .bind(summary.mean)
            .bind(summary.std)
            .bind(summary.percentage_std)
            .bind(serde_json::to_string(&summary.modes)?)
            .bind(summary.trend_coefficient)
            .bind(summary.trend_offset)
            .bind(summary.normalized_coefficient)
            .bind(summary.normalized_start_value)
            .bind(summary.trend_percentage_change)
            .bind(summary.trend_state.to_string())
            .bind(summary.is_volatile)
            .bind(summary.is_outlier_in_gradient)
            .bind(summary.is_outlier_in_offset)
            .bind(summary.is_outlier_in_deviation)
            .bind(summary.dataset_count as i64)
            .bind(summary.time_offset_ms)
            .bind(summary.latest_value)
            .bind(summary.ranking)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(batch_size = batch.len(), "Saved summary batch");
        Ok(())
    }

    async fn load_summaries(&self) -> StoreResult<Vec<TimeSeriesSummary>> {
        let rows = sqlx::query("SELECT * FROM time_series_summaries ORDER BY batch_position")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn save_characterization(
        &self,
        characterization: MarketCharacterization,
        median_change: f64,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO market_characterizations (characterization, median_change, recorded_at) VALUES (?1, ?2, ?3)",
        )
        .bind(characterization.to_string())
        .bind(median_change)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_characterization(&self) -> StoreResult<Option<MarketCharacterization>> {
        let row = sqlx::query(
            "SELECT characterization FROM market_characterizations ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("characterization")?;
                Ok(Some(parse_characterization(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn load_thresholds(&self) -> StoreResult<Vec<RatingThreshold>> {
        let rows = sqlx::query("SELECT * FROM rating_thresholds")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(threshold_from_row).collect()
    }

    async fn load_criteria(
        &self,
        characterization: MarketCharacterization,
    ) -> StoreResult<Option<CoinSelectionCriteria>> {
        let row = sqlx::query("SELECT * FROM coin_selection_criteria WHERE characterization = ?1")
            .bind(characterization.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CoinSelectionCriteria {
            characterization,
            coin_should_be_volatile: row.try_get("coin_should_be_volatile")?,
            coin_should_be_nominal: row.try_get("coin_should_be_nominal")?,
            coin_should_be_an_outlier: row.try_get("coin_should_be_an_outlier")?,
            coin_should_be_rising: row.try_get("coin_should_be_rising")?,
            coin_should_be_flat: row.try_get("coin_should_be_flat")?,
            coin_should_be_falling: row.try_get("coin_should_be_falling")?,
            maximum_number_of_orders: non_negative(&row, "maximum_number_of_orders")?,
            minimum_order_value_usd: row.try_get("minimum_order_value_usd")?,
        }))
    }

    async fn load_coin_properties(&self, coin_name: &str) -> StoreResult<Option<CoinProperties>> {
        let row = sqlx::query("SELECT * FROM coin_properties WHERE coin_name = ?1")
            .bind(coin_name)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let props = CoinProperties::new(
            row.try_get("coin_name")?,
            row.try_get("quantity_tick_size")?,
            non_negative(&row, "quantity_decimals")?,
            row.try_get("price_tick_size")?,
            non_negative(&row, "price_decimals")?,
        )
        .map_err(|e| StoreError::Corrupt(format!("coin_properties for {}: {}", coin_name, e)))?;

        Ok(Some(props))
    }

    async fn create_buy_order(&self, order: &BuyOrder) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO buy_orders (buy_order_id, coin_name, price_per_coin, sell_order_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&order.buy_order_id)
        .bind(&order.coin_name)
        .bind(order.price_per_coin)
        .bind(&order.sell_order_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(
            buy_order_id = %order.buy_order_id,
            coin = %order.coin_name,
            "Created buy order"
        );
        Ok(())
    }

    async fn open_buy_orders(&self) -> StoreResult<Vec<BuyOrder>> {
        let rows = sqlx::query(
            r#"
            SELECT buy_order_id, coin_name, price_per_coin, sell_order_id
            FROM buy_orders
            WHERE sell_order_id IS NULL
            ORDER BY created_at, buy_order_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(buy_order_from_row).collect()
    }

    async fn record_sale(&self, buy_order_id: &str, sell_order_id: &str) -> StoreResult<SellOrder> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT buy_order_id, coin_name, price_per_coin, sell_order_id FROM buy_orders WHERE buy_order_id = ?1",
        )
        .bind(buy_order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("buy order {}", buy_order_id)))?;

        let mut order = buy_order_from_row(&row)?;
        let sale = order.close(sell_order_id.to_string())?;

        sqlx::query("INSERT INTO sell_orders (sell_order_id, buy_order_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(&sale.sell_order_id)
            .bind(&sale.buy_order_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let updated = sqlx::query(
            "UPDATE buy_orders SET sell_order_id = ?1 WHERE buy_order_id = ?2 AND sell_order_id IS NULL",
        )
        .bind(&sale.sell_order_id)
        .bind(&sale.buy_order_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated != 1 {
            warn!(buy_order_id = %buy_order_id, "Buy order closed concurrently, rolling back sale");
            tx.rollback().await?;
            return Err(StoreError::Corrupt(format!(
                "buy order {} changed while recording sale",
                buy_order_id
            )));
        }

        tx.commit().await?;

        info!(
            buy_order_id = %sale.buy_order_id,
            sell_order_id = %sale.sell_order_id,
            "Recorded sale"
        );
        Ok(sale)
    }

    async fn delete_buy_orders(&self, buy_order_ids: &[String]) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for buy_order_id in buy_order_ids {
            deleted += sqlx::query(
                "DELETE FROM buy_orders WHERE buy_order_id = ?1 AND sell_order_id IS NULL",
            )
            .bind(buy_order_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        debug!(requested = buy_order_ids.len(), deleted = deleted, "Deleted buy orders");
        Ok(deleted)
    }
}

fn parse_characterization(raw: &str) -> StoreResult<MarketCharacterization> {
    raw.parse().map_err(StoreError::Corrupt)
}

fn non_negative<T: TryFrom<i64>>(row: &SqliteRow, column: &str) -> StoreResult<T> {
    let raw: i64 = row.try_get(column)?;
    T::try_from(raw).map_err(|_| StoreError::Corrupt(format!("{} out of range: {}", column, raw)))
}

fn threshold_from_row(row: &SqliteRow) -> StoreResult<RatingThreshold> {
    let rating: String = row.try_get("rating")?;

    Ok(RatingThreshold {
        rating: parse_characterization(&rating)?,
        upper_bound: row.try_get("upper_bound")?,
        upper_unbounded: row.try_get("upper_unbounded")?,
        lower_bound: row.try_get("lower_bound")?,
        lower_unbounded: row.try_get("lower_unbounded")?,
    })
}

fn buy_order_from_row(row: &SqliteRow) -> StoreResult<BuyOrder> {
    Ok(BuyOrder {
        buy_order_id: row.try_get("buy_order_id")?,
        coin_name: row.try_get("coin_name")?,
        price_per_coin: row.try_get("price_per_coin")?,
        sell_order_id: row.try_get("sell_order_id")?,
    })
}

fn summary_from_row(row: &SqliteRow) -> StoreResult<TimeSeriesSummary> {
    let modes_json: String = row.try_get("modes_json")?;
    let trend_state: String = row.try_get("trend_state")?;

    Ok(TimeSeriesSummary {
        asset_id: row.try_get("asset_id")?,
        mean: row.try_get("mean")?,
        std: row.try_get("std")?,
        percentage_std: row.try_get("percentage_std")?,
        modes: serde_json::from_str(&modes_json)?,
        trend_coefficient: row.try_get("trend_coefficient")?,
        trend_offset: row.try_get("trend_offset")?,
        normalized_coefficient: row.try_get("normalized_coefficient")?,
        normalized_start_value: row.try_get("normalized_start_value")?,
        trend_percentage_change: row.try_get("trend_percentage_change")?,
        trend_state: trend_state
            .parse::<TrendState>()
            .map_err(StoreError::Corrupt)?,
        is_volatile: row.try_get("is_volatile")?,
        is_outlier_in_gradient: row.try_get("is_outlier_in_gradient")?,
        is_outlier_in_offset: row.try_get("is_outlier_in_offset")?,
        is_outlier_in_deviation: row.try_get("is_outlier_in_deviation")?,
        dataset_count: non_negative(row, "dataset_count")?,
        time_offset_ms: row.try_get("time_offset_ms")?,
        latest_value: row.try_get("latest_value")?,
        ranking: row.try_get("ranking")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::OrderError;
    use crate::domain::services::outlier_classifier::tests::summary;
    use crate::persistence::init_database;

    async fn store() -> SqliteEngineStore {
        let pool = init_database("sqlite::memory:").await.unwrap();
        SqliteEngineStore::new(pool)
    }

    #[tokio::test]
    async fn test_summaries_round_trip_in_batch_order() {
        let store = store().await;
        let mut first = summary("ZRX", 0.02, 1.1, 0.04);
        first.modes = vec![1.0, 2.5];
        first.trend_state = TrendState::Rising;
        first.is_outlier_in_offset = true;
        first.ranking = 300;
        let batch = vec![first, summary("ADA", -0.01, 0.9, 0.02)];

        store.save_summaries(&batch).await.unwrap();
        assert_eq!(store.load_summaries().await.unwrap(), batch);

        // A new batch replaces the previous one
        store.save_summaries(&batch[1..]).await.unwrap();
        let reloaded = store.load_summaries().await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].asset_id, "ADA");
    }

    #[tokio::test]
    async fn test_latest_characterization_wins() {
        let store = store().await;
        assert_eq!(store.load_characterization().await.unwrap(), None);

        store
            .save_characterization(MarketCharacterization::Flat, 0.001)
            .await
            .unwrap();
        store
            .save_characterization(MarketCharacterization::Rising, 0.02)
            .await
            .unwrap();

        assert_eq!(
            store.load_characterization().await.unwrap(),
            Some(MarketCharacterization::Rising)
        );
    }

    #[tokio::test]
    async fn test_seed_defaults_once() {
        let store = store().await;
        store.seed_defaults().await.unwrap();
        store.seed_defaults().await.unwrap();

        let thresholds = store.load_thresholds().await.unwrap();
        assert_eq!(thresholds.len(), 5);
        assert!(crate::config::validate_thresholds(&thresholds).is_ok());

        let rising = store
            .load_criteria(MarketCharacterization::Rising)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rising.maximum_number_of_orders, 4);
        assert!(rising.coin_should_be_rising);
    }

    #[tokio::test]
    async fn test_coin_properties() {
        let store = store().await;
        let props = CoinProperties::new("CRO".to_string(), 0.001, 3, 0.00001, 5).unwrap();
        store.save_coin_properties(&props).await.unwrap();

        assert_eq!(store.load_coin_properties("CRO").await.unwrap(), Some(props));
        assert_eq!(store.load_coin_properties("BTC").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_sale_closes_buy_order_once() {
        let store = store().await;
        let order = BuyOrder::new("buy-1".to_string(), "CRO".to_string(), 0.1);
        store.create_buy_order(&order).await.unwrap();
        assert_eq!(store.open_buy_orders().await.unwrap(), vec![order]);

        let sale = store.record_sale("buy-1", "sell-1").await.unwrap();
        assert_eq!(sale.buy_order_id, "buy-1");
        assert!(store.open_buy_orders().await.unwrap().is_empty());

        let closed = store.find_buy_order("buy-1").await.unwrap().unwrap();
        assert_eq!(closed.sell_order_id.as_deref(), Some("sell-1"));

        let second = store.record_sale("buy-1", "sell-2").await;
        assert!(matches!(
            second,
            Err(StoreError::Order(OrderError::AlreadySold { .. }))
        ));

        let (sales,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sell_orders")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(sales, 1);
    }

    #[tokio::test]
    async fn test_record_sale_unknown_order() {
        let store = store().await;
        let result = store.record_sale("missing", "sell-1").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_only_unsold_orders() {
        let store = store().await;
        for id in ["buy-1", "buy-2", "buy-3"] {
            store
                .create_buy_order(&BuyOrder::new(id.to_string(), "CRO".to_string(), 0.1))
                .await
                .unwrap();
        }
        store.record_sale("buy-2", "sell-2").await.unwrap();

        let deleted = store
            .delete_buy_orders(&["buy-1".to_string(), "buy-2".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let open: Vec<String> = store
            .open_buy_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.buy_order_id)
            .collect();
        assert_eq!(open, vec!["buy-3".to_string()]);
        assert!(store.find_buy_order("buy-2").await.unwrap().is_some());
    }
}
