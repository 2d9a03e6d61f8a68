//! Market and account feed backed by a recorded JSON snapshot.
//!
//! The snapshot mirrors exchange payloads: account and order amounts arrive
//! as strings and are parsed here, the way a live client would.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::entities::balance::PositionBalance;
use crate::domain::entities::coin::{CoinProperties, Ticker};
use crate::domain::entities::order::{OrderDetail, OrderStatus};
use crate::domain::entities::time_series::PricePoint;
use crate::domain::errors::FeedError;
use crate::domain::repositories::market_feed::{AccountFeed, FeedResult, MarketDataFeed};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTicker {
    pub instrument_name: String,
    pub latest_trade_price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSample {
    pub t: i64,
    pub v: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAccount {
    pub currency: String,
    pub balance: String,
    pub hold: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOrder {
    pub client_oid: String,
    pub status: String,
    pub cumulative_quantity: String,
    pub cumulative_fee: String,
    pub fee_currency: String,
    pub cumulative_value: String,
    pub create_time: i64,
}

/// Whole snapshot file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub tickers: Vec<SnapshotTicker>,
    /// Samples per asset, most recent first
    #[serde(default)]
    pub series: BTreeMap<String, Vec<SnapshotSample>>,
    #[serde(default)]
    pub accounts: Vec<SnapshotAccount>,
    #[serde(default)]
    pub orders: Vec<SnapshotOrder>,
    #[serde(default)]
    pub coin_properties: Vec<CoinProperties>,
}

pub struct SnapshotFeed {
    snapshot: MarketSnapshot,
}

impl SnapshotFeed {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json(json: &str) -> FeedResult<Self> {
        let snapshot: MarketSnapshot =
            serde_json::from_str(json).map_err(|e| FeedError::ParseError(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    /// Read a snapshot file
    pub async fn load(path: impl AsRef<Path>) -> FeedResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            FeedError::MarketDataUnavailable(format!("{}: {}", path.display(), e))
        })?;

        let feed = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            tickers = feed.snapshot.tickers.len(),
            series = feed.snapshot.series.len(),
            orders = feed.snapshot.orders.len(),
            "Loaded market snapshot"
        );
        Ok(feed)
    }

    /// Exchange trading rules shipped with the snapshot
    pub fn coin_properties(&self) -> &[CoinProperties] {
        &self.snapshot.coin_properties
    }
}

fn parse_amount(field: &str, raw: &str) -> FeedResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| FeedError::ParseError(format!("{} '{}': {}", field, raw, e)))
}

#[async_trait]
impl MarketDataFeed for SnapshotFeed {
    async fn fetch_tickers(&self) -> FeedResult<Vec<Ticker>> {
        Ok(self
            .snapshot
            .tickers
            .iter()
            .map(|t| Ticker {
                asset_id: t.instrument_name.clone(),
                latest_price: t.latest_trade_price,
                pct_change_24h: t.change_24h,
                volume_24h: t.volume_24h,
            })
            .collect())
    }

    async fn fetch_time_series(&self, asset_id: &str) -> FeedResult<Vec<PricePoint>> {
        let samples = self
            .snapshot
            .series
            .get(asset_id)
            .ok_or_else(|| FeedError::UnknownAsset(asset_id.to_string()))?;

        debug!(asset_id = %asset_id, samples = samples.len(), "Fetched time series");
        Ok(samples.iter().map(|s| PricePoint::new(s.t, s.v)).collect())
    }
}

#[async_trait]
impl AccountFeed for SnapshotFeed {
    async fn fetch_balances(&self) -> FeedResult<Vec<PositionBalance>> {
        self.snapshot
            .accounts
            .iter()
            .map(|account| {
                let quantity = parse_amount("balance", &account.balance)?;
                let reserved = parse_amount("hold", &account.hold)?;
                PositionBalance::new(account.currency.clone(), quantity, reserved).map_err(|e| {
                    FeedError::AccountQueryFailed(format!("{}: {}", account.currency, e))
                })
            })
            .collect()
    }

    async fn fetch_order_detail(&self, order_id: &str) -> FeedResult<OrderDetail> {
        let order = self
            .snapshot
            .orders
            .iter()
            .find(|o| o.client_oid == order_id)
            .ok_or_else(|| FeedError::UnknownOrder(order_id.to_string()))?;

        Ok(OrderDetail {
            order_id: order.client_oid.clone(),
            status: OrderStatus::parse(&order.status),
            cumulative_quantity: parse_amount("cumulative_quantity", &order.cumulative_quantity)?,
            cumulative_fee: parse_amount("cumulative_fee", &order.cumulative_fee)?,
            fee_currency: order.fee_currency.clone(),
            order_value: parse_amount("cumulative_value", &order.cumulative_value)?,
            time_created_ms: order.create_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "tickers": [
            {"instrument_name": "CRO", "latest_trade_price": 0.12, "change_24h": 0.03, "volume_24h": 1500000.0}
        ],
        "series": {
            "CRO": [{"t": 7200000, "v": 0.12}, {"t": 3600000, "v": 0.11}, {"t": 0, "v": 0.1}]
        },
        "accounts": [
            {"currency": "CRO", "balance": "500.5", "hold": "0.5"}
        ],
        "orders": [
            {
                "client_oid": "buy-1",
                "status": "FILLED",
                "cumulative_quantity": "500",
                "cumulative_fee": "0.5",
                "fee_currency": "CRO",
                "cumulative_value": "50",
                "create_time": 0
            }
        ],
        "coin_properties": [
            {"coin_name": "CRO", "quantity_tick_size": 0.001, "quantity_decimals": 3, "price_tick_size": 0.00001, "price_decimals": 5}
        ]
    }"#;

    #[tokio::test]
    async fn test_market_data_from_snapshot() {
        let feed = SnapshotFeed::from_json(SNAPSHOT).unwrap();

        let tickers = feed.fetch_tickers().await.unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].asset_id, "CRO");
        assert_eq!(tickers[0].latest_price, 0.12);

        let series = feed.fetch_time_series("CRO").await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0], PricePoint::new(7_200_000, 0.12));

        assert!(matches!(
            feed.fetch_time_series("BTC").await,
            Err(FeedError::UnknownAsset(_))
        ));
        assert_eq!(feed.coin_properties()[0].quantity_decimals, 3);
    }

    #[tokio::test]
    async fn test_account_data_is_parsed() {
        let feed = SnapshotFeed::from_json(SNAPSHOT).unwrap();

        let balances = feed.fetch_balances().await.unwrap();
        assert_eq!(balances[0].sellable_quantity(), 500.0);

        let detail = feed.fetch_order_detail("buy-1").await.unwrap();
        assert_eq!(detail.status, OrderStatus::Filled);
        assert_eq!(detail.quantity_minus_fee(), 499.5);

        assert!(matches!(
            feed.fetch_order_detail("nope").await,
            Err(FeedError::UnknownOrder(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_amount_is_a_parse_error() {
        let json = r#"{"accounts": [{"currency": "CRO", "balance": "lots", "hold": "0"}]}"#;
        let feed = SnapshotFeed::from_json(json).unwrap();
        assert!(matches!(
            feed.fetch_balances().await,
            Err(FeedError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let feed = SnapshotFeed::load(file.path()).await.unwrap();
        assert_eq!(feed.fetch_tickers().await.unwrap().len(), 1);

        assert!(matches!(
            SnapshotFeed::load("/nonexistent/snapshot.json").await,
            Err(FeedError::MarketDataUnavailable(_))
        ));
    }

    #[test]
    fn test_malformed_snapshot() {
        assert!(matches!(
            SnapshotFeed::from_json("{not json"),
            Err(FeedError::ParseError(_))
        ));
    }
}
