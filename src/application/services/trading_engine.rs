//! One trading cycle: analyse the market, plan purchases, review positions.
//!
//! Domain services stay synchronous; this layer owns the collaborator I/O.
//! A failed fetch aborts the whole cycle so classification and rating never
//! run on a partial batch.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::entities::balance::find_balance;
use crate::domain::entities::coin::Ticker;
use crate::domain::entities::market::MarketCharacterization;
use crate::domain::entities::order::{BuyOrder, SellOrder};
use crate::domain::entities::time_series::TimeSeriesSummary;
use crate::domain::errors::{EngineError, OrderError};
use crate::domain::repositories::engine_store::EngineStore;
use crate::domain::repositories::market_feed::{AccountFeed, MarketDataFeed};
use crate::domain::services::coin_ranker::CoinRanker;
use crate::domain::services::market_rating::MarketRatingEngine;
use crate::domain::services::order_quantizer::OrderQuantizer;
use crate::domain::services::outlier_classifier::OutlierClassifier;
use crate::domain::services::sale_validator::SaleValidator;
use crate::domain::services::time_series_summarizer::TimeSeriesSummarizer;
use crate::domain::value_objects::order_instruction::{PurchaseInstruction, SaleInstruction};

/// Result of one analysis cycle
#[derive(Debug, Clone)]
pub struct AnalysisCycle {
    pub characterization: MarketCharacterization,
    pub median_change: f64,
    /// Classified batch, ranking still 0
    pub summaries: Vec<TimeSeriesSummary>,
    pub tickers: Vec<Ticker>,
}

impl AnalysisCycle {
    pub fn ticker(&self, asset_id: &str) -> Option<&Ticker> {
        self.tickers.iter().find(|t| t.asset_id == asset_id)
    }
}

/// Outcome of reviewing every open purchase
#[derive(Debug, Clone, Default)]
pub struct PositionReview {
    pub sales: Vec<SaleInstruction>,
    /// Cancelled purchases that were never sold
    pub abandoned: Vec<String>,
    /// Open purchases left untouched this time
    pub held: Vec<String>,
}

pub struct TradingEngine<M: ?Sized, A: ?Sized, S: ?Sized> {
    config: EngineConfig,
    market: Arc<M>,
    account: Arc<A>,
    store: Arc<S>,
    summarizer: TimeSeriesSummarizer,
    classifier: OutlierClassifier,
    rating: MarketRatingEngine,
    ranker: CoinRanker,
    quantizer: OrderQuantizer,
    validator: SaleValidator,
}

impl<M, A, S> TradingEngine<M, A, S>
where
    M: MarketDataFeed + ?Sized,
    A: AccountFeed + ?Sized,
    S: EngineStore + ?Sized,
{
    pub fn new(config: EngineConfig, market: Arc<M>, account: Arc<A>, store: Arc<S>) -> Self {
        Self {
            summarizer: config.summarizer(),
            classifier: OutlierClassifier::new(),
            rating: config.rating_engine(),
            ranker: config.ranker(),
            quantizer: OrderQuantizer::new(),
            validator: SaleValidator::new(),
            config,
            market,
            account,
            store,
        }
    }

    /// Fetch the whole market, summarize, classify, rate and persist
    pub async fn run_analysis_cycle(&self) -> Result<AnalysisCycle, EngineError> {
        let tickers = self.market.fetch_tickers().await?;

        let mut series = Vec::with_capacity(tickers.len());
        for ticker in &tickers {
            let samples = self.market.fetch_time_series(&ticker.asset_id).await?;
            series.push((ticker.asset_id.clone(), samples));
        }

        let mut summaries = self.summarizer.summarize_batch(
            series
                .iter()
                .map(|(asset_id, samples)| (asset_id.as_str(), samples.as_slice())),
        );
        self.classifier.classify(&mut summaries);

        let thresholds = self.store.load_thresholds().await?;
        let rating = self.rating.rate(&summaries, &thresholds)?;

        self.store.save_summaries(&summaries).await?;
        self.store
            .save_characterization(rating.characterization, rating.median_change)
            .await?;

        info!(
            assets = tickers.len(),
            summarized = summaries.len(),
            "Analysis cycle complete"
        );

        Ok(AnalysisCycle {
            characterization: rating.characterization,
            median_change: rating.median_change,
            summaries,
            tickers,
        })
    }

    /// Rank the cycle's coins for its tier and size one purchase per slot
    pub async fn plan_purchases(
        &self,
        cycle: &AnalysisCycle,
        usd_balance: f64,
    ) -> Result<Vec<PurchaseInstruction>, EngineError> {
        let criteria = self
            .store
            .load_criteria(cycle.characterization)
            .await?
            .ok_or(EngineError::MissingCriteria(cycle.characterization))?;

        let mut ranked = cycle.summaries.clone();
        self.ranker.rank(&mut ranked, &criteria);
        self.store.save_summaries(&ranked).await?;

        let notional = self.config.investment_increment_usd;
        if notional < criteria.minimum_order_value_usd {
            warn!(
                notional = notional,
                minimum_order_value_usd = criteria.minimum_order_value_usd,
                "Investment increment below the tier's minimum order value, buying nothing"
            );
            return Ok(Vec::new());
        }

        let mut purchases = Vec::new();
        for candidate in self.ranker.select(ranked, &criteria, usd_balance) {
            let Some(ticker) = cycle.ticker(&candidate.asset_id) else {
                debug!(asset_id = %candidate.asset_id, "No ticker, skipping purchase");
                continue;
            };
            let Some(props) = self.store.load_coin_properties(&candidate.asset_id).await? else {
                debug!(asset_id = %candidate.asset_id, "No coin properties, skipping purchase");
                continue;
            };

            match self
                .quantizer
                .quantize_purchase(&props, notional, ticker.latest_price)
            {
                Ok(order) => purchases.push(PurchaseInstruction {
                    asset_id: candidate.asset_id.clone(),
                    quantity: order.quantity,
                    price: order.price,
                    ranking: candidate.ranking,
                }),
                Err(e) => {
                    warn!(asset_id = %candidate.asset_id, error = %e, "Purchase rejected");
                }
            }
        }

        info!(
            characterization = %cycle.characterization,
            usd_balance = usd_balance,
            purchases = purchases.len(),
            "Purchase plan ready"
        );

        Ok(purchases)
    }

    /// Remember a purchase the exchange accepted under `buy_order_id`
    pub async fn record_purchase(
        &self,
        purchase: &PurchaseInstruction,
        buy_order_id: &str,
    ) -> Result<BuyOrder, EngineError> {
        let price_per_coin = purchase
            .price
            .parse::<f64>()
            .map_err(|_| OrderError::InvalidAmount(purchase.price.clone()))?;
        let order = BuyOrder::new(
            buy_order_id.to_string(),
            purchase.asset_id.clone(),
            price_per_coin,
        );
        self.store.create_buy_order(&order).await?;
        Ok(order)
    }

    /// Decide, for every open purchase, whether to sell, drop or keep it
    pub async fn review_positions(&self, now_ms: i64) -> Result<PositionReview, EngineError> {
        let open_orders = self.store.open_buy_orders().await?;
        if open_orders.is_empty() {
            return Ok(PositionReview::default());
        }

        let balances = self.account.fetch_balances().await?;
        let prices: HashMap<String, f64> = self
            .market
            .fetch_tickers()
            .await?
            .into_iter()
            .map(|t| (t.asset_id, t.latest_price))
            .collect();

        let mut review = PositionReview::default();
        for order in open_orders {
            let detail = match self.account.fetch_order_detail(&order.buy_order_id).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!(
                        buy_order_id = %order.buy_order_id,
                        error = %e,
                        "Order detail unavailable, holding"
                    );
                    review.held.push(order.buy_order_id);
                    continue;
                }
            };
            let eligibility = self.validator.evaluate(&order, &detail, &balances);

            if eligibility.eligible_for_deletion() {
                review.abandoned.push(order.buy_order_id);
                continue;
            }
            if !eligibility.is_sellable() {
                review.held.push(order.buy_order_id);
                continue;
            }

            let (Some(price), Some(props)) = (
                prices.get(&order.coin_name),
                self.store.load_coin_properties(&order.coin_name).await?,
            ) else {
                debug!(coin = %order.coin_name, "No price or coin properties, holding");
                review.held.push(order.buy_order_id);
                continue;
            };

            let fee_in_coin = if detail.fee_charged_in(&order.coin_name) {
                detail.cumulative_fee
            } else {
                0.0
            };
            let market_value = price * (detail.cumulative_quantity - fee_in_coin);

            if !self
                .validator
                .is_valid_for_sale(&detail, &order.coin_name, market_value, now_ms)
            {
                review.held.push(order.buy_order_id);
                continue;
            }

            let sellable = find_balance(&balances, &order.coin_name)
                .map(|b| b.sellable_quantity())
                .unwrap_or(0.0);

            match self.quantizer.quantize_fee_corrected_sale(
                &props,
                detail.cumulative_quantity,
                fee_in_coin,
                market_value,
                sellable,
            ) {
                Ok(sale) => review.sales.push(SaleInstruction {
                    asset_id: order.coin_name.clone(),
                    quantity: sale.quantity,
                    price: sale.price,
                    value_ratio: self.validator.current_value_ratio(
                        &detail,
                        &order.coin_name,
                        market_value,
                    ),
                    buy_order_id: order.buy_order_id,
                }),
                Err(e) => {
                    warn!(buy_order_id = %order.buy_order_id, error = %e, "Sale rejected");
                    review.held.push(order.buy_order_id);
                }
            }
        }

        info!(
            sales = review.sales.len(),
            abandoned = review.abandoned.len(),
            held = review.held.len(),
            "Position review complete"
        );

        Ok(review)
    }

    /// Link the placed sell order to its purchase
    pub async fn record_sale(
        &self,
        buy_order_id: &str,
        sell_order_id: &str,
    ) -> Result<SellOrder, EngineError> {
        Ok(self.store.record_sale(buy_order_id, sell_order_id).await?)
    }

    /// Drop the purchases the review found abandoned
    pub async fn purge_abandoned(&self, review: &PositionReview) -> Result<u64, EngineError> {
        if review.abandoned.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.delete_buy_orders(&review.abandoned).await?;
        info!(deleted = deleted, "Purged abandoned buy orders");
        Ok(deleted)
    }
}
