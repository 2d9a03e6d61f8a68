use std::sync::Arc;

use cointrend::application::services::trading_engine::TradingEngine;
use cointrend::config::{validate_thresholds, EngineConfig};
use cointrend::domain::entities::balance::find_balance;
use cointrend::domain::entities::coin::CoinProperties;
use cointrend::domain::repositories::engine_store::EngineStore;
use cointrend::domain::repositories::market_feed::AccountFeed;
use cointrend::infrastructure::snapshot_feed::SnapshotFeed;
use cointrend::persistence::sqlite_store::SqliteEngineStore;
use cointrend::persistence::{init_database_with, DatabaseConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cointrend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    let db_config = DatabaseConfig::from_env();
    info!(
        snapshot = %config.market_snapshot_path,
        database = %db_config.url,
        quote_currency = %config.quote_currency,
        "Starting cointrend"
    );

    let pool = init_database_with(&db_config).await?;
    let store = Arc::new(SqliteEngineStore::new(pool));
    store.seed_defaults().await?;

    let thresholds = store.load_thresholds().await?;
    if let Err(e) = validate_thresholds(&thresholds) {
        error!(error = %e, "Rating thresholds do not partition the market, refusing to run");
        return Err(e.into());
    }

    let feed = Arc::new(SnapshotFeed::load(&config.market_snapshot_path).await?);
    for props in feed.coin_properties() {
        match CoinProperties::new(
            props.coin_name.clone(),
            props.quantity_tick_size,
            props.quantity_decimals,
            props.price_tick_size,
            props.price_decimals,
        ) {
            Ok(props) => store.save_coin_properties(&props).await?,
            Err(e) => warn!(coin = %props.coin_name, error = %e, "Ignoring invalid coin properties"),
        }
    }

    let engine = TradingEngine::new(config.clone(), feed.clone(), feed.clone(), store.clone());

    let cycle = match engine.run_analysis_cycle().await {
        Ok(cycle) => cycle,
        Err(e) => {
            error!(error = %e, "Analysis cycle failed");
            return Err(e.into());
        }
    };

    let balances = feed.fetch_balances().await?;
    let usd_balance = find_balance(&balances, &config.quote_currency)
        .map(|b| b.sellable_quantity())
        .unwrap_or(0.0);

    for purchase in engine.plan_purchases(&cycle, usd_balance).await? {
        info!(
            asset_id = %purchase.asset_id,
            quantity = %purchase.quantity,
            price = %purchase.price,
            ranking = purchase.ranking,
            "Buy"
        );
    }

    let review = engine
        .review_positions(chrono::Utc::now().timestamp_millis())
        .await?;
    for sale in &review.sales {
        info!(
            asset_id = %sale.asset_id,
            quantity = %sale.quantity,
            price = %sale.price,
            buy_order_id = %sale.buy_order_id,
            value_ratio = sale.value_ratio,
            "Sell"
        );
    }
    engine.purge_abandoned(&review).await?;

    Ok(())
}
