//! Persistence Layer
//!
//! SQLite storage for analysis results, engine configuration and the orders
//! placed from them, with async access via sqlx.
//!
//! # Database Schema
//!
//! ## time_series_summaries
//! The latest cycle's batch, one row per asset, in batch order.
//!
//! ## market_characterizations
//! One row per completed cycle: rating and the median change behind it.
//!
//! ## rating_thresholds / coin_selection_criteria
//! One row per market tier.
//!
//! ## coin_properties
//! Exchange tick sizes and precisions per coin.
//!
//! ## buy_orders / sell_orders
//! - buy_orders.sell_order_id: back-link, NULL while the purchase is open
//! - sell_orders.buy_order_id: UNIQUE, at most one sale per purchase

pub mod sqlite_store;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/cointrend.db" or "sqlite::memory:")
///
/// # Returns
/// Database connection pool with every table created
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    init_database_with(&DatabaseConfig {
        url: database_url.to_string(),
        ..DatabaseConfig::default()
    })
    .await
}

/// Initialize the pool from a full configuration
pub async fn init_database_with(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to ":memory:" opens its own empty database
    let pool = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?
    };

    run_migrations(&pool).await?;

    info!("Database initialized");

    Ok(pool)
}

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "time_series_summaries",
        r#"
        CREATE TABLE IF NOT EXISTS time_series_summaries (
            asset_id TEXT PRIMARY KEY,
            batch_position INTEGER NOT NULL,
            mean REAL NOT NULL,
            std REAL NOT NULL,
            percentage_std REAL NOT NULL,
            modes_json TEXT NOT NULL,
            trend_coefficient REAL NOT NULL,
            trend_offset REAL NOT NULL,
            normalized_coefficient REAL NOT NULL,
            normalized_start_value REAL NOT NULL,
            trend_percentage_change REAL NOT NULL,
            trend_state TEXT NOT NULL CHECK(trend_state IN ('RISING', 'FLAT', 'FALLING', 'UNKNOWN')),
            is_volatile BOOLEAN NOT NULL,
            is_outlier_in_gradient BOOLEAN NOT NULL,
            is_outlier_in_offset BOOLEAN NOT NULL,
            is_outlier_in_deviation BOOLEAN NOT NULL,
            dataset_count INTEGER NOT NULL,
            time_offset_ms INTEGER NOT NULL,
            latest_value REAL NOT NULL,
            ranking INTEGER NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "market_characterizations",
        r#"
        CREATE TABLE IF NOT EXISTS market_characterizations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            characterization TEXT NOT NULL,
            median_change REAL NOT NULL,
            recorded_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "rating_thresholds",
        r#"
        CREATE TABLE IF NOT EXISTS rating_thresholds (
            rating TEXT PRIMARY KEY,
            upper_bound REAL NOT NULL,
            upper_unbounded BOOLEAN NOT NULL,
            lower_bound REAL NOT NULL,
            lower_unbounded BOOLEAN NOT NULL
        )
        "#,
    ),
    (
        "coin_selection_criteria",
        r#"
        CREATE TABLE IF NOT EXISTS coin_selection_criteria (
            characterization TEXT PRIMARY KEY,
            coin_should_be_volatile BOOLEAN NOT NULL,
            coin_should_be_nominal BOOLEAN NOT NULL,
            coin_should_be_an_outlier BOOLEAN NOT NULL,
            coin_should_be_rising BOOLEAN NOT NULL,
            coin_should_be_flat BOOLEAN NOT NULL,
            coin_should_be_falling BOOLEAN NOT NULL,
            maximum_number_of_orders INTEGER NOT NULL CHECK(maximum_number_of_orders >= 0),
            minimum_order_value_usd REAL NOT NULL
        )
        "#,
    ),
    (
        "coin_properties",
        r#"
        CREATE TABLE IF NOT EXISTS coin_properties (
            coin_name TEXT PRIMARY KEY,
            quantity_tick_size REAL NOT NULL CHECK(quantity_tick_size > 0),
            quantity_decimals INTEGER NOT NULL CHECK(quantity_decimals >= 0),
            price_tick_size REAL NOT NULL CHECK(price_tick_size > 0),
            price_decimals INTEGER NOT NULL CHECK(price_decimals >= 0)
        )
        "#,
    ),
    (
        "buy_orders",
        r#"
        CREATE TABLE IF NOT EXISTS buy_orders (
            buy_order_id TEXT PRIMARY KEY,
            coin_name TEXT NOT NULL,
            price_per_coin REAL NOT NULL,
            sell_order_id TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "sell_orders",
        r#"
        CREATE TABLE IF NOT EXISTS sell_orders (
            sell_order_id TEXT PRIMARY KEY,
            buy_order_id TEXT NOT NULL UNIQUE,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (buy_order_id) REFERENCES buy_orders(buy_order_id)
        )
        "#,
    ),
];

/// Create every table and index
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    for (table, statement) in MIGRATIONS {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {} table: {}", table, e))
        })?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_buy_orders_open ON buy_orders(sell_order_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("Database migrations completed");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/cointrend.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/cointrend.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("DATABASE_URL").unwrap_or(defaults.url);

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_connections);

        Self {
            url,
            max_connections,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN (
                'time_series_summaries', 'market_characterizations', 'rating_thresholds',
                'coin_selection_criteria', 'coin_properties', 'buy_orders', 'sell_orders'
            )",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 7);
    }

    #[tokio::test]
    async fn test_migrations_are_repeatable() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        assert!(run_migrations(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.db");
        let url = format!("sqlite://{}", path.display());

        let pool = init_database(&url).await.unwrap();
        pool.close().await;

        assert!(path.exists());
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://data/cointrend.db");
        assert_eq!(config.max_connections, 5);
        assert!(!config.is_in_memory());
    }
}
