use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::market::MarketCharacterization;

/// Per-asset failures while turning raw samples into a summary.
///
/// These never abort a cycle: the asset is logged and left out of the batch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data for {asset_id}: need {required} samples, have {current}")]
    InsufficientData {
        asset_id: String,
        required: usize,
        current: usize,
    },

    #[error("Degenerate trend input: need at least 2 distinct hour offsets, have {distinct}")]
    DegenerateInput { distinct: usize },

    #[error("Trend offset is zero, cannot normalize against it")]
    ZeroBaseline,
}

/// Cross-sectional failures while rating a batch. Fatal to the cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RatingError {
    #[error("Cannot rate an empty batch of summaries")]
    EmptyBatch,

    #[error("Median change {median} matches several rating bands: {matches:?}")]
    AmbiguousRating {
        median: f64,
        matches: Vec<MarketCharacterization>,
    },

    #[error("Median change {median} matches no rating band")]
    NoRating { median: f64 },

    #[error("Summary for {asset_id} cannot be rated: {reason}")]
    InvalidSummary { asset_id: String, reason: String },
}

/// Failures while building or closing an order.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("Sale of {requested} {coin} exceeds sellable quantity {sellable}")]
    OversellAttempt {
        coin: String,
        requested: String,
        sellable: f64,
    },

    #[error("Invalid order input for {coin}: {reason}")]
    InvalidOrderInput { coin: String, reason: String },

    #[error("Quantity {quantity} of {coin} is below one tick")]
    QuantityBelowTick { coin: String, quantity: f64 },

    #[error("Buy order {buy_order_id} already has sell order {sell_order_id}")]
    AlreadySold {
        buy_order_id: String,
        sell_order_id: String,
    },

    #[error("Cannot represent {0} as a decimal amount")]
    InvalidAmount(String),
}

/// Failures reported by the market or account collaborators.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FeedError {
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Account query failed: {0}")]
    AccountQueryFailed(String),

    #[error("Failed to parse feed payload: {0}")]
    ParseError(String),
}

/// Failures of the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Cycle-level failures surfaced by the trading engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rating(#[from] RatingError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("No selection criteria configured for {0}")]
    MissingCriteria(MarketCharacterization),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid tick size: {0}")]
    InvalidTickSize(String),

    #[error("Value must be non-negative")]
    MustBeNonNegative,

    #[error("Value must be finite")]
    MustBeFinite,
}
