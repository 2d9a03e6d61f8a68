//! Exchange-ready instructions emitted by the engine

use serde::{Deserialize, Serialize};

/// Buy `quantity` of `asset_id` at `price`. Both fields are already
/// quantized to the coin's exchange rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseInstruction {
    pub asset_id: String,
    pub quantity: String,
    pub price: String,
    pub ranking: i64,
}

/// Sell the position opened by `buy_order_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleInstruction {
    pub asset_id: String,
    pub quantity: String,
    pub price: String,
    pub buy_order_id: String,
    /// Value ratio observed when the sale was approved
    pub value_ratio: f64,
}
