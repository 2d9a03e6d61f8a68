use serde::{Deserialize, Serialize};

use crate::domain::errors::OrderError;

/// Execution status as reported by the exchange, collapsed to what the
/// sale decision needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// FILLED or COMPLETED
    Filled,
    /// CANCELED or CANCELLED
    Canceled,
    /// ACTIVE, PENDING, NEW, REJECTED or EXPIRED
    Active,
    Other,
}

impl OrderStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_uppercase().as_str() {
            "FILLED" | "COMPLETED" => OrderStatus::Filled,
            "CANCELED" | "CANCELLED" => OrderStatus::Canceled,
            "ACTIVE" | "PENDING" | "NEW" | "REJECTED" | "EXPIRED" => OrderStatus::Active,
            _ => OrderStatus::Other,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Active => write!(f, "ACTIVE"),
            OrderStatus::Other => write!(f, "OTHER"),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(status: String) -> Self {
        OrderStatus::parse(&status)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.to_string()
    }
}

/// Exchange-reported execution state of an order. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order_id: String,
    pub status: OrderStatus,
    pub cumulative_quantity: f64,
    pub cumulative_fee: f64,
    pub fee_currency: String,
    /// Total quote-currency value of the filled quantity
    pub order_value: f64,
    pub time_created_ms: i64,
}

impl OrderDetail {
    /// Coin quantity actually received, net of a fee charged in the coin
    pub fn quantity_minus_fee(&self) -> f64 {
        self.cumulative_quantity - self.cumulative_fee
    }

    pub fn fee_charged_in(&self, coin_name: &str) -> bool {
        self.fee_currency.eq_ignore_ascii_case(coin_name)
    }

    /// Quote-currency value paid, net of fees.
    ///
    /// A fee taken in the coin shrinks the position pro rata; a fee taken in
    /// the quote currency comes straight off the value.
    pub fn order_value_minus_fee(&self, coin_name: &str) -> f64 {
        if self.fee_charged_in(coin_name) {
            if self.cumulative_quantity <= 0.0 {
                return 0.0;
            }
            self.order_value * self.quantity_minus_fee() / self.cumulative_quantity
        } else {
            self.order_value - self.cumulative_fee
        }
    }

    pub fn hours_since_created(&self, now_ms: i64) -> f64 {
        (now_ms - self.time_created_ms) as f64 / 3_600_000.0
    }
}

/// Lifecycle of a purchase. `Sold` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyOrderState {
    Open,
    Sold,
}

/// A placed purchase, keyed by the exchange client order id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyOrder {
    pub buy_order_id: String,
    pub coin_name: String,
    pub price_per_coin: f64,
    /// Set once, when the linked sell order is created
    pub sell_order_id: Option<String>,
}

impl BuyOrder {
    pub fn new(buy_order_id: String, coin_name: String, price_per_coin: f64) -> Self {
        Self {
            buy_order_id,
            coin_name,
            price_per_coin,
            sell_order_id: None,
        }
    }

    pub fn state(&self) -> BuyOrderState {
        match self.sell_order_id {
            Some(_) => BuyOrderState::Sold,
            None => BuyOrderState::Open,
        }
    }

    pub fn is_sold(&self) -> bool {
        self.state() == BuyOrderState::Sold
    }

    /// Link a sell order, moving the purchase to `Sold`.
    ///
    /// A purchase can be sold exactly once.
    pub fn close(&mut self, sell_order_id: String) -> Result<SellOrder, OrderError> {
        if let Some(existing) = &self.sell_order_id {
            return Err(OrderError::AlreadySold {
                buy_order_id: self.buy_order_id.clone(),
                sell_order_id: existing.clone(),
            });
        }

        self.sell_order_id = Some(sell_order_id.clone());
        Ok(SellOrder {
            sell_order_id,
            buy_order_id: self.buy_order_id.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellOrder {
    pub sell_order_id: String,
    pub buy_order_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(fee_currency: &str) -> OrderDetail {
        OrderDetail {
            order_id: "buy-1".to_string(),
            status: OrderStatus::Filled,
            cumulative_quantity: 2.0,
            cumulative_fee: 0.02,
            fee_currency: fee_currency.to_string(),
            order_value: 100.0,
            time_created_ms: 0,
        }
    }

    #[test]
    fn test_order_status_parsing() {
        assert_eq!(OrderStatus::parse("FILLED"), OrderStatus::Filled);
        assert_eq!(OrderStatus::parse("completed"), OrderStatus::Filled);
        assert_eq!(OrderStatus::parse("CANCELED"), OrderStatus::Canceled);
        assert_eq!(OrderStatus::parse("CANCELLED"), OrderStatus::Canceled);
        for active in ["ACTIVE", "PENDING", "NEW", "REJECTED", "EXPIRED"] {
            assert_eq!(OrderStatus::parse(active), OrderStatus::Active);
        }
        assert_eq!(OrderStatus::parse("PARTIALLY_FILLED"), OrderStatus::Other);
    }

    #[test]
    fn test_order_status_deserializes_exchange_strings() {
        let status: OrderStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(status, OrderStatus::Filled);
        assert_eq!(serde_json::to_string(&OrderStatus::Canceled).unwrap(), "\"CANCELED\"");
    }

    #[test]
    fn test_order_value_minus_fee_in_coin() {
        let d = detail("CRO");
        // 100 * 1.98 / 2.0
        assert!((d.order_value_minus_fee("CRO") - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_order_value_minus_fee_in_quote_currency() {
        let d = detail("USD");
        assert!((d.order_value_minus_fee("CRO") - 99.98).abs() < 1e-9);
    }

    #[test]
    fn test_hours_since_created() {
        let d = detail("USD");
        assert_eq!(d.hours_since_created(7_200_000), 2.0);
    }

    #[test]
    fn test_buy_order_close_is_one_way() {
        let mut order = BuyOrder::new("buy-1".to_string(), "CRO".to_string(), 0.1);
        assert_eq!(order.state(), BuyOrderState::Open);

        let sell = order.close("sell-1".to_string()).unwrap();
        assert_eq!(sell.buy_order_id, "buy-1");
        assert_eq!(order.state(), BuyOrderState::Sold);

        let second = order.close("sell-2".to_string());
        assert!(matches!(second, Err(OrderError::AlreadySold { .. })));
        assert_eq!(order.sell_order_id.as_deref(), Some("sell-1"));
    }
}
