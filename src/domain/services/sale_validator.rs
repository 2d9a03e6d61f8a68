use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::entities::balance::{find_balance, PositionBalance};
use crate::domain::entities::order::{BuyOrder, OrderDetail, OrderStatus};

/// Reasons a purchase cannot be sold right now. Any flag set blocks the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleEligibility {
    pub no_coin_balance: bool,
    pub already_sold: bool,
    pub order_cancelled: bool,
    pub order_not_filled: bool,
    pub wallet_insufficient: bool,
}

impl SaleEligibility {
    pub fn is_sellable(&self) -> bool {
        !(self.no_coin_balance
            || self.already_sold
            || self.order_cancelled
            || self.order_not_filled
            || self.wallet_insufficient)
    }

    /// A cancelled purchase that never turned into a sale can be dropped
    pub fn eligible_for_deletion(&self) -> bool {
        self.order_cancelled && !self.already_sold
    }
}

/// `0.98 + 0.03^(0.01 h + 1)`: starts just above 1.01 and decays toward 0.98
pub fn minimum_acceptable_value_ratio(hours_since_order: f64) -> f64 {
    0.98 + 0.03_f64.powf(0.01 * hours_since_order + 1.0)
}

/// Gates sales of filled purchases on wallet state and on value
#[derive(Debug, Clone, Default)]
pub struct SaleValidator;

impl SaleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every blocking condition for one purchase
    ///
    /// # Arguments
    /// * `buy_order` - The stored purchase
    /// * `detail` - Its execution state on the exchange
    /// * `balances` - Current wallet listing
    pub fn evaluate(
        &self,
        buy_order: &BuyOrder,
        detail: &OrderDetail,
        balances: &[PositionBalance],
    ) -> SaleEligibility {
        let balance = find_balance(balances, &buy_order.coin_name);

        let wallet_insufficient = match balance {
            Some(balance) => balance.sellable_quantity() < detail.quantity_minus_fee(),
            None => true,
        };

        let eligibility = SaleEligibility {
            no_coin_balance: balance.map_or(true, |b| b.is_empty()),
            already_sold: buy_order.is_sold(),
            order_cancelled: detail.status == OrderStatus::Canceled,
            order_not_filled: detail.status != OrderStatus::Filled,
            wallet_insufficient,
        };

        debug!(
            buy_order_id = %buy_order.buy_order_id,
            coin = %buy_order.coin_name,
            status = %detail.status,
            eligibility = ?eligibility,
            "Evaluated sale eligibility"
        );

        eligibility
    }

    /// `current_market_value / order_value_minus_fee`
    pub fn current_value_ratio(
        &self,
        detail: &OrderDetail,
        coin_name: &str,
        current_market_value: f64,
    ) -> f64 {
        let paid = detail.order_value_minus_fee(coin_name);
        if paid <= 0.0 {
            return 0.0;
        }
        current_market_value / paid
    }

    /// Whether the position is worth selling at `current_market_value`
    pub fn is_valid_for_sale(
        &self,
        detail: &OrderDetail,
        coin_name: &str,
        current_market_value: f64,
        now_ms: i64,
    ) -> bool {
        let ratio = self.current_value_ratio(detail, coin_name, current_market_value);
        let minimum = minimum_acceptable_value_ratio(detail.hours_since_created(now_ms));
        ratio >= minimum
    }
}
