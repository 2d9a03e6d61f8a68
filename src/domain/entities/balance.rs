//! Balance entity - coin holdings as reported by the exchange wallet

use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;

/// Holdings of one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBalance {
    pub coin_name: String,
    /// Total quantity held
    pub quantity: f64,
    /// Quantity locked in open orders
    pub reserved_quantity: f64,
}

impl PositionBalance {
    /// Create a new PositionBalance with validation
    ///
    /// # Arguments
    /// * `coin_name` - Coin symbol (e.g. "BTC")
    /// * `quantity` - Total quantity held (>= 0)
    /// * `reserved_quantity` - Quantity locked in open orders (>= 0)
    pub fn new(
        coin_name: String,
        quantity: f64,
        reserved_quantity: f64,
    ) -> Result<Self, ValidationError> {
        if !quantity.is_finite() || !reserved_quantity.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if quantity < 0.0 || reserved_quantity < 0.0 {
            return Err(ValidationError::MustBeNonNegative);
        }

        Ok(Self {
            coin_name,
            quantity,
            reserved_quantity,
        })
    }

    /// Quantity free to sell right now
    pub fn sellable_quantity(&self) -> f64 {
        (self.quantity - self.reserved_quantity).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0.0
    }
}

/// Find the balance for a coin in a wallet listing
pub fn find_balance<'a>(
    balances: &'a [PositionBalance],
    coin_name: &str,
) -> Option<&'a PositionBalance> {
    balances
        .iter()
        .find(|balance| balance.coin_name.eq_ignore_ascii_case(coin_name))
}
