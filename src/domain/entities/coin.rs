use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;

/// Exchange trading rules for one coin. Governs all quantization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinProperties {
    pub coin_name: String,
    pub quantity_tick_size: f64,
    pub quantity_decimals: u32,
    pub price_tick_size: f64,
    pub price_decimals: u32,
}

impl CoinProperties {
    pub fn new(
        coin_name: String,
        quantity_tick_size: f64,
        quantity_decimals: u32,
        price_tick_size: f64,
        price_decimals: u32,
    ) -> Result<Self, ValidationError> {
        if !quantity_tick_size.is_finite() || !price_tick_size.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if quantity_tick_size <= 0.0 {
            return Err(ValidationError::InvalidTickSize(format!(
                "quantity tick size for {} must be positive, got {}",
                coin_name, quantity_tick_size
            )));
        }
        if price_tick_size <= 0.0 {
            return Err(ValidationError::InvalidTickSize(format!(
                "price tick size for {} must be positive, got {}",
                coin_name, price_tick_size
            )));
        }

        Ok(Self {
            coin_name,
            quantity_tick_size,
            quantity_decimals,
            price_tick_size,
            price_decimals,
        })
    }
}

/// Latest market snapshot for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub asset_id: String,
    pub latest_price: f64,
    pub pct_change_24h: f64,
    pub volume_24h: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_properties_valid() {
        let props = CoinProperties::new("BTC".to_string(), 0.0001, 4, 0.01, 2).unwrap();
        assert_eq!(props.quantity_decimals, 4);
        assert_eq!(props.price_tick_size, 0.01);
    }

    #[test]
    fn test_coin_properties_rejects_zero_tick() {
        let result = CoinProperties::new("BTC".to_string(), 0.0, 4, 0.01, 2);
        assert!(matches!(result, Err(ValidationError::InvalidTickSize(_))));
    }

    #[test]
    fn test_coin_properties_rejects_nan_tick() {
        let result = CoinProperties::new("BTC".to_string(), 1.0, 0, f64::NAN, 2);
        assert!(matches!(result, Err(ValidationError::MustBeFinite)));
    }
}
