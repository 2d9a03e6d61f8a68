//! Exchange-legal order quantities and prices.
//!
//! Purchases may round the quantity up (the USD balance carries the
//! headroom), sales never do. Zero-decimal coins fall back to whole ticks on
//! both paths.

use bigdecimal::BigDecimal;
use tracing::debug;

use crate::domain::entities::coin::CoinProperties;
use crate::domain::errors::OrderError;
use crate::domain::value_objects::amount::{
    format_plain, fractional_digits, round_down, round_half_up, round_up, to_decimal, to_f64,
    truncate_to_tick,
};

/// Quantity and price ready to submit, with their numeric values
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedOrder {
    pub quantity: String,
    pub price: String,
    pub quantity_value: f64,
    pub price_value: f64,
}

/// Direction of the rounding applied to a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityRounding {
    /// Round up to `quantity_decimals`
    PurchaseDecimal,
    /// Truncate to `quantity_decimals`
    SaleDecimal,
    /// Truncate to a whole multiple of `quantity_tick_size`
    IntegerTick,
}

impl QuantityRounding {
    pub fn for_purchase(props: &CoinProperties) -> Self {
        if props.quantity_decimals > 0 {
            QuantityRounding::PurchaseDecimal
        } else {
            QuantityRounding::IntegerTick
        }
    }

    pub fn for_sale(props: &CoinProperties) -> Self {
        if props.quantity_decimals > 0 {
            QuantityRounding::SaleDecimal
        } else {
            QuantityRounding::IntegerTick
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderQuantizer;

impl OrderQuantizer {
    pub fn new() -> Self {
        Self
    }

    /// Quantity to buy for `notional_usd` at `price_per_coin`
    pub fn purchase_quantity(
        &self,
        props: &CoinProperties,
        notional_usd: f64,
        price_per_coin: f64,
    ) -> Result<BigDecimal, OrderError> {
        let notional = positive_decimal(props, "notional", notional_usd)?;
        let price = positive_decimal(props, "price", price_per_coin)?;
        let absolute = notional / price;

        self.apply(props, &absolute, QuantityRounding::for_purchase(props))
    }

    /// Largest legal quantity not above `held_quantity`
    pub fn sale_quantity(
        &self,
        props: &CoinProperties,
        held_quantity: f64,
    ) -> Result<BigDecimal, OrderError> {
        let held = positive_decimal(props, "quantity", held_quantity)?;
        self.apply(props, &held, QuantityRounding::for_sale(props))
    }

    /// Round half up to `price_decimals`
    pub fn quantize_price(
        &self,
        props: &CoinProperties,
        price: f64,
    ) -> Result<BigDecimal, OrderError> {
        let price = positive_decimal(props, "price", price)?;
        Ok(round_half_up(&price, props.price_decimals))
    }

    pub fn apply(
        &self,
        props: &CoinProperties,
        quantity: &BigDecimal,
        rounding: QuantityRounding,
    ) -> Result<BigDecimal, OrderError> {
        Ok(match rounding {
            QuantityRounding::PurchaseDecimal => round_up(quantity, props.quantity_decimals),
            QuantityRounding::SaleDecimal => round_down(quantity, props.quantity_decimals),
            QuantityRounding::IntegerTick => {
                let tick = to_decimal(props.quantity_tick_size)?;
                truncate_to_tick(quantity, &tick)
            }
        })
    }

    /// Buy order for `notional_usd` worth of the coin
    pub fn quantize_purchase(
        &self,
        props: &CoinProperties,
        notional_usd: f64,
        price_per_coin: f64,
    ) -> Result<QuantizedOrder, OrderError> {
        let quantity = self.purchase_quantity(props, notional_usd, price_per_coin)?;
        if quantity <= BigDecimal::from(0) {
            return Err(OrderError::QuantityBelowTick {
                coin: props.coin_name.clone(),
                quantity: notional_usd / price_per_coin,
            });
        }
        let price = self.quantize_price(props, price_per_coin)?;

        Ok(self.finish(props, &quantity, &price))
    }

    /// Sell order for `quantity` at `price_per_coin`.
    ///
    /// The quantized amount must fit within `sellable_quantity`; it is never
    /// reduced to make it fit.
    pub fn quantize_sale(
        &self,
        props: &CoinProperties,
        quantity: f64,
        price_per_coin: f64,
        sellable_quantity: f64,
    ) -> Result<QuantizedOrder, OrderError> {
        let held = positive_decimal(props, "quantity", quantity)?;
        let sale = self.checked_sale_quantity(props, &held, sellable_quantity)?;
        let price = self.quantize_price(props, price_per_coin)?;

        Ok(self.finish(props, &sale, &price))
    }

    /// Sell order for a filled purchase whose fee was taken from the coin.
    ///
    /// `fee_in_coin` comes off `cumulative_quantity` first. The net amount is
    /// quantized down and the price is re-derived so the adjusted quantity
    /// carries its pro rata share of `current_market_value`.
    pub fn quantize_fee_corrected_sale(
        &self,
        props: &CoinProperties,
        cumulative_quantity: f64,
        fee_in_coin: f64,
        current_market_value: f64,
        sellable_quantity: f64,
    ) -> Result<QuantizedOrder, OrderError> {
        let cumulative = positive_decimal(props, "cumulative quantity", cumulative_quantity)?;
        if !fee_in_coin.is_finite() || fee_in_coin < 0.0 {
            return Err(OrderError::InvalidOrderInput {
                coin: props.coin_name.clone(),
                reason: format!("fee must be non-negative, got {}", fee_in_coin),
            });
        }
        let net = cumulative - to_decimal(fee_in_coin)?;
        if net <= BigDecimal::from(0) {
            return Err(OrderError::InvalidOrderInput {
                coin: props.coin_name.clone(),
                reason: format!(
                    "fee {} consumes the whole quantity {}",
                    fee_in_coin, cumulative_quantity
                ),
            });
        }

        let adjusted = self.checked_sale_quantity(props, &net, sellable_quantity)?;
        let original_quantity = to_f64(&net);
        let adjusted_quantity = to_f64(&adjusted);

        if !current_market_value.is_finite() || current_market_value <= 0.0 {
            return Err(OrderError::InvalidOrderInput {
                coin: props.coin_name.clone(),
                reason: format!("market value must be positive, got {}", current_market_value),
            });
        }

        let adjusted_price =
            (adjusted_quantity / original_quantity) * current_market_value / adjusted_quantity;
        let price = self.quantize_price(props, adjusted_price)?;

        debug!(
            coin = %props.coin_name,
            original_quantity = original_quantity,
            adjusted_quantity = adjusted_quantity,
            adjusted_price = adjusted_price,
            "Fee-corrected sale"
        );

        Ok(self.finish(props, &adjusted, &price))
    }

    fn checked_sale_quantity(
        &self,
        props: &CoinProperties,
        held: &BigDecimal,
        sellable_quantity: f64,
    ) -> Result<BigDecimal, OrderError> {
        let sale = self.apply(props, held, QuantityRounding::for_sale(props))?;
        if sale <= BigDecimal::from(0) {
            return Err(OrderError::QuantityBelowTick {
                coin: props.coin_name.clone(),
                quantity: to_f64(held),
            });
        }

        let sellable = to_decimal(sellable_quantity)?;
        if sale > sellable {
            return Err(OrderError::OversellAttempt {
                coin: props.coin_name.clone(),
                requested: self.format_quantity(props, &sale),
                sellable: sellable_quantity,
            });
        }

        Ok(sale)
    }

    /// Quantity text at the precision the coin trades in
    pub fn format_quantity(&self, props: &CoinProperties, quantity: &BigDecimal) -> String {
        let tick_digits = to_decimal(props.quantity_tick_size)
            .map(|tick| fractional_digits(&tick))
            .unwrap_or(0);
        format_plain(quantity, props.quantity_decimals.max(tick_digits))
    }

    pub fn format_price(&self, props: &CoinProperties, price: &BigDecimal) -> String {
        format_plain(price, props.price_decimals)
    }

    fn finish(
        &self,
        props: &CoinProperties,
        quantity: &BigDecimal,
        price: &BigDecimal,
    ) -> QuantizedOrder {
        QuantizedOrder {
            quantity: self.format_quantity(props, quantity),
            price: self.format_price(props, price),
            quantity_value: to_f64(quantity),
            price_value: to_f64(price),
        }
    }
}

fn positive_decimal(
    props: &CoinProperties,
    field: &str,
    value: f64,
) -> Result<BigDecimal, OrderError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(OrderError::InvalidOrderInput {
            coin: props.coin_name.clone(),
            reason: format!("{} must be positive, got {}", field, value),
        });
    }
    to_decimal(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cents() -> CoinProperties {
        CoinProperties::new("CRO".to_string(), 0.01, 2, 0.01, 2).unwrap()
    }

    fn hundreds() -> CoinProperties {
        CoinProperties::new("SHIB".to_string(), 100.0, 0, 0.00000001, 8).unwrap()
    }

    #[test]
    fn test_sale_keeps_exact_quantity_and_formats_price() {
        let order = OrderQuantizer::new()
            .quantize_sale(&cents(), 0.75, 8.0, 10.0)
            .unwrap();
        assert_eq!(order.quantity, "0.75");
        assert_eq!(order.price, "8.0");
    }

    #[test]
    fn test_zero_decimal_sale_truncates_to_tick() {
        let order = OrderQuantizer::new()
            .quantize_sale(&hundreds(), 765432.1, 0.00001, 1_000_000.0)
            .unwrap();
        assert_eq!(order.quantity, "765400");
        assert_eq!(order.quantity_value, 765400.0);
        assert_eq!(order.price, "0.00001");
    }

    #[test]
    fn test_sale_never_rounds_up() {
        let quantizer = OrderQuantizer::new();
        for held in [0.019, 0.299, 1.0, 3.14159, 12.345] {
            let sale = quantizer.sale_quantity(&cents(), held).unwrap();
            assert!(to_f64(&sale) <= held, "{} rounded up", held);
        }
        // 0.29 must not floor to 0.28
        assert_eq!(
            quantizer.quantize_sale(&cents(), 0.29, 1.0, 1.0).unwrap().quantity,
            "0.29"
        );
    }

    #[test]
    fn test_purchase_rounds_up_with_decimals() {
        let quantizer = OrderQuantizer::new();
        // 50 / 3 = 16.666..., rounded up
        let order = quantizer.quantize_purchase(&cents(), 50.0, 3.0).unwrap();
        assert_eq!(order.quantity, "16.67");
        assert_eq!(order.price, "3.0");
    }

    #[test]
    fn test_purchase_is_tick_multiple_without_decimals() {
        let quantizer = OrderQuantizer::new();
        let quantity = quantizer
            .purchase_quantity(&hundreds(), 50.0, 0.0000123)
            .unwrap();
        let tick = to_decimal(100.0).unwrap();
        assert_eq!(quantity.clone() % tick, BigDecimal::from(0));
        assert!(to_f64(&quantity) <= 50.0 / 0.0000123);
    }

    #[test]
    fn test_rounding_policy_branches() {
        assert_eq!(
            QuantityRounding::for_purchase(&cents()),
            QuantityRounding::PurchaseDecimal
        );
        assert_eq!(
            QuantityRounding::for_sale(&cents()),
            QuantityRounding::SaleDecimal
        );
        assert_eq!(
            QuantityRounding::for_purchase(&hundreds()),
            QuantityRounding::IntegerTick
        );
        assert_eq!(
            QuantityRounding::for_sale(&hundreds()),
            QuantityRounding::IntegerTick
        );
    }

    #[test]
    fn test_price_rounds_half_up() {
        let quantizer = OrderQuantizer::new();
        let price = quantizer.quantize_price(&cents(), 8.125).unwrap();
        assert_eq!(quantizer.format_price(&cents(), &price), "8.13");
    }

    #[test]
    fn test_oversell_is_rejected_not_clamped() {
        let result = OrderQuantizer::new().quantize_sale(&cents(), 2.0, 1.0, 1.5);
        assert_eq!(
            result,
            Err(OrderError::OversellAttempt {
                coin: "CRO".to_string(),
                requested: "2.0".to_string(),
                sellable: 1.5,
            })
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let quantizer = OrderQuantizer::new();
        assert!(matches!(
            quantizer.quantize_sale(&cents(), 0.0, 1.0, 1.0),
            Err(OrderError::InvalidOrderInput { .. })
        ));
        assert!(matches!(
            quantizer.quantize_purchase(&cents(), 50.0, 0.0),
            Err(OrderError::InvalidOrderInput { .. })
        ));
        assert!(matches!(
            quantizer.quantize_sale(&cents(), f64::NAN, 1.0, 1.0),
            Err(OrderError::InvalidOrderInput { .. })
        ));
    }

    #[test]
    fn test_sale_below_one_tick() {
        let result = OrderQuantizer::new().quantize_sale(&hundreds(), 99.0, 1.0, 1_000.0);
        assert!(matches!(result, Err(OrderError::QuantityBelowTick { .. })));
    }

    #[test]
    fn test_fee_corrected_sale_keeps_proceeds_proportional() {
        let quantizer = OrderQuantizer::new();
        // bought 10.0, fee 0.015 in coin -> 9.985 net -> 9.98 sellable
        // market value of the net amount is 9.985 * 2.0
        let order = quantizer
            .quantize_fee_corrected_sale(&cents(), 10.0, 0.015, 9.985 * 2.0, 10.0)
            .unwrap();
        assert_eq!(order.quantity, "9.98");
        assert_eq!(order.price, "2.0");
    }

    #[test]
    fn test_fee_corrected_sale_subtracts_fee_exactly() {
        // 0.3 - 0.1 in f64 is 0.19999999999999998
        let order = OrderQuantizer::new()
            .quantize_fee_corrected_sale(&cents(), 0.3, 0.1, 1.0, 1.0)
            .unwrap();
        assert_eq!(order.quantity, "0.2");
        assert_eq!(order.price, "5.0");
    }

    #[test]
    fn test_fee_corrected_sale_rejects_fee_covering_quantity() {
        let quantizer = OrderQuantizer::new();
        assert!(matches!(
            quantizer.quantize_fee_corrected_sale(&cents(), 0.1, 0.1, 1.0, 1.0),
            Err(OrderError::InvalidOrderInput { .. })
        ));
        assert!(matches!(
            quantizer.quantize_fee_corrected_sale(&cents(), 1.0, -0.1, 1.0, 1.0),
            Err(OrderError::InvalidOrderInput { .. })
        ));
    }

    #[test]
    fn test_fee_corrected_sale_respects_wallet() {
        let result =
            OrderQuantizer::new().quantize_fee_corrected_sale(&cents(), 10.0, 0.0, 20.0, 9.0);
        assert!(matches!(result, Err(OrderError::OversellAttempt { .. })));
    }
}
