//! Exact decimal arithmetic for exchange amounts.
//!
//! Floats are converted through their shortest round-trip text so that a value
//! like 0.29 is quantized as 0.29 and not as 0.28999999999999998.

use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::domain::errors::OrderError;

pub fn to_decimal(value: f64) -> Result<BigDecimal, OrderError> {
    if !value.is_finite() {
        return Err(OrderError::InvalidAmount(value.to_string()));
    }
    BigDecimal::from_str(&value.to_string()).map_err(|_| OrderError::InvalidAmount(value.to_string()))
}

pub fn to_f64(value: &BigDecimal) -> f64 {
    format_plain(value, fractional_digits(value))
        .parse::<f64>()
        .unwrap_or(f64::NAN)
}

/// One unit in the last place at `decimals` fractional digits
fn step(decimals: u32) -> BigDecimal {
    BigDecimal::new(1.into(), decimals as i64)
}

/// Number of fractional digits the value carries (0 for integers)
pub fn fractional_digits(value: &BigDecimal) -> u32 {
    let (_, scale) = value.as_bigint_and_exponent();
    scale.max(0) as u32
}

/// Truncate toward zero at `decimals` places
pub fn round_down(value: &BigDecimal, decimals: u32) -> BigDecimal {
    value.with_scale(decimals as i64)
}

/// Round away from zero at `decimals` places (values are non-negative here)
pub fn round_up(value: &BigDecimal, decimals: u32) -> BigDecimal {
    let truncated = value.with_scale(decimals as i64);
    if &truncated < value {
        truncated + step(decimals)
    } else {
        truncated
    }
}

/// Round half up at `decimals` places
pub fn round_half_up(value: &BigDecimal, decimals: u32) -> BigDecimal {
    let half = BigDecimal::new(5.into(), decimals as i64 + 1);
    (value.clone() + half).with_scale(decimals as i64)
}

/// Largest multiple of `tick` not above `value`
pub fn truncate_to_tick(value: &BigDecimal, tick: &BigDecimal) -> BigDecimal {
    let remainder = value.clone() % tick.clone();
    value.clone() - remainder
}

/// Plain positional text at exactly `scale` digits, then trailing zeros
/// dropped while keeping one fractional digit. Scale 0 yields an integer.
pub fn format_plain(value: &BigDecimal, scale: u32) -> String {
    let (digits, _) = value.with_scale(scale as i64).as_bigint_and_exponent();
    let raw = digits.to_string();
    let (sign, raw) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", raw),
    };

    if scale == 0 {
        return format!("{}{}", sign, raw);
    }

    let scale = scale as usize;
    let padded = format!("{:0>width$}", raw, width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    let frac = frac_part.trim_end_matches('0');
    let frac = if frac.is_empty() { "0" } else { frac };
    format!("{}{}.{}", sign, int_part, frac)
}
