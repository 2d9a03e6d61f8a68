use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::entities::time_series::{TimeSeriesSummary, TrendState};

/// Discrete confidence tier describing the whole market for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketCharacterization {
    RisingRapidly,
    Rising,
    Flat,
    Falling,
    FallingRapidly,
}

impl MarketCharacterization {
    pub const ALL: [MarketCharacterization; 5] = [
        MarketCharacterization::RisingRapidly,
        MarketCharacterization::Rising,
        MarketCharacterization::Flat,
        MarketCharacterization::Falling,
        MarketCharacterization::FallingRapidly,
    ];
}

impl fmt::Display for MarketCharacterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketCharacterization::RisingRapidly => write!(f, "RISING_RAPIDLY"),
            MarketCharacterization::Rising => write!(f, "RISING"),
            MarketCharacterization::Flat => write!(f, "FLAT"),
            MarketCharacterization::Falling => write!(f, "FALLING"),
            MarketCharacterization::FallingRapidly => write!(f, "FALLING_RAPIDLY"),
        }
    }
}

impl FromStr for MarketCharacterization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RISING_RAPIDLY" => Ok(MarketCharacterization::RisingRapidly),
            "RISING" => Ok(MarketCharacterization::Rising),
            "FLAT" => Ok(MarketCharacterization::Flat),
            "FALLING" => Ok(MarketCharacterization::Falling),
            "FALLING_RAPIDLY" => Ok(MarketCharacterization::FallingRapidly),
            other => Err(format!("Unknown market characterization: {}", other)),
        }
    }
}

/// One band of the rating partition.
///
/// A band covers `[lower_bound, upper_bound)`; an unbounded side ignores its
/// bound entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingThreshold {
    pub rating: MarketCharacterization,
    pub upper_bound: f64,
    pub upper_unbounded: bool,
    pub lower_bound: f64,
    pub lower_unbounded: bool,
}

impl RatingThreshold {
    pub fn bounded(rating: MarketCharacterization, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            rating,
            upper_bound,
            upper_unbounded: false,
            lower_bound,
            lower_unbounded: false,
        }
    }

    pub fn at_least(rating: MarketCharacterization, lower_bound: f64) -> Self {
        Self {
            rating,
            upper_bound: 0.0,
            upper_unbounded: true,
            lower_bound,
            lower_unbounded: false,
        }
    }

    pub fn below(rating: MarketCharacterization, upper_bound: f64) -> Self {
        Self {
            rating,
            upper_bound,
            upper_unbounded: false,
            lower_bound: 0.0,
            lower_unbounded: true,
        }
    }

    /// Lower bound inclusive, upper bound exclusive
    pub fn contains(&self, value: f64) -> bool {
        let above_lower = self.lower_unbounded || value >= self.lower_bound;
        let below_upper = self.upper_unbounded || value < self.upper_bound;
        above_lower && below_upper
    }
}

/// What a market tier wants from the coins it buys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSelectionCriteria {
    pub characterization: MarketCharacterization,
    pub coin_should_be_volatile: bool,
    /// Prefer coins moving with the pack (not a gradient outlier)
    pub coin_should_be_nominal: bool,
    pub coin_should_be_an_outlier: bool,
    pub coin_should_be_rising: bool,
    pub coin_should_be_flat: bool,
    pub coin_should_be_falling: bool,
    pub maximum_number_of_orders: usize,
    pub minimum_order_value_usd: f64,
}

impl CoinSelectionCriteria {
    pub fn wants_trend(&self, state: TrendState) -> bool {
        match state {
            TrendState::Rising => self.coin_should_be_rising,
            TrendState::Flat => self.coin_should_be_flat,
            TrendState::Falling => self.coin_should_be_falling,
            TrendState::Unknown => false,
        }
    }

    /// Number of criteria the summary satisfies
    pub fn matched_criteria(&self, summary: &TimeSeriesSummary) -> u32 {
        [
            self.coin_should_be_volatile && summary.is_volatile,
            self.coin_should_be_nominal && !summary.is_outlier_in_gradient,
            self.coin_should_be_an_outlier && summary.is_outlier_in_gradient,
            self.wants_trend(summary.trend_state),
        ]
        .iter()
        .filter(|matched| **matched)
        .count() as u32
    }
}
