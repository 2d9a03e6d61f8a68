//! Price samples and the per-asset statistical summary derived from them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One price observation as delivered by the market data feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub value: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Direction of the fitted trend line over the analysed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendState {
    Rising,
    Flat,
    Falling,
    Unknown,
}

impl TrendState {
    /// Classify a fractional change against a symmetric flatness band.
    ///
    /// NaN fails every comparison and lands in `Unknown`.
    pub fn from_change(percentage_change: f64, flatness_threshold: f64) -> Self {
        if percentage_change.abs() < flatness_threshold {
            TrendState::Flat
        } else if percentage_change >= flatness_threshold {
            TrendState::Rising
        } else if percentage_change <= -flatness_threshold {
            TrendState::Falling
        } else {
            TrendState::Unknown
        }
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendState::Rising => write!(f, "RISING"),
            TrendState::Flat => write!(f, "FLAT"),
            TrendState::Falling => write!(f, "FALLING"),
            TrendState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for TrendState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RISING" => Ok(TrendState::Rising),
            "FLAT" => Ok(TrendState::Flat),
            "FALLING" => Ok(TrendState::Falling),
            "UNKNOWN" => Ok(TrendState::Unknown),
            other => Err(format!("Unknown trend state: {}", other)),
        }
    }
}

/// Statistical snapshot of one asset for one analysis cycle.
///
/// Everything except `ranking` and the three outlier flags is fixed when the
/// summarizer builds it. The flags are filled in by the outlier classifier and
/// the ranking by the coin ranker, both running over the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSummary {
    pub asset_id: String,
    pub mean: f64,
    pub std: f64,
    /// std / mean
    pub percentage_std: f64,
    /// Every value tied for the highest frequency, ascending
    pub modes: Vec<f64>,
    pub trend_coefficient: f64,
    pub trend_offset: f64,
    /// trend_coefficient / trend_offset
    pub normalized_coefficient: f64,
    /// oldest value / trend_offset
    pub normalized_start_value: f64,
    /// Fractional change of the trend line across the whole dataset span
    pub trend_percentage_change: f64,
    pub trend_state: TrendState,
    pub is_volatile: bool,
    pub is_outlier_in_gradient: bool,
    pub is_outlier_in_offset: bool,
    pub is_outlier_in_deviation: bool,
    pub dataset_count: usize,
    /// Timestamp of the oldest sample; hour offsets are measured from here
    pub time_offset_ms: i64,
    /// Most recent sample value
    pub latest_value: f64,
    pub ranking: i64,
}

impl TimeSeriesSummary {
    pub fn is_outlier(&self) -> bool {
        self.is_outlier_in_gradient || self.is_outlier_in_offset || self.is_outlier_in_deviation
    }

    pub fn clear_outlier_flags(&mut self) {
        self.is_outlier_in_gradient = false;
        self.is_outlier_in_offset = false;
        self.is_outlier_in_deviation = false;
    }
}
