use std::fmt::Display;
use std::str::FromStr;

use crate::domain::entities::market::{CoinSelectionCriteria, MarketCharacterization, RatingThreshold};
use crate::domain::errors::RatingError;
use crate::domain::services::coin_ranker::CoinRanker;
use crate::domain::services::market_rating::{select_rating, MarketRatingEngine};
use crate::domain::services::time_series_summarizer::TimeSeriesSummarizer;

/// Engine tuning. Database settings live in `persistence::DatabaseConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub volatility_threshold: f64,
    pub flatness_threshold: f64,
    pub rating_horizon_hours: f64,
    pub investment_increment_usd: f64,
    pub max_positions: usize,
    pub ranking_increment: i64,
    pub quote_currency: String,
    /// JSON market snapshot read by the binary
    pub market_snapshot_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            volatility_threshold: 0.03,
            flatness_threshold: 0.01,
            rating_horizon_hours: 24.0,
            investment_increment_usd: 50.0,
            max_positions: 10,
            ranking_increment: 100,
            quote_currency: "USD".to_string(),
            market_snapshot_path: "market_snapshot.json".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset keys keep their defaults; unparsable or out-of-range values are
    /// logged and ignored.
    pub fn from_env() -> EngineConfig {
        let mut config = EngineConfig::default();

        config.volatility_threshold = env_or(
            "VOLATILITY_THRESHOLD",
            config.volatility_threshold,
            |v: &f64| *v > 0.0 && v.is_finite(),
            "must be positive",
        );
        config.flatness_threshold = env_or(
            "FLATNESS_THRESHOLD",
            config.flatness_threshold,
            |v: &f64| *v > 0.0 && v.is_finite(),
            "must be positive",
        );
        config.rating_horizon_hours = env_or(
            "RATING_HORIZON_HOURS",
            config.rating_horizon_hours,
            |v: &f64| *v > 0.0 && v.is_finite(),
            "must be positive",
        );
        config.investment_increment_usd = env_or(
            "INVESTMENT_INCREMENT_USD",
            config.investment_increment_usd,
            |v: &f64| *v > 0.0 && v.is_finite(),
            "must be positive",
        );
        config.max_positions = env_or(
            "MAX_POSITIONS",
            config.max_positions,
            |v: &usize| *v <= 1_000,
            "must be at most 1000",
        );
        config.ranking_increment = env_or(
            "RANKING_INCREMENT",
            config.ranking_increment,
            |v: &i64| *v > 0,
            "must be positive",
        );

        if let Ok(currency) = std::env::var("QUOTE_CURRENCY") {
            if currency.trim().is_empty() {
                tracing::warn!(
                    "Empty QUOTE_CURRENCY, using default: {}",
                    config.quote_currency
                );
            } else {
                config.quote_currency = currency.trim().to_uppercase();
            }
        }

        if let Ok(path) = std::env::var("MARKET_SNAPSHOT_PATH") {
            config.market_snapshot_path = path;
        }

        config
    }

    pub fn summarizer(&self) -> TimeSeriesSummarizer {
        TimeSeriesSummarizer::new(self.volatility_threshold, self.flatness_threshold)
    }

    pub fn rating_engine(&self) -> MarketRatingEngine {
        MarketRatingEngine::new(self.rating_horizon_hours)
    }

    pub fn ranker(&self) -> CoinRanker {
        CoinRanker::new(
            self.ranking_increment,
            self.investment_increment_usd,
            self.max_positions,
        )
    }
}

fn env_or<T>(key: &str, default: T, valid: impl Fn(&T) -> bool, rule: &str) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let raw = match std::env::var(key) {
        Ok(raw) => raw,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} ({}), using default: {}",
                key,
                value,
                rule,
                default
            );
            default
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {}",
                key,
                raw,
                e,
                default
            );
            default
        }
    }
}

/// Rating partition seeded into a fresh store.
///
/// Edges at ±1% and ±5% of trend-line change over the horizon.
pub fn default_rating_thresholds() -> Vec<RatingThreshold> {
    vec![
        RatingThreshold::at_least(MarketCharacterization::RisingRapidly, 0.05),
        RatingThreshold::bounded(MarketCharacterization::Rising, 0.01, 0.05),
        RatingThreshold::bounded(MarketCharacterization::Flat, -0.01, 0.01),
        RatingThreshold::bounded(MarketCharacterization::Falling, -0.05, -0.01),
        RatingThreshold::below(MarketCharacterization::FallingRapidly, -0.05),
    ]
}

/// Selection criteria per tier seeded into a fresh store
pub fn default_selection_criteria() -> Vec<CoinSelectionCriteria> {
    let tier = |characterization, volatile, nominal, outlier, rising, flat, falling, orders| {
        CoinSelectionCriteria {
            characterization,
            coin_should_be_volatile: volatile,
            coin_should_be_nominal: nominal,
            coin_should_be_an_outlier: outlier,
            coin_should_be_rising: rising,
            coin_should_be_flat: flat,
            coin_should_be_falling: falling,
            maximum_number_of_orders: orders,
            minimum_order_value_usd: 10.0,
        }
    };

    vec![
        tier(MarketCharacterization::RisingRapidly, true, false, true, true, false, false, 5),
        tier(MarketCharacterization::Rising, true, true, false, true, false, false, 4),
        tier(MarketCharacterization::Flat, true, true, false, true, true, false, 2),
        tier(MarketCharacterization::Falling, false, true, false, false, true, false, 1),
        tier(MarketCharacterization::FallingRapidly, false, true, false, false, false, false, 0),
    ]
}

/// Check that the bands partition the real line: every edge, every gap
/// between edges and both tails must resolve to exactly one rating.
pub fn validate_thresholds(thresholds: &[RatingThreshold]) -> Result<(), RatingError> {
    let mut edges: Vec<f64> = thresholds
        .iter()
        .flat_map(|t| {
            let lower = (!t.lower_unbounded).then_some(t.lower_bound);
            let upper = (!t.upper_unbounded).then_some(t.upper_bound);
            lower.into_iter().chain(upper)
        })
        .collect();
    edges.sort_by(|a, b| a.total_cmp(b));
    edges.dedup();

    let mut probes = edges.clone();
    probes.extend(edges.windows(2).map(|pair| (pair[0] + pair[1]) / 2.0));
    match (edges.first(), edges.last()) {
        (Some(first), Some(last)) => {
            probes.push(first - 1.0);
            probes.push(last + 1.0);
        }
        _ => probes.push(0.0),
    }

    for probe in probes {
        select_rating(probe, thresholds)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.volatility_threshold, 0.03);
        assert_eq!(config.flatness_threshold, 0.01);
        assert_eq!(config.rating_horizon_hours, 24.0);
        assert_eq!(config.max_positions, 10);
        assert_eq!(config.ranking_increment, 100);
        assert_eq!(config.quote_currency, "USD");
    }

    #[test]
    fn test_from_env_overrides_and_rejects() {
        std::env::set_var("INVESTMENT_INCREMENT_USD", "75.5");
        std::env::set_var("MAX_POSITIONS", "not-a-number");
        std::env::set_var("RANKING_INCREMENT", "-3");
        std::env::set_var("QUOTE_CURRENCY", "usdt");

        let config = EngineConfig::from_env();

        std::env::remove_var("INVESTMENT_INCREMENT_USD");
        std::env::remove_var("MAX_POSITIONS");
        std::env::remove_var("RANKING_INCREMENT");
        std::env::remove_var("QUOTE_CURRENCY");

        assert_eq!(config.investment_increment_usd, 75.5);
        assert_eq!(config.max_positions, 10);
        assert_eq!(config.ranking_increment, 100);
        assert_eq!(config.quote_currency, "USDT");
    }

    #[test]
    fn test_default_thresholds_partition_the_line() {
        assert_eq!(validate_thresholds(&default_rating_thresholds()), Ok(()));
    }

    #[test]
    fn test_validate_detects_gap() {
        let mut thresholds = default_rating_thresholds();
        thresholds.retain(|t| t.rating != MarketCharacterization::Flat);
        assert!(matches!(
            validate_thresholds(&thresholds),
            Err(RatingError::NoRating { .. })
        ));
    }

    #[test]
    fn test_validate_detects_overlap() {
        let mut thresholds = default_rating_thresholds();
        thresholds.push(RatingThreshold::bounded(
            MarketCharacterization::Flat,
            0.0,
            0.02,
        ));
        assert!(matches!(
            validate_thresholds(&thresholds),
            Err(RatingError::AmbiguousRating { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        assert!(matches!(
            validate_thresholds(&[]),
            Err(RatingError::NoRating { .. })
        ));
    }

    #[test]
    fn test_default_criteria_cover_every_tier() {
        let criteria = default_selection_criteria();
        for rating in MarketCharacterization::ALL {
            assert_eq!(
                criteria.iter().filter(|c| c.characterization == rating).count(),
                1
            );
        }
    }
}
