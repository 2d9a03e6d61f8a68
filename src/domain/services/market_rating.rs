use statrs::statistics::{Data, Median};
use tracing::{debug, info};

use crate::domain::entities::market::{MarketCharacterization, RatingThreshold};
use crate::domain::entities::time_series::TimeSeriesSummary;
use crate::domain::errors::RatingError;
use crate::domain::services::trend_model::percentage_change_over_window;

/// One cycle's rating and the median change it was read from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketRating {
    pub characterization: MarketCharacterization,
    pub median_change: f64,
}

/// Turns a whole batch of summaries into one market characterization
#[derive(Debug, Clone)]
pub struct MarketRatingEngine {
    /// Horizon over which each coin's trend line change is measured
    pub horizon_hours: f64,
}

impl Default for MarketRatingEngine {
    fn default() -> Self {
        Self {
            horizon_hours: 24.0,
        }
    }
}

impl MarketRatingEngine {
    pub fn new(horizon_hours: f64) -> Self {
        Self { horizon_hours }
    }

    /// Median trend-line change of the batch over the horizon
    pub fn median_change(&self, batch: &[TimeSeriesSummary]) -> Result<f64, RatingError> {
        if batch.is_empty() {
            return Err(RatingError::EmptyBatch);
        }

        let changes = batch
            .iter()
            .map(|summary| {
                percentage_change_over_window(
                    summary.trend_coefficient,
                    summary.trend_offset,
                    self.horizon_hours,
                )
                .map_err(|e| RatingError::InvalidSummary {
                    asset_id: summary.asset_id.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, RatingError>>()?;

        Ok(Data::new(changes).median())
    }

    /// Rate the batch against the configured bands.
    ///
    /// Overlapping or missing bands are configuration defects and are
    /// reported, never resolved by picking one.
    pub fn rate(
        &self,
        batch: &[TimeSeriesSummary],
        thresholds: &[RatingThreshold],
    ) -> Result<MarketRating, RatingError> {
        let median_change = self.median_change(batch)?;
        let characterization = select_rating(median_change, thresholds)?;

        info!(
            batch_size = batch.len(),
            median_change = median_change,
            rating = %characterization,
            "Market characterized"
        );

        Ok(MarketRating {
            characterization,
            median_change,
        })
    }
}

/// The single band containing `value`
pub fn select_rating(
    value: f64,
    thresholds: &[RatingThreshold],
) -> Result<MarketCharacterization, RatingError> {
    let matches: Vec<MarketCharacterization> = thresholds
        .iter()
        .filter(|threshold| threshold.contains(value))
        .map(|threshold| threshold.rating)
        .collect();

    debug!(value = value, matches = ?matches, "Matched rating bands");

    match matches.as_slice() {
        [] => Err(RatingError::NoRating { median: value }),
        [rating] => Ok(*rating),
        _ => Err(RatingError::AmbiguousRating {
            median: value,
            matches,
        }),
    }
}
