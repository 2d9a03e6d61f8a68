use statrs::statistics::Statistics;
use tracing::{debug, warn};

use crate::domain::entities::time_series::{PricePoint, TimeSeriesSummary, TrendState};
use crate::domain::errors::AnalysisError;
use crate::domain::services::trend_model::TrendLine;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MINIMUM_SAMPLES: usize = 2;

/// Builds per-asset statistical summaries from raw price samples
#[derive(Debug, Clone)]
pub struct TimeSeriesSummarizer {
    /// |std / mean| at or above this marks the coin volatile
    pub volatility_threshold: f64,
    /// |trend change| below this marks the trend flat
    pub flatness_threshold: f64,
}

impl Default for TimeSeriesSummarizer {
    fn default() -> Self {
        TimeSeriesSummarizer {
            volatility_threshold: 0.03,
            flatness_threshold: 0.01,
        }
    }
}

impl TimeSeriesSummarizer {
    pub fn new(volatility_threshold: f64, flatness_threshold: f64) -> Self {
        Self {
            volatility_threshold,
            flatness_threshold,
        }
    }

    /// Summarize one asset.
    ///
    /// # Arguments
    /// * `asset_id` - Asset being analysed
    /// * `samples` - Raw samples, most recent first as delivered by the feed
    ///
    /// # Returns
    /// A summary with outlier flags cleared and ranking 0
    pub fn summarize(
        &self,
        asset_id: &str,
        samples: &[PricePoint],
    ) -> Result<TimeSeriesSummary, AnalysisError> {
        if samples.len() < MINIMUM_SAMPLES {
            return Err(AnalysisError::InsufficientData {
                asset_id: asset_id.to_string(),
                required: MINIMUM_SAMPLES,
                current: samples.len(),
            });
        }

        let mut ascending = samples.to_vec();
        ascending.reverse();
        ascending.sort_by_key(|point| point.timestamp);

        let time_offset_ms = ascending[0].timestamp;
        let points: Vec<(f64, f64)> = ascending
            .iter()
            .map(|point| {
                (
                    (point.timestamp - time_offset_ms) as f64 / MILLIS_PER_HOUR,
                    point.value,
                )
            })
            .collect();
        let values: Vec<f64> = ascending.iter().map(|point| point.value).collect();

        let mean = values.iter().mean();
        let std = values.iter().population_std_dev();
        let modes = modes(&values);

        let line = TrendLine::fit(&points)?;
        if line.offset == 0.0 {
            return Err(AnalysisError::ZeroBaseline);
        }

        let normalized_coefficient = line.coefficient / line.offset;
        let normalized_start_value = values[0] / line.offset;
        let percentage_std = std / mean;
        let is_volatile = percentage_std.abs() >= self.volatility_threshold;

        let span_hours = points[points.len() - 1].0;
        let trend_percentage_change = line.percentage_change_over(span_hours)?;
        let trend_state = TrendState::from_change(trend_percentage_change, self.flatness_threshold);

        debug!(
            asset_id = %asset_id,
            dataset_count = values.len(),
            mean = mean,
            percentage_std = percentage_std,
            normalized_coefficient = normalized_coefficient,
            trend_percentage_change = trend_percentage_change,
            trend_state = %trend_state,
            is_volatile = is_volatile,
            "Summarized time series"
        );

        Ok(TimeSeriesSummary {
            asset_id: asset_id.to_string(),
            mean,
            std,
            percentage_std,
            modes,
            trend_coefficient: line.coefficient,
            trend_offset: line.offset,
            normalized_coefficient,
            normalized_start_value,
            trend_percentage_change,
            trend_state,
            is_volatile,
            is_outlier_in_gradient: false,
            is_outlier_in_offset: false,
            is_outlier_in_deviation: false,
            dataset_count: values.len(),
            time_offset_ms,
            latest_value: values[values.len() - 1],
            ranking: 0,
        })
    }

    /// Summarize every asset of a cycle. An asset that cannot be summarized is
    /// logged and left out; the rest of the batch is unaffected.
    pub fn summarize_batch<'a, I>(&self, series: I) -> Vec<TimeSeriesSummary>
    where
        I: IntoIterator<Item = (&'a str, &'a [PricePoint])>,
    {
        series
            .into_iter()
            .filter_map(|(asset_id, samples)| match self.summarize(asset_id, samples) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!(asset_id = %asset_id, error = %e, "Skipping asset for this cycle");
                    None
                }
            })
            .collect()
    }
}

/// Every value tied for the highest frequency, ascending
fn modes(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut runs: Vec<(f64, usize)> = Vec::new();
    for value in sorted {
        match runs.last_mut() {
            Some((last, count)) if *last == value => *count += 1,
            _ => runs.push((value, 1)),
        }
    }

    let highest = runs.iter().map(|(_, count)| *count).max().unwrap_or(0);
    runs.into_iter()
        .filter(|(_, count)| *count == highest)
        .map(|(value, _)| value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600_000;

    /// Samples most recent first, one per hour, oldest at `start_ms`
    fn hourly(start_ms: i64, values: &[f64]) -> Vec<PricePoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| PricePoint::new(start_ms + i as i64 * HOUR, *v))
            .rev()
            .collect()
    }

    #[test]
    fn test_summarize_requires_two_samples() {
        let summarizer = TimeSeriesSummarizer::default();
        let result = summarizer.summarize("BTC", &[PricePoint::new(0, 1.0)]);
        assert_eq!(
            result,
            Err(AnalysisError::InsufficientData {
                asset_id: "BTC".to_string(),
                required: 2,
                current: 1,
            })
        );
    }

    #[test]
    fn test_summarize_rising_series() {
        let summarizer = TimeSeriesSummarizer::default();
        let samples = hourly(1_000, &[100.0, 101.0, 102.0, 103.0, 104.0]);
        let summary = summarizer.summarize("BTC", &samples).unwrap();

        assert_eq!(summary.time_offset_ms, 1_000);
        assert_eq!(summary.dataset_count, 5);
        assert!((summary.mean - 102.0).abs() < 1e-9);
        assert!((summary.std - 2.0_f64.sqrt()).abs() < 1e-9);
        assert!((summary.trend_coefficient - 1.0).abs() < 1e-9);
        assert!((summary.trend_offset - 100.0).abs() < 1e-9);
        assert!((summary.normalized_coefficient - 0.01).abs() < 1e-9);
        assert!((summary.normalized_start_value - 1.0).abs() < 1e-9);
        assert!((summary.trend_percentage_change - 0.04).abs() < 1e-9);
        assert_eq!(summary.trend_state, TrendState::Rising);
        assert_eq!(summary.latest_value, 104.0);
        assert!(!summary.is_volatile);
        assert!(!summary.is_outlier());
        assert_eq!(summary.ranking, 0);
    }

    #[test]
    fn test_summarize_flat_and_falling() {
        let summarizer = TimeSeriesSummarizer::default();

        let flat = summarizer
            .summarize("ETH", &hourly(0, &[50.0, 50.1, 49.9, 50.0]))
            .unwrap();
        assert_eq!(flat.trend_state, TrendState::Flat);

        let falling = summarizer
            .summarize("SOL", &hourly(0, &[20.0, 19.0, 18.0, 17.0]))
            .unwrap();
        assert_eq!(falling.trend_state, TrendState::Falling);
    }

    #[test]
    fn test_volatility_threshold() {
        let summarizer = TimeSeriesSummarizer::default();
        // mean 100, population std 10 -> 0.1
        let volatile = summarizer
            .summarize("DOGE", &hourly(0, &[90.0, 110.0, 90.0, 110.0]))
            .unwrap();
        assert!(volatile.is_volatile);
        assert!((volatile.percentage_std - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_modes_keep_all_ties() {
        assert_eq!(modes(&[3.0, 1.0, 3.0, 1.0, 2.0]), vec![1.0, 3.0]);
        assert_eq!(modes(&[5.0, 5.0, 1.0]), vec![5.0]);
        assert_eq!(modes(&[2.0, 1.0]), vec![1.0, 2.0]);
    }

    #[test]
    fn test_summarize_same_timestamps_is_degenerate() {
        let summarizer = TimeSeriesSummarizer::default();
        let samples = vec![PricePoint::new(5, 1.0), PricePoint::new(5, 2.0)];
        assert_eq!(
            summarizer.summarize("BTC", &samples),
            Err(AnalysisError::DegenerateInput { distinct: 1 })
        );
    }

    #[test]
    fn test_summarize_batch_isolates_failures() {
        let summarizer = TimeSeriesSummarizer::default();
        let good = hourly(0, &[1.0, 2.0, 3.0]);
        let short = vec![PricePoint::new(0, 1.0)];
        let zero_line = hourly(0, &[0.0, 0.0, 0.0]);

        let batch = summarizer.summarize_batch(vec![
            ("GOOD", good.as_slice()),
            ("SHORT", short.as_slice()),
            ("ZERO", zero_line.as_slice()),
        ]);

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].asset_id, "GOOD");
    }
}
