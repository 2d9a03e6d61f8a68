//! Interquartile-range outlier tagging across one cycle's batch of summaries

use tracing::debug;

use crate::domain::entities::time_series::TimeSeriesSummary;

/// Tukey fence multiplier
const FENCE_FACTOR: f64 = 1.5;

/// Inclusive acceptance band computed from one field of a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub first_quartile: f64,
    pub third_quartile: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    /// Quartiles are read at `floor(0.25 n)` and `floor(0.75 n)` of the
    /// ascending values, without interpolation. Small batches (n < 4) can
    /// land both quartiles on the same element; that is accepted as is.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();

        let first_quartile = sorted[(0.25 * n as f64).floor() as usize];
        let third_quartile = sorted[(0.75 * n as f64).floor() as usize];
        let iqr = third_quartile - first_quartile;

        Some(Self {
            first_quartile,
            third_quartile,
            lower: first_quartile - FENCE_FACTOR * iqr,
            upper: third_quartile + FENCE_FACTOR * iqr,
        })
    }

    pub fn is_outside(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// Flags gradient, offset and deviation outliers in three passes
#[derive(Debug, Clone, Default)]
pub struct OutlierClassifier;

impl OutlierClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Recompute every outlier flag of the batch.
    ///
    /// 1. `normalized_coefficient` sets `is_outlier_in_gradient`
    /// 2. `normalized_start_value` sets `is_outlier_in_offset`, over the full batch
    /// 3. coins that are not gradient outliers are fenced on `percentage_std`
    ///    to set `is_outlier_in_deviation`; gradient outliers keep it false
    pub fn classify(&self, batch: &mut [TimeSeriesSummary]) {
        for summary in batch.iter_mut() {
            summary.clear_outlier_flags();
        }
        if batch.is_empty() {
            return;
        }

        let gradients: Vec<f64> = batch.iter().map(|s| s.normalized_coefficient).collect();
        if let Some(fence) = IqrFence::from_values(&gradients) {
            for summary in batch.iter_mut() {
                summary.is_outlier_in_gradient = fence.is_outside(summary.normalized_coefficient);
            }
        }

        let offsets: Vec<f64> = batch.iter().map(|s| s.normalized_start_value).collect();
        if let Some(fence) = IqrFence::from_values(&offsets) {
            for summary in batch.iter_mut() {
                summary.is_outlier_in_offset = fence.is_outside(summary.normalized_start_value);
            }
        }

        let deviations: Vec<f64> = batch
            .iter()
            .filter(|s| !s.is_outlier_in_gradient)
            .map(|s| s.percentage_std)
            .collect();
        if let Some(fence) = IqrFence::from_values(&deviations) {
            for summary in batch.iter_mut().filter(|s| !s.is_outlier_in_gradient) {
                summary.is_outlier_in_deviation = fence.is_outside(summary.percentage_std);
            }
        }

        debug!(
            batch_size = batch.len(),
            gradient_outliers = batch.iter().filter(|s| s.is_outlier_in_gradient).count(),
            offset_outliers = batch.iter().filter(|s| s.is_outlier_in_offset).count(),
            deviation_outliers = batch.iter().filter(|s| s.is_outlier_in_deviation).count(),
            "Classified outliers"
        );
    }
}
