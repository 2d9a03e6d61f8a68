//! Least-squares trend line over (hour offset, value) pairs

use crate::domain::errors::AnalysisError;

/// Fitted line `value = coefficient * hour + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendLine {
    pub coefficient: f64,
    pub offset: f64,
}

impl TrendLine {
    /// Ordinary least squares, closed form.
    ///
    /// Uses the centered normal equations, which give the same answer as the
    /// textbook sums but keep precision when hours and prices differ in scale.
    pub fn fit(points: &[(f64, f64)]) -> Result<Self, AnalysisError> {
        let distinct = count_distinct_hours(points);
        if distinct < 2 {
            return Err(AnalysisError::DegenerateInput { distinct });
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
            let dx = x - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });

        let coefficient = sxy / sxx;
        let offset = mean_y - coefficient * mean_x;

        Ok(Self {
            coefficient,
            offset,
        })
    }

    pub fn value_at(&self, hour: f64) -> f64 {
        trend_value(self.coefficient, hour, self.offset)
    }

    pub fn percentage_change_over(&self, hours: f64) -> Result<f64, AnalysisError> {
        percentage_change_over_window(self.coefficient, self.offset, hours)
    }
}

pub fn trend_value(coefficient: f64, hour: f64, offset: f64) -> f64 {
    coefficient * hour + offset
}

/// Fractional change of the line between hour 0 and `hours`
pub fn percentage_change_over_window(
    coefficient: f64,
    offset: f64,
    hours: f64,
) -> Result<f64, AnalysisError> {
    let start = trend_value(coefficient, 0.0, offset);
    if start == 0.0 {
        return Err(AnalysisError::ZeroBaseline);
    }
    Ok(trend_value(coefficient, hours, offset) / start - 1.0)
}

fn count_distinct_hours(points: &[(f64, f64)]) -> usize {
    let mut hours: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    hours.sort_by(|a, b| a.total_cmp(b));
    hours.dedup();
    hours.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_exact_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|h| (h as f64, 2.5 * h as f64 + 10.0)).collect();
        let line = TrendLine::fit(&points).unwrap();
        assert!((line.coefficient - 2.5).abs() < 1e-12);
        assert!((line.offset - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_matches_reference_regression() {
        // Reference values from the normal equations:
        // n=5, Σx=10, Σy=16.6, Σxy=39.5, Σx²=30
        // a = (5*39.5 - 10*16.6) / (5*30 - 100) = 31.5 / 50 = 0.63
        // b = (16.6 - 0.63*10) / 5 = 2.06
        let points = vec![(0.0, 2.0), (1.0, 2.9), (2.0, 3.1), (3.0, 4.0), (4.0, 4.6)];
        let line = TrendLine::fit(&points).unwrap();
        assert!((line.coefficient - 0.63).abs() < 1e-9);
        assert!((line.offset - 2.06).abs() < 1e-9);
    }

    #[test]
    fn test_fit_rejects_single_distinct_hour() {
        let points = vec![(1.0, 2.0), (1.0, 3.0)];
        assert_eq!(
            TrendLine::fit(&points),
            Err(AnalysisError::DegenerateInput { distinct: 1 })
        );
        assert_eq!(
            TrendLine::fit(&[]),
            Err(AnalysisError::DegenerateInput { distinct: 0 })
        );
    }

    #[test]
    fn test_trend_value() {
        assert_eq!(trend_value(2.0, 3.0, 1.0), 7.0);
    }

    #[test]
    fn test_percentage_change_over_window() {
        // value goes from 100 to 124 over 24h
        let change = percentage_change_over_window(1.0, 100.0, 24.0).unwrap();
        assert!((change - 0.24).abs() < 1e-12);
    }

    #[test]
    fn test_percentage_change_zero_baseline() {
        assert_eq!(
            percentage_change_over_window(1.0, 0.0, 24.0),
            Err(AnalysisError::ZeroBaseline)
        );
    }
}
