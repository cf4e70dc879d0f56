//! Progress trend using linear regression (linfa)

use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};

use super::SeriesPoint;

/// Minimum data points required for fitting
const MIN_DATA_POINTS: usize = 3;

const SECS_PER_DAY: f64 = 86_400.0;

/// Straight-line fit of a metric series against time
#[derive(Debug, Clone)]
pub struct ProgressTrend {
    slope: f64,
    intercept: f64,
    r2_score: f64,
    data_points: usize,
    first_date: DateTime<Utc>,
    last_date: DateTime<Utc>,
}

impl ProgressTrend {
    /// Fit a trend to `series`. Needs at least three points spread over
    /// more than one instant.
    pub fn fit(series: &[SeriesPoint]) -> Option<Self> {
        if series.len() < MIN_DATA_POINTS {
            return None;
        }

        let first_date = series.iter().map(|p| p.date).min()?;
        let last_date = series.iter().map(|p| p.date).max()?;
        if first_date == last_date {
            return None;
        }

        // X = days since first point, Y = metric value
        let x_data: Vec<f64> = series
            .iter()
            .map(|p| days_between(first_date, p.date))
            .collect();
        let y_data: Vec<f64> = series.iter().map(|p| p.value).collect();

        let records = Array2::from_shape_vec((series.len(), 1), x_data).ok()?;
        let targets = Array1::from_vec(y_data);
        let dataset = Dataset::new(records, targets);

        let model = LinearRegression::default().fit(&dataset).ok()?;
        let slope = model.params()[0];
        let intercept = model.intercept();

        let predictions = model.predict(&dataset);
        let r2_score = predictions.r2(&dataset).unwrap_or(0.0);

        Some(Self {
            slope,
            intercept,
            r2_score,
            data_points: series.len(),
            first_date,
            last_date,
        })
    }

    /// Change of the metric per day
    pub fn daily_progress(&self) -> f64 {
        self.slope
    }

    /// Projected value `days_ahead` days after the latest point
    pub fn predict(&self, days_ahead: f64) -> f64 {
        let x = days_between(self.first_date, self.last_date) + days_ahead;
        self.slope * x + self.intercept
    }

    /// Fitted value at the latest point
    pub fn current_level(&self) -> f64 {
        self.predict(0.0)
    }

    /// Fit quality, 0-1
    pub fn r2_score(&self) -> f64 {
        self.r2_score
    }

    pub fn data_points(&self) -> usize {
        self.data_points
    }

    /// One-line summary for terminal output
    pub fn summary(&self, unit: &str) -> String {
        let sign = if self.slope >= 0.0 { "+" } else { "" };
        format!(
            "Trend: {}{:.2} {}/week over {} sessions (R2 {:.2}), 4 weeks out: {:.1}",
            sign,
            self.slope * 7.0,
            unit,
            self.data_points,
            self.r2_score,
            self.predict(28.0)
        )
    }
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn point(days: i64, value: f64) -> SeriesPoint {
        SeriesPoint {
            date: Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap() + Duration::days(days),
            value,
        }
    }

    #[test]
    fn test_trend_insufficient_data() {
        assert!(ProgressTrend::fit(&[point(0, 100.0), point(7, 105.0)]).is_none());
    }

    #[test]
    fn test_trend_same_instant() {
        let series = [point(0, 100.0), point(0, 105.0), point(0, 110.0)];
        assert!(ProgressTrend::fit(&series).is_none());
    }

    #[test]
    fn test_trend_linear_progress() {
        // +5 every 7 days
        let series = [point(0, 100.0), point(7, 105.0), point(14, 110.0)];
        let trend = ProgressTrend::fit(&series).unwrap();

        let daily = trend.daily_progress();
        assert!((daily - 5.0 / 7.0).abs() < 1e-6, "Daily progress: {}", daily);
        assert!(trend.r2_score() > 0.9, "R2 score: {}", trend.r2_score());
        assert!((trend.current_level() - 110.0).abs() < 1e-6);
        assert!((trend.predict(7.0) - 115.0).abs() < 1e-6);
        assert_eq!(trend.data_points(), 3);
    }

    #[test]
    fn test_trend_unordered_input() {
        let series = [point(14, 110.0), point(0, 100.0), point(7, 105.0)];
        let trend = ProgressTrend::fit(&series).unwrap();
        assert!((trend.current_level() - 110.0).abs() < 1e-6);
    }

    #[test]
    fn test_trend_negative() {
        let series = [point(0, 120.0), point(7, 115.0), point(14, 110.0)];
        let trend = ProgressTrend::fit(&series).unwrap();
        assert!(trend.daily_progress() < 0.0);
        assert!(trend.predict(7.0) < trend.current_level());
        assert!(trend.summary("kg").starts_with("Trend: -"));
    }
}
