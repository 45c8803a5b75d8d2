//! Least-squares trend estimation over an ordered series.

use serde::Serialize;

use crate::models::{DayAverage, Parameter};

// ---

/// Result of an ordinary least-squares fit with x = 0, 1, 2, ...
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Rising => write!(f, "rising"),
            TrendDirection::Falling => write!(f, "falling"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Trend of one parameter across daily averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterTrend {
    pub parameter: Parameter,
    pub fit: TrendFit,
    pub direction: TrendDirection,
    pub samples: usize,
}

/// Fit a line through `values` using their index as x.
///
/// Fewer than two samples give an all-zero fit. A constant series has an
/// R² of 0.
pub fn fit_trend(values: &[f64]) -> TrendFit {
    // ---
    if values.len() < 2 {
        return TrendFit::default();
    }

    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }

    let slope = if sxx == 0.0 { 0.0 } else { sxy / sxx };
    let intercept = mean_y - slope * mean_x;

    let (mut ss_res, mut ss_tot) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }

    let r_squared = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    TrendFit {
        slope,
        intercept,
        r_squared,
    }
}

/// Classify a slope relative to 1% of the series range.
pub fn classify(slope: f64, values: &[f64]) -> TrendDirection {
    // ---
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);

    let mut range = max - min;
    if !range.is_finite() || range == 0.0 {
        range = 1.0;
    }
    let threshold = 0.01 * range;

    if slope > threshold {
        TrendDirection::Rising
    } else if slope < -threshold {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    }
}

/// Trend of a parameter over daily averages, oldest day first.
pub fn trend_for(parameter: Parameter, days: &[DayAverage]) -> ParameterTrend {
    // ---
    let values: Vec<f64> = days.iter().map(|d| parameter.average_in(d)).collect();
    let fit = fit_trend(&values);

    ParameterTrend {
        parameter,
        fit,
        direction: classify(fit.slope, &values),
        samples: values.len(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn day(date: &str, ph: f64) -> DayAverage {
        DayAverage {
            date: date.to_string(),
            avg_ph: ph,
            avg_tds: 0.0,
            avg_water_temp: 0.0,
            avg_air_temp: 0.0,
            avg_humidity: 0.0,
            avg_light: 0.0,
            avg_system_score: 0.0,
            readings_count: 1,
        }
    }

    #[test]
    fn test_single_sample_is_degenerate() {
        // ---
        assert_eq!(fit_trend(&[5.0]), TrendFit::default());
        assert_eq!(fit_trend(&[]), TrendFit::default());
    }

    #[test]
    fn test_perfect_line() {
        // ---
        let fit = fit_trend(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(close(fit.slope, 1.0));
        assert!(close(fit.intercept, 1.0));
        assert!(close(fit.r_squared, 1.0));
    }

    #[test]
    fn test_constant_series_has_zero_r_squared() {
        // ---
        let fit = fit_trend(&[3.0, 3.0, 3.0, 3.0]);
        assert_eq!(fit.slope, 0.0);
        assert!(close(fit.intercept, 3.0));
        assert_eq!(fit.r_squared, 0.0);
    }

    #[test]
    fn test_noisy_descending_series() {
        // ---
        let fit = fit_trend(&[10.0, 8.0, 9.0, 6.0, 5.0]);
        assert!(fit.slope < 0.0);
        assert!(fit.r_squared > 0.0 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_classification() {
        // ---
        let rising = [1.0, 2.0, 3.0];
        assert_eq!(classify(fit_trend(&rising).slope, &rising), TrendDirection::Rising);

        let falling = [3.0, 2.0, 1.0];
        assert_eq!(classify(fit_trend(&falling).slope, &falling), TrendDirection::Falling);

        // Range 100, threshold 1: a slope of 0.5 is stable.
        let wide = [0.0, 100.0];
        assert_eq!(classify(0.5, &wide), TrendDirection::Stable);
        assert_eq!(classify(1.5, &wide), TrendDirection::Rising);

        // Zero range is treated as 1, threshold 0.01.
        let flat = [4.0, 4.0];
        assert_eq!(classify(0.0, &flat), TrendDirection::Stable);
        assert_eq!(classify(0.02, &flat), TrendDirection::Rising);
    }

    #[test]
    fn test_trend_over_daily_averages() {
        // ---
        let days = vec![day("2024-01-01", 5.8), day("2024-01-02", 6.0), day("2024-01-03", 6.2)];
        let trend = trend_for(Parameter::Ph, &days);

        assert_eq!(trend.samples, 3);
        assert!(close(trend.fit.slope, 0.2));
        assert_eq!(trend.direction, TrendDirection::Rising);
    }
}
