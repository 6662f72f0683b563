//! Descriptive statistics over a question's accuracy series.

use crate::types::Temperature;

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 with fewer than two values.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Ordinary-least-squares slope of `ys` against `xs`.
///
/// ```text
/// slope = Σ(x - x̄)(y - ȳ) / Σ(x - x̄)²
/// ```
///
/// Returns 0 with fewer than two points or when every x is equal.
pub fn linear_regression_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = mean(&xs[..n]);
    let mean_y = mean(&ys[..n]);

    let var_x: f64 = xs[..n].iter().map(|x| (x - mean_x).powi(2)).sum();
    if var_x == 0.0 {
        return 0.0;
    }
    let cov_xy: f64 = xs[..n]
        .iter()
        .zip(&ys[..n])
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    cov_xy / var_x
}

/// True when the series has both a significant rise and a significant fall
/// between consecutive points.
pub fn is_non_monotonic(values: &[f64], eps: f64) -> bool {
    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let has_rise = deltas.iter().any(|&d| d > eps);
    let has_fall = deltas.iter().any(|&d| d < -eps);
    has_rise && has_fall
}

/// Summary statistics for one question's (temperature, accuracy) series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub slope: f64,
    /// Lowest temperature attaining `max`
    pub best_temperature: Temperature,
}

impl SeriesStats {
    /// Compute stats for a series sorted ascending by temperature.
    ///
    /// Returns `None` for an empty series.
    pub fn compute(series: &[(Temperature, f64)]) -> Option<Self> {
        if series.is_empty() {
            return None;
        }

        let xs: Vec<f64> = series.iter().map(|(t, _)| t.as_f64()).collect();
        let ys: Vec<f64> = series.iter().map(|(_, a)| *a).collect();

        let max = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = ys.iter().cloned().fold(f64::INFINITY, f64::min);

        // Ties go to the lowest temperature, not to insertion order.
        let best_temperature = series
            .iter()
            .filter(|(_, a)| (a - max).abs() < 1e-12)
            .map(|(t, _)| *t)
            .min()
            .unwrap_or(series[0].0);

        Some(Self {
            mean: mean(&ys),
            std: population_std_dev(&ys),
            min,
            max,
            range: max - min,
            slope: linear_regression_slope(&xs, &ys),
            best_temperature,
        })
    }
}
