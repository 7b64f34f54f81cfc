//! Linear cost forecasting.
//!
//! Fits a first-degree polynomial of cost against sequential day index over
//! the entire history (ordinary least squares) and extrapolates it for a
//! fixed horizon. Deliberately naive so the projection stays transparent and
//! auditable: no seasonality, no anomaly exclusion, no confidence interval.
//! Known limitation: anomalous days bias the fitted trend.

use crate::error::{CostwatchError, Result};
use crate::models::DailyUsage;

/// Default number of future days to project.
pub const DEFAULT_HORIZON: usize = 30;

/// Project daily cost for the next `horizon` days.
///
/// The fit is deterministic: repeated calls over the same history return
/// identical values. An empty history is an error.
pub fn forecast_costs(days: &[DailyUsage], horizon: usize) -> Result<Vec<f64>> {
    if days.is_empty() {
        return Err(CostwatchError::InsufficientData { days: 0, min: 1 });
    }

    let costs: Vec<f64> = days.iter().map(|d| d.cost).collect();
    let (slope, intercept) = fit_line(&costs);

    let n = costs.len();
    Ok((0..horizon)
        .map(|j| slope * ((n + j) as f64) + intercept)
        .collect())
}

/// Ordinary-least-squares fit of `y` against its indices `0..n`.
///
/// Returns `(slope, intercept)`; a single sample yields a flat line.
fn fit_line(y: &[f64]) -> (f64, f64) {
    let n = y.len() as f64;
    if y.len() < 2 {
        return (0.0, y.first().copied().unwrap_or(0.0));
    }

    let x_mean = (n - 1.0) / 2.0;
    let y_mean = y.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &yi) in y.iter().enumerate() {
        let xi = i as f64;
        num += (xi - x_mean) * (yi - y_mean);
        den += (xi - x_mean) * (xi - x_mean);
    }

    if den.abs() < 1e-12 {
        return (0.0, y_mean);
    }

    let slope = num / den;
    (slope, y_mean - slope * x_mean)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series_from_costs(costs: &[f64]) -> Vec<DailyUsage> {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        costs
            .iter()
            .enumerate()
            .map(|(i, &cost)| DailyUsage {
                date: start + chrono::Days::new(i as u64),
                cost,
                usage: 1.0,
                cost_change: 0.0,
                rolling_avg: cost,
            })
            .collect()
    }

    #[test]
    fn test_forecast_extends_linear_trend_exactly() {
        // cost = 10 * (index + 1): slope 10, intercept 10.
        let days = series_from_costs(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let forecast = forecast_costs(&days, 3).unwrap();

        assert_eq!(forecast.len(), 3);
        assert!((forecast[0] - 60.0).abs() < 1e-9);
        assert!((forecast[1] - 70.0).abs() < 1e-9);
        assert!((forecast[2] - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_constant_series_is_flat() {
        let days = series_from_costs(&[100.0; 10]);
        let forecast = forecast_costs(&days, 5).unwrap();
        for value in forecast {
            assert!((value - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_forecast_is_deterministic() {
        let days = series_from_costs(&[100.0, 120.0, 90.0, 140.0, 95.0, 105.0]);
        let first = forecast_costs(&days, DEFAULT_HORIZON).unwrap();
        let second = forecast_costs(&days, DEFAULT_HORIZON).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_forecast_single_day_is_flat() {
        let days = series_from_costs(&[42.0]);
        let forecast = forecast_costs(&days, 4).unwrap();
        assert_eq!(forecast, vec![42.0; 4]);
    }

    #[test]
    fn test_forecast_empty_history_is_an_error() {
        let err = forecast_costs(&[], 30).unwrap_err();
        assert!(matches!(
            err,
            CostwatchError::InsufficientData { days: 0, min: 1 }
        ));
    }

    #[test]
    fn test_forecast_horizon_length() {
        let days = series_from_costs(&[10.0, 12.0, 11.0]);
        assert_eq!(forecast_costs(&days, 30).unwrap().len(), 30);
        assert_eq!(forecast_costs(&days, 0).unwrap().len(), 0);
    }

    #[test]
    fn test_fit_line_known_slope() {
        let (slope, intercept) = fit_line(&[1.0, 3.0, 5.0, 7.0]);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
    }
}
