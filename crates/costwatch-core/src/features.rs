//! Feature-matrix assembly and standardization for the anomaly detectors.
//!
//! Both detectors consume the same four features per day, standardized to
//! zero mean and unit variance across the whole series so the models are
//! scale-invariant.

use crate::error::{CostwatchError, Result};
use crate::models::DailyUsage;

/// Number of features fed to each detector.
pub const FEATURE_DIM: usize = 4;

/// Column names, in matrix order. Used in degenerate-variance diagnostics.
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = ["cost", "usage", "cost_change", "rolling_avg"];

/// One standardized (or raw) feature row.
pub type FeatureRow = [f64; FEATURE_DIM];

/// Assemble the raw `[cost, usage, cost_change, rolling_avg]` matrix.
pub fn feature_matrix(days: &[DailyUsage]) -> Vec<FeatureRow> {
    days.iter()
        .map(|d| [d.cost, d.usage, d.cost_change, d.rolling_avg])
        .collect()
}

/// Standardize every column to zero mean and unit variance.
///
/// Uses the population standard deviation, matching the usual scaler
/// convention. A column with zero variance cannot be standardized and is
/// reported as a [`CostwatchError::DegenerateFeature`] naming the column.
pub fn standardize(matrix: &[FeatureRow]) -> Result<Vec<FeatureRow>> {
    if matrix.is_empty() {
        return Ok(Vec::new());
    }

    let mut means = [0.0_f64; FEATURE_DIM];
    let mut stds = [0.0_f64; FEATURE_DIM];

    for col in 0..FEATURE_DIM {
        let values: Vec<f64> = matrix.iter().map(|row| row[col]).collect();
        let (mean, std) = mean_std(&values);
        if std < 1e-12 {
            return Err(CostwatchError::DegenerateFeature {
                feature: FEATURE_NAMES[col].to_string(),
            });
        }
        means[col] = mean;
        stds[col] = std;
    }

    Ok(matrix
        .iter()
        .map(|row| {
            let mut out = [0.0_f64; FEATURE_DIM];
            for col in 0..FEATURE_DIM {
                out[col] = (row[col] - means[col]) / stds[col];
            }
            out
        })
        .collect())
}

/// Mean and population standard deviation of `values`.
///
/// Returns `(0.0, 0.0)` for an empty slice.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Compute the `p`-th percentile of a **sorted** slice using standard linear
/// interpolation (the same algorithm used by NumPy's `percentile` function).
///
/// Returns `0.0` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let len = sorted_data.len();
    if len == 1 {
        return sorted_data[0];
    }
    let rank = (p / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted_data[lo];
    }
    let frac = rank - lo as f64;
    sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
