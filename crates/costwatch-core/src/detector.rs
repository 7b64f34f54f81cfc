//! Dual-model anomaly detection over the daily cost series.
//!
//! Both detectors see the same standardized feature matrix; their verdicts
//! are OR-fused, favoring recall over precision — a missed cost anomaly is
//! more expensive than a false positive. The two models are deliberately
//! diverse: the isolation forest catches isolated sparse points, the
//! autoencoder catches points poorly explained by the learned manifold.

use tracing::{debug, warn};

use crate::autoencoder::{Autoencoder, AutoencoderConfig};
use crate::error::{CostwatchError, Result};
use crate::features::{feature_matrix, standardize};
use crate::isolation::{IsolationForest, IsolationForestConfig};
use crate::models::{DailyUsage, ScoredDay};

/// Hard minimum series length; below this not even variance exists.
pub const MIN_DAYS: usize = 2;

/// Below this length the percentile thresholds and the autoencoder training
/// set are statistically unstable. Detection still runs; the condition is
/// logged rather than special-cased.
pub const STABLE_DAYS: usize = 20;

/// Combined configuration for both detectors.
#[derive(Debug, Clone, Default)]
pub struct DetectorConfig {
    pub forest: IsolationForestConfig,
    pub autoencoder: AutoencoderConfig,
}

impl DetectorConfig {
    /// Default configuration with the same seed threaded into both models.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            forest: IsolationForestConfig {
                seed,
                ..IsolationForestConfig::default()
            },
            autoencoder: AutoencoderConfig {
                seed,
                ..AutoencoderConfig::default()
            },
        }
    }
}

/// Run both detectors over the daily series and fuse their verdicts.
///
/// Fails with [`CostwatchError::InsufficientData`] when fewer than
/// [`MIN_DAYS`] records are supplied and with
/// [`CostwatchError::DegenerateFeature`] when a feature column has no
/// variance to standardize.
pub fn detect_anomalies(days: &[DailyUsage], config: &DetectorConfig) -> Result<Vec<ScoredDay>> {
    if days.len() < MIN_DAYS {
        return Err(CostwatchError::InsufficientData {
            days: days.len(),
            min: MIN_DAYS,
        });
    }
    if days.len() < STABLE_DAYS {
        warn!(
            "Only {} day(s) of history; anomaly thresholds may be unstable below {}",
            days.len(),
            STABLE_DAYS
        );
    }

    let standardized = standardize(&feature_matrix(days))?;

    let if_flags = IsolationForest::detect(&standardized, &config.forest);
    let ae_flags = Autoencoder::detect(&standardized, &config.autoencoder);

    let scored: Vec<ScoredDay> = days
        .iter()
        .zip(if_flags.iter().zip(ae_flags.iter()))
        .map(|(day, (&if_a, &ae_a))| ScoredDay::new(day.clone(), if_a, ae_a))
        .collect();

    debug!(
        "Detection complete: {} of {} day(s) flagged",
        scored.iter().filter(|s| s.final_anomaly).count(),
        scored.len()
    );

    Ok(scored)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
