//! Main analysis pipeline for costwatch.
//!
//! Orchestrates loading, daily aggregation, dual-model anomaly detection,
//! recommendation annotation, KPI reduction and forecasting, returning an
//! [`AnalysisResult`] ready for the report layer.

use std::path::Path;

use chrono::Utc;
use costwatch_core::detector::{detect_anomalies, DetectorConfig};
use costwatch_core::error::{CostwatchError, Result};
use costwatch_core::forecast::{forecast_costs, DEFAULT_HORIZON};
use costwatch_core::kpi::{compute_kpis, CostKpis};
use costwatch_core::models::AdvisedDay;
use costwatch_core::recommend::annotate_recommendations;
use tracing::info;

use crate::aggregator::aggregate_daily;
use crate::reader::load_billing_rows;

// ── Public types ──────────────────────────────────────────────────────────────

/// Pipeline-wide configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Configuration shared by both anomaly detectors.
    pub detector: DetectorConfig,
    /// Number of future days to forecast.
    pub horizon: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            horizon: DEFAULT_HORIZON,
        }
    }
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// Number of billing rows successfully parsed.
    pub rows_read: usize,
    /// Number of rows dropped for unparseable dates or numbers.
    pub rows_dropped: u64,
    /// Number of daily records produced by aggregation.
    pub days_analyzed: usize,
    /// Number of days flagged by the fused detectors.
    pub anomalies_flagged: usize,
    /// Wall-clock seconds spent reading the CSV input.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent training and scoring both detectors.
    pub detect_time_seconds: f64,
}

/// The complete output of [`analyze_costs`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The fully annotated daily series.
    pub days: Vec<AdvisedDay>,
    /// Summary KPI triple.
    pub kpis: CostKpis,
    /// Projected daily cost for the configured horizon.
    pub forecast: Vec<f64>,
    /// Metadata about this analysis run.
    pub metadata: AnalysisMetadata,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full analysis pipeline over a billing CSV file or directory.
///
/// 1. Load billing rows (dropping unparseable rows with a count).
/// 2. Aggregate them into the ordered daily series.
/// 3. Run both anomaly detectors and fuse their verdicts.
/// 4. Annotate recommendations, severity and savings.
/// 5. Compute the KPI triple and the cost forecast.
///
/// Dataset-level problems (nothing parseable, too few days, zero-variance
/// features) surface as [`CostwatchError`] values; the caller decides how to
/// present them.
pub fn analyze_costs(input: &Path, config: &AnalysisConfig) -> Result<AnalysisResult> {
    // ── Step 1: Load rows ─────────────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let (rows, rows_dropped) = load_billing_rows(input)?;
    let load_time = load_start.elapsed().as_secs_f64();

    if rows.is_empty() {
        return Err(CostwatchError::EmptyDataset);
    }

    // ── Step 2: Aggregate ─────────────────────────────────────────────────────
    let days = aggregate_daily(&rows);
    info!(
        "Aggregated {} row(s) into {} day(s) ({} dropped)",
        rows.len(),
        days.len(),
        rows_dropped
    );

    // ── Step 3: Detect anomalies ──────────────────────────────────────────────
    let detect_start = std::time::Instant::now();
    let scored = detect_anomalies(&days, &config.detector)?;
    let detect_time = detect_start.elapsed().as_secs_f64();

    // ── Step 4: Recommendations ───────────────────────────────────────────────
    let advised = annotate_recommendations(&scored);
    let anomalies_flagged = advised.iter().filter(|d| d.is_anomalous()).count();
    info!(
        "Flagged {} anomalous day(s) out of {}",
        anomalies_flagged,
        advised.len()
    );

    // ── Step 5: KPIs and forecast ─────────────────────────────────────────────
    let kpis = compute_kpis(&advised);
    let forecast = forecast_costs(&days, config.horizon)?;

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        rows_read: rows.len(),
        rows_dropped,
        days_analyzed: advised.len(),
        anomalies_flagged,
        load_time_seconds: load_time,
        detect_time_seconds: detect_time,
    };

    Ok(AnalysisResult {
        days: advised,
        kpis,
        forecast,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
