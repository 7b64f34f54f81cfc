//! Staged record types for the analysis pipeline.
//!
//! Each pipeline stage wraps the previous stage's output in a new type that
//! adds its fields, so the presence of every derived column is checked at
//! compile time: [`BillingRow`] → [`DailyUsage`] → [`ScoredDay`] →
//! [`AdvisedDay`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single raw billing line item after date/number parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingRow {
    /// Calendar date the usage started (time-of-day discarded).
    pub date: NaiveDate,
    /// Line-item cost in the dataset's currency.
    pub cost: f64,
    /// Line-item usage quantity.
    pub usage: f64,
    /// Originating service name, carried for export but unused by the
    /// pipeline.
    #[serde(default)]
    pub service: Option<String>,
}

/// One day of the aggregated cost series with its derived features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Calendar date, unique within a series.
    pub date: NaiveDate,
    /// Total cost across all line items on this date.
    pub cost: f64,
    /// Total usage quantity across all line items on this date.
    pub usage: f64,
    /// Relative cost change vs. the previous day; `0.0` for the first day
    /// or when the previous day's cost is zero.
    pub cost_change: f64,
    /// Trailing 7-day mean of `cost`, leading days backfilled from the
    /// first complete window.
    pub rolling_avg: f64,
}

/// A daily record annotated with the two detector verdicts and their fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDay {
    /// The underlying daily record.
    pub day: DailyUsage,
    /// Isolation-forest verdict.
    pub if_anomaly: bool,
    /// Autoencoder reconstruction-error verdict.
    pub ae_anomaly: bool,
    /// OR-fusion of the two verdicts.
    pub final_anomaly: bool,
}

impl ScoredDay {
    /// Build a scored day; `final_anomaly` is always the OR of the two
    /// detector flags.
    pub fn new(day: DailyUsage, if_anomaly: bool, ae_anomaly: bool) -> Self {
        Self {
            day,
            if_anomaly,
            ae_anomaly,
            final_anomaly: if_anomaly || ae_anomaly,
        }
    }

    /// Calendar date of the underlying record.
    pub fn date(&self) -> NaiveDate {
        self.day.date
    }

    /// Total cost of the underlying record.
    pub fn cost(&self) -> f64 {
        self.day.cost
    }
}

/// Spend severity tier, derived from cost and cost change relative to the
/// dataset-wide average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

/// Bucket of estimated recoverable spend relative to average daily cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SavingsPriority {
    #[serde(rename = "No Savings")]
    NoSavings,
    Low,
    Medium,
    #[serde(rename = "High Savings")]
    HighSavings,
}

impl std::fmt::Display for SavingsPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoSavings => "No Savings",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::HighSavings => "High Savings",
        };
        f.write_str(s)
    }
}

/// The fully annotated record produced by the recommendation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisedDay {
    /// The scored record this advice is attached to.
    pub scored: ScoredDay,
    /// Spend severity tier.
    pub severity: Severity,
    /// Actionable recommendation text.
    pub recommendation: String,
    /// Why this day was (or was not) flagged.
    pub why_anomaly: String,
    /// Estimated recoverable cost; always `0.0` for non-anomalous days.
    pub estimated_saving: f64,
    /// Savings bucket derived from `estimated_saving`.
    pub savings_priority: SavingsPriority,
}

impl AdvisedDay {
    /// Calendar date of the underlying record.
    pub fn date(&self) -> NaiveDate {
        self.scored.date()
    }

    /// Total cost of the underlying record.
    pub fn cost(&self) -> f64 {
        self.scored.cost()
    }

    /// Whether the fused detectors flagged this day.
    pub fn is_anomalous(&self) -> bool {
        self.scored.final_anomaly
    }
}
