//! Rule-based recommendation, severity, explanation and savings engine.
//!
//! For anomalous days a fixed-priority rule chain assigns a root-cause
//! narrative and a recoverable-cost estimate; severity, explanation and
//! savings priority are total functions evaluated for every day. All
//! thresholds below are tunable parameters, not incidental constants.

use crate::models::{AdvisedDay, SavingsPriority, ScoredDay, Severity};

// ── Tunable thresholds ────────────────────────────────────────────────────────

/// Rule 1 trigger: relative day-over-day cost change above this is a spike.
pub const SPIKE_CHANGE_THRESHOLD: f64 = 0.3;
/// Rule 3 window: how many preceding days are inspected for recurrence.
pub const RECURRING_LOOKBACK: usize = 3;
/// Rule 3 trigger: flagged days within the lookback window.
pub const RECURRING_MIN_FLAGS: usize = 2;

/// Recoverable fraction assumed for a sudden spike.
pub const SPIKE_SAVING_RATE: f64 = 0.30;
/// Recoverable fraction assumed for idle / over-provisioned resources.
pub const IDLE_SAVING_RATE: f64 = 0.50;
/// Recoverable fraction assumed for recurring anomalies.
pub const RECURRING_SAVING_RATE: f64 = 0.35;
/// Recoverable fraction assumed for an unexplained anomaly.
pub const AUDIT_SAVING_RATE: f64 = 0.25;

/// Severity High: cost above this multiple of the average daily cost.
pub const SEVERITY_HIGH_COST_MULTIPLIER: f64 = 2.0;
/// Severity High: cost change above this fraction.
pub const SEVERITY_HIGH_CHANGE: f64 = 0.6;
/// Severity Medium: cost above this multiple of the average daily cost.
pub const SEVERITY_MEDIUM_COST_MULTIPLIER: f64 = 1.2;
/// Severity Medium: cost change above this fraction.
pub const SEVERITY_MEDIUM_CHANGE: f64 = 0.3;

/// Explanation: cost change above this reads as a spike vs. the previous day.
pub const EXPLAIN_SPIKE_CHANGE: f64 = 0.5;

/// Savings priority High: estimated saving above this fraction of avg cost.
pub const PRIORITY_HIGH_FRACTION: f64 = 0.4;
/// Savings priority Medium: estimated saving above this fraction of avg cost.
pub const PRIORITY_MEDIUM_FRACTION: f64 = 0.2;

// ── Narratives ────────────────────────────────────────────────────────────────

const REC_SPIKE: &str = "Sudden cost spike detected. Review recent VM scaling events, \
     autoscaling policies, or newly deployed services.";
const REC_IDLE: &str = "High cost with low usage detected. Possible idle or \
     over-provisioned resources. Consider shutting down unused VMs or downsizing instances.";
const REC_RECURRING: &str = "Recurring cost anomalies detected. Consider Committed Use \
     Discounts or long-term reservations.";
const REC_AUDIT: &str = "Abnormal cost behavior detected. Audit service-level usage, \
     storage growth, and data egress charges.";
const REC_NORMAL: &str = "Normal usage pattern detected.";

const WHY_NORMAL: &str = "Normal spending pattern.";
const WHY_SPIKE: &str = "Sudden spike compared to previous usage.";
const WHY_HIGH: &str = "Unusually high cost compared to historical average.";
const WHY_IRREGULAR: &str = "Irregular pattern detected by anomaly models.";

// ── Engine ────────────────────────────────────────────────────────────────────

/// Annotate every scored day with recommendation, explanation, severity,
/// estimated saving and savings priority.
pub fn annotate_recommendations(scored: &[ScoredDay]) -> Vec<AdvisedDay> {
    if scored.is_empty() {
        return Vec::new();
    }

    let n = scored.len() as f64;
    let avg_cost = scored.iter().map(ScoredDay::cost).sum::<f64>() / n;
    let avg_usage = scored.iter().map(|s| s.day.usage).sum::<f64>() / n;

    scored
        .iter()
        .enumerate()
        .map(|(i, day)| {
            let (recommendation, estimated_saving) = if day.final_anomaly {
                recommend_anomalous(day, i, scored, avg_cost, avg_usage)
            } else {
                (REC_NORMAL, 0.0)
            };

            AdvisedDay {
                scored: day.clone(),
                severity: classify_severity(day, avg_cost),
                recommendation: recommendation.to_string(),
                why_anomaly: explain(day, avg_cost).to_string(),
                estimated_saving,
                savings_priority: classify_savings_priority(estimated_saving, avg_cost),
            }
        })
        .collect()
}

/// Evaluate the anomaly rule chain in fixed priority order; first match wins.
fn recommend_anomalous(
    day: &ScoredDay,
    index: usize,
    scored: &[ScoredDay],
    avg_cost: f64,
    avg_usage: f64,
) -> (&'static str, f64) {
    // Rule 1: sudden spike vs. the previous day.
    if day.day.cost_change > SPIKE_CHANGE_THRESHOLD {
        return (REC_SPIKE, day.cost() * SPIKE_SAVING_RATE);
    }

    // Rule 2: high cost but low usage — idle or over-provisioned resources.
    if day.cost() > avg_cost && day.day.usage < avg_usage {
        return (REC_IDLE, day.cost() * IDLE_SAVING_RATE);
    }

    // Rule 3: recurring anomalies within the lookback window — a missing
    // commitment discount.
    let window_start = index.saturating_sub(RECURRING_LOOKBACK);
    let recent_flags = scored[window_start..index]
        .iter()
        .filter(|s| s.final_anomaly)
        .count();
    if recent_flags >= RECURRING_MIN_FLAGS {
        return (REC_RECURRING, day.cost() * RECURRING_SAVING_RATE);
    }

    // Rule 4: general anomaly — audit.
    (REC_AUDIT, day.cost() * AUDIT_SAVING_RATE)
}

/// Spend severity relative to the dataset-wide average, evaluated for every
/// day regardless of anomaly status.
fn classify_severity(day: &ScoredDay, avg_cost: f64) -> Severity {
    let cost = day.cost();
    let change = day.day.cost_change;

    if cost > SEVERITY_HIGH_COST_MULTIPLIER * avg_cost || change > SEVERITY_HIGH_CHANGE {
        Severity::High
    } else if cost > SEVERITY_MEDIUM_COST_MULTIPLIER * avg_cost || change > SEVERITY_MEDIUM_CHANGE {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Explanation narrative, evaluated for every day.
fn explain(day: &ScoredDay, avg_cost: f64) -> &'static str {
    if !day.final_anomaly {
        WHY_NORMAL
    } else if day.day.cost_change > EXPLAIN_SPIKE_CHANGE {
        WHY_SPIKE
    } else if day.cost() > avg_cost {
        WHY_HIGH
    } else {
        WHY_IRREGULAR
    }
}

/// Bucket the estimated saving relative to the average daily cost.
fn classify_savings_priority(estimated_saving: f64, avg_cost: f64) -> SavingsPriority {
    if estimated_saving > PRIORITY_HIGH_FRACTION * avg_cost {
        SavingsPriority::HighSavings
    } else if estimated_saving > PRIORITY_MEDIUM_FRACTION * avg_cost {
        SavingsPriority::Medium
    } else if estimated_saving > 0.0 {
        SavingsPriority::Low
    } else {
        SavingsPriority::NoSavings
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
