//! Daily aggregation of raw billing rows.
//!
//! Groups line items by calendar date, sums cost and usage, then derives
//! the day-over-day relative cost change and the trailing 7-day rolling
//! average that feed the anomaly detectors.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use costwatch_core::models::{BillingRow, DailyUsage};

/// Width of the trailing rolling-average window, in days.
pub const ROLLING_WINDOW: usize = 7;

/// Aggregate raw billing rows into the ordered daily series.
///
/// The output has exactly one record per distinct calendar date, sorted
/// ascending. `cost_change` is `0.0` for the first day and after a
/// zero-cost day (division guard); the rolling average is backfilled over
/// the leading days from the first complete window.
pub fn aggregate_daily(rows: &[BillingRow]) -> Vec<DailyUsage> {
    // BTreeMap keeps the dates sorted and deduplicated by construction.
    let mut totals: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.date).or_insert((0.0, 0.0));
        entry.0 += row.cost;
        entry.1 += row.usage;
    }

    let mut days: Vec<DailyUsage> = totals
        .into_iter()
        .map(|(date, (cost, usage))| DailyUsage {
            date,
            cost,
            usage,
            cost_change: 0.0,
            rolling_avg: 0.0,
        })
        .collect();

    apply_cost_change(&mut days);
    apply_rolling_average(&mut days);
    days
}

/// Relative change vs. the previous day: `(cost[i] − cost[i−1]) / cost[i−1]`.
///
/// The first record and any record following a zero-cost day get `0.0`.
fn apply_cost_change(days: &mut [DailyUsage]) {
    for i in 1..days.len() {
        let prev = days[i - 1].cost;
        days[i].cost_change = if prev != 0.0 {
            (days[i].cost - prev) / prev
        } else {
            0.0
        };
    }
}

/// Trailing [`ROLLING_WINDOW`]-day mean of cost ending at each record.
///
/// Records before the first complete window take that window's value
/// (backward fill), so the series has no leading undefined values. A series
/// shorter than the window falls back to the full-series mean.
fn apply_rolling_average(days: &mut [DailyUsage]) {
    let n = days.len();
    if n == 0 {
        return;
    }

    if n < ROLLING_WINDOW {
        let mean = days.iter().map(|d| d.cost).sum::<f64>() / n as f64;
        for day in days {
            day.rolling_avg = mean;
        }
        return;
    }

    let costs: Vec<f64> = days.iter().map(|d| d.cost).collect();
    for i in (ROLLING_WINDOW - 1)..n {
        let window = &costs[i + 1 - ROLLING_WINDOW..=i];
        days[i].rolling_avg = window.iter().sum::<f64>() / ROLLING_WINDOW as f64;
    }

    let backfill = days[ROLLING_WINDOW - 1].rolling_avg;
    for day in &mut days[..ROLLING_WINDOW - 1] {
        day.rolling_avg = backfill;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
