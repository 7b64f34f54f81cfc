//! Summary KPI reduction over the annotated series.

use serde::{Deserialize, Serialize};

use crate::models::AdvisedDay;

/// Conservative fraction of anomalous spend assumed recoverable.
pub const CONSERVATIVE_SAVINGS_RATE: f64 = 0.30;

/// The KPI triple shown at the top of the report.
///
/// `potential_savings` uses the conservative global policy
/// (`anomaly_spend × 0.30`) rather than the sum of per-day rule-based
/// estimates; the latter remains available via [`rule_based_savings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostKpis {
    /// Sum of cost over every day.
    pub total_spend: f64,
    /// Sum of cost restricted to anomalous days.
    pub anomaly_spend: f64,
    /// Conservative estimate of recoverable spend.
    pub potential_savings: f64,
}

impl CostKpis {
    /// Anomalous spend as a fraction of total spend; `0.0` when there is no
    /// spend at all.
    pub fn anomaly_share(&self) -> f64 {
        if self.total_spend == 0.0 {
            0.0
        } else {
            self.anomaly_spend / self.total_spend
        }
    }
}

/// Reduce the annotated series into the KPI triple.
pub fn compute_kpis(days: &[AdvisedDay]) -> CostKpis {
    let total_spend: f64 = days.iter().map(AdvisedDay::cost).sum();
    let anomaly_spend: f64 = days
        .iter()
        .filter(|d| d.is_anomalous())
        .map(AdvisedDay::cost)
        .sum();

    CostKpis {
        total_spend,
        anomaly_spend,
        potential_savings: anomaly_spend * CONSERVATIVE_SAVINGS_RATE,
    }
}

/// Alternative savings policy: the sum of per-day rule-based estimates.
///
/// Not part of the KPI triple; reported as a secondary figure.
pub fn rule_based_savings(days: &[AdvisedDay]) -> f64 {
    days.iter().map(|d| d.estimated_saving).sum()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyUsage, SavingsPriority, ScoredDay, Severity};
    use chrono::NaiveDate;

    fn make_advised(offset: u64, cost: f64, anomalous: bool, saving: f64) -> AdvisedDay {
        let day = DailyUsage {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + chrono::Days::new(offset),
            cost,
            usage: 1.0,
            cost_change: 0.0,
            rolling_avg: cost,
        };
        AdvisedDay {
            scored: ScoredDay::new(day, anomalous, false),
            severity: Severity::Low,
            recommendation: String::new(),
            why_anomaly: String::new(),
            estimated_saving: saving,
            savings_priority: SavingsPriority::NoSavings,
        }
    }

    #[test]
    fn test_compute_kpis_sums() {
        let days = vec![
            make_advised(0, 100.0, false, 0.0),
            make_advised(1, 200.0, true, 60.0),
            make_advised(2, 300.0, true, 150.0),
        ];
        let kpis = compute_kpis(&days);

        assert!((kpis.total_spend - 600.0).abs() < 1e-9);
        assert!((kpis.anomaly_spend - 500.0).abs() < 1e-9);
        // Conservative policy: 500 * 0.30.
        assert!((kpis.potential_savings - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_rule_based_savings_sums_per_day_estimates() {
        let days = vec![
            make_advised(0, 100.0, false, 0.0),
            make_advised(1, 200.0, true, 60.0),
            make_advised(2, 300.0, true, 150.0),
        ];
        assert!((rule_based_savings(&days) - 210.0).abs() < 1e-9);
    }

    #[test]
    fn test_anomaly_share() {
        let days = vec![
            make_advised(0, 300.0, false, 0.0),
            make_advised(1, 100.0, true, 25.0),
        ];
        let kpis = compute_kpis(&days);
        assert!((kpis.anomaly_share() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_empty_series() {
        let kpis = compute_kpis(&[]);
        assert_eq!(kpis.total_spend, 0.0);
        assert_eq!(kpis.anomaly_spend, 0.0);
        assert_eq!(kpis.potential_savings, 0.0);
        assert_eq!(kpis.anomaly_share(), 0.0);
    }
}
