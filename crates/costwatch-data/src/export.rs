//! Delimited export of the anomalous days.
//!
//! Writes only the flagged records, with their recommendation, severity and
//! savings fields, for downstream spreadsheet review.

use std::path::Path;

use costwatch_core::error::Result;
use costwatch_core::models::AdvisedDay;
use tracing::info;

/// Column order of the export file.
const HEADER: [&str; 7] = [
    "date",
    "cost",
    "estimated_saving",
    "severity",
    "savings_priority",
    "recommendation",
    "why_anomaly",
];

/// Write every anomalous day to `path` as CSV.
///
/// Returns the number of records written (excluding the header).
pub fn export_anomalies(days: &[AdvisedDay], path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;

    let mut written = 0usize;
    for day in days.iter().filter(|d| d.is_anomalous()) {
        writer.write_record([
            day.date().to_string(),
            format!("{:.2}", day.cost()),
            format!("{:.2}", day.estimated_saving),
            day.severity.to_string(),
            day.savings_priority.to_string(),
            day.recommendation.clone(),
            day.why_anomaly.clone(),
        ])?;
        written += 1;
    }

    writer.flush()?;
    info!("Exported {} anomalous day(s) to {}", written, path.display());
    Ok(written)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_core::models::{DailyUsage, SavingsPriority, ScoredDay, Severity};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn make_advised(offset: u64, cost: f64, anomalous: bool) -> AdvisedDay {
        let day = DailyUsage {
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap() + chrono::Days::new(offset),
            cost,
            usage: 1.0,
            cost_change: 0.0,
            rolling_avg: cost,
        };
        AdvisedDay {
            scored: ScoredDay::new(day, anomalous, false),
            severity: Severity::Medium,
            recommendation: "Audit usage.".to_string(),
            why_anomaly: "Irregular pattern.".to_string(),
            estimated_saving: if anomalous { cost * 0.25 } else { 0.0 },
            savings_priority: if anomalous {
                SavingsPriority::Low
            } else {
                SavingsPriority::NoSavings
            },
        }
    }

    #[test]
    fn test_export_writes_only_anomalous_days() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("anomalies.csv");

        let days = vec![
            make_advised(0, 100.0, false),
            make_advised(1, 250.0, true),
            make_advised(2, 110.0, false),
            make_advised(3, 300.0, true),
        ];
        let written = export_anomalies(&days, &path).unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        // Header plus the two flagged days.
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,cost,estimated_saving"));
        assert!(lines[1].starts_with("2024-07-02,250.00,62.50,Medium,Low"));
        assert!(lines[2].starts_with("2024-07-04,300.00,75.00,Medium,Low"));
    }

    #[test]
    fn test_export_no_anomalies_writes_header_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("anomalies.csv");

        let days = vec![make_advised(0, 100.0, false)];
        let written = export_anomalies(&days, &path).unwrap();
        assert_eq!(written, 0);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
