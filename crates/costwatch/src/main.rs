mod bootstrap;

use anyhow::Result;
use costwatch_core::detector::DetectorConfig;
use costwatch_core::formatting::{format_currency, percentage};
use costwatch_core::kpi::rule_based_savings;
use costwatch_core::settings::Settings;
use costwatch_data::analysis::{analyze_costs, AnalysisConfig, AnalysisResult};
use costwatch_data::export::export_anomalies;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();
    settings.validate()?;

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("costwatch v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Input: {}, horizon: {} day(s), seed: {}",
        settings.input.display(),
        settings.horizon,
        settings.seed
    );

    let config = analysis_config(&settings);
    let result = analyze_costs(&settings.input, &config)?;

    print_report(&result);

    if let Some(path) = &settings.export {
        let written = export_anomalies(&result.days, path)?;
        println!();
        println!("Exported {} anomalous day(s) to {}", written, path.display());
    }

    if let Err(e) = settings.to_last_used().save() {
        tracing::warn!("Failed to persist last-used parameters: {}", e);
    }

    Ok(())
}

/// Map CLI settings onto the pipeline configuration.
fn analysis_config(settings: &Settings) -> AnalysisConfig {
    let mut detector = DetectorConfig::with_seed(settings.seed);
    detector.forest.contamination = settings.contamination;
    detector.autoencoder.epochs = settings.epochs;

    AnalysisConfig {
        detector,
        horizon: settings.horizon,
    }
}

/// Print the KPI block, the anomalous-day table and the forecast summary.
fn print_report(result: &AnalysisResult) {
    let kpis = &result.kpis;
    let meta = &result.metadata;

    println!("Cloud Cost Analysis");
    println!("===================");
    println!(
        "Analyzed {} day(s) from {} billing row(s) ({} dropped)",
        meta.days_analyzed, meta.rows_read, meta.rows_dropped
    );
    println!();
    println!("Total cloud spend:    {}", format_currency(kpis.total_spend));
    println!(
        "Spend in anomalies:   {}  ({}% of total)",
        format_currency(kpis.anomaly_spend),
        percentage(kpis.anomaly_spend, kpis.total_spend, 1)
    );
    println!(
        "Potential savings:    {}  (conservative)",
        format_currency(kpis.potential_savings)
    );
    println!(
        "Rule-based estimate:  {}",
        format_currency(rule_based_savings(&result.days))
    );

    println!();
    if meta.anomalies_flagged == 0 {
        println!("No anomalous days detected.");
    } else {
        println!("Anomalous days:");
        println!(
            "  {:<12} {:>10} {:>10}  {:<8} {:<13} why",
            "date", "cost", "saving", "severity", "priority"
        );
        for day in result.days.iter().filter(|d| d.is_anomalous()) {
            println!(
                "  {:<12} {:>10} {:>10}  {:<8} {:<13} {}",
                day.date(),
                format_currency(day.cost()),
                format_currency(day.estimated_saving),
                day.severity,
                day.savings_priority,
                day.why_anomaly
            );
            println!("      -> {}", day.recommendation);
        }
    }

    if !result.forecast.is_empty() {
        let total: f64 = result.forecast.iter().sum();
        let mean = total / result.forecast.len() as f64;
        println!();
        println!(
            "Forecast, next {} day(s): {} projected total, {} per day on average",
            result.forecast.len(),
            format_currency(total),
            format_currency(mean)
        );
    }
}
