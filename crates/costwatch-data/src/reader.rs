//! Billing CSV discovery and loading.
//!
//! Reads raw line-item billing exports and converts them into
//! [`BillingRow`] structs for aggregation. Parsing is deliberately
//! permissive: mixed timestamp formats with a day-before-month preference,
//! currency symbols and thousands separators in numeric cells. Rows that
//! still fail to parse are dropped and counted, never fatal.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use costwatch_core::error::{CostwatchError, Result};
use costwatch_core::models::BillingRow;
use regex::Regex;
use tracing::{debug, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.csv` files under `input`, sorted by path.
///
/// A single `.csv` file is returned as-is; a directory is walked
/// recursively.
pub fn find_csv_files(input: &Path) -> Vec<PathBuf> {
    if !input.exists() {
        warn!("Input path does not exist: {}", input.display());
        return Vec::new();
    }

    if input.is_file() {
        return if has_csv_extension(input) {
            vec![input.to_path_buf()]
        } else {
            warn!("Input file is not a .csv: {}", input.display());
            Vec::new()
        };
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && has_csv_extension(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every billing row from `input` (a CSV file or a directory of CSV
/// exports).
///
/// Returns `(rows, dropped)` where `dropped` counts rows discarded for an
/// unparseable date or numeric cell. Rows are returned in file order; the
/// aggregator establishes date order.
pub fn load_billing_rows(input: &Path) -> Result<(Vec<BillingRow>, u64)> {
    let files = find_csv_files(input);
    if files.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let amount_junk = Regex::new(r"(?i)[,\s₹$]|rs\.?").expect("regex is valid");

    let mut all_rows: Vec<BillingRow> = Vec::new();
    let mut total_dropped = 0u64;

    for file in &files {
        let (rows, dropped) = process_single_file(file, &amount_junk)?;
        all_rows.extend(rows);
        total_dropped += dropped;
    }

    if total_dropped > 0 {
        warn!(
            "Dropped {} unparseable row(s) across {} file(s)",
            total_dropped,
            files.len()
        );
    }

    Ok((all_rows, total_dropped))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Which header index carries each required field.
struct ColumnMap {
    date: usize,
    cost: usize,
    usage: usize,
    service: Option<usize>,
}

/// Resolve the column layout from the header row.
///
/// Headers are matched case-insensitively against the reference billing
/// export names first, then by substring fallback, so `Usage Start Date` /
/// `Total Cost (INR)` / `Usage Quantity` and plain `date` / `cost` /
/// `usage` both work.
fn resolve_columns(headers: &csv::StringRecord) -> Result<ColumnMap> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let exact = |candidates: &[&str]| -> Option<usize> {
        normalized
            .iter()
            .position(|h| candidates.contains(&h.as_str()))
    };

    let date = exact(&["usage start date", "date", "usage_start_date", "start date"])
        .or_else(|| normalized.iter().position(|h| h.contains("date")))
        .ok_or_else(|| CostwatchError::MissingColumn("Usage Start Date".to_string()))?;

    let cost = exact(&["total cost (inr)", "cost", "total cost", "total_cost_inr"])
        .or_else(|| normalized.iter().position(|h| h.contains("cost")))
        .ok_or_else(|| CostwatchError::MissingColumn("Total Cost (INR)".to_string()))?;

    let usage = exact(&["usage quantity", "usage", "usage_quantity", "quantity"])
        .or_else(|| {
            normalized.iter().position(|h| {
                (h.contains("usage") || h.contains("quantity")) && !h.contains("date")
            })
        })
        .ok_or_else(|| CostwatchError::MissingColumn("Usage Quantity".to_string()))?;

    let service = exact(&["service name", "service", "service_name"])
        .or_else(|| normalized.iter().position(|h| h.contains("service")));

    Ok(ColumnMap {
        date,
        cost,
        usage,
        service,
    })
}

/// Read one CSV file, returning parsed rows and the dropped-row count.
fn process_single_file(path: &Path, amount_junk: &Regex) -> Result<(Vec<BillingRow>, u64)> {
    let file = std::fs::File::open(path).map_err(|source| CostwatchError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let columns = resolve_columns(reader.headers()?)?;

    let mut rows: Vec<BillingRow> = Vec::new();
    let mut dropped = 0u64;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping malformed CSV record in {}: {}", path.display(), e);
                dropped += 1;
                continue;
            }
        };

        let Some(date) = record.get(columns.date).and_then(parse_billing_date) else {
            dropped += 1;
            continue;
        };
        let Some(cost) = record
            .get(columns.cost)
            .and_then(|s| parse_amount(s, amount_junk))
        else {
            dropped += 1;
            continue;
        };
        let Some(usage) = record
            .get(columns.usage)
            .and_then(|s| parse_amount(s, amount_junk))
        else {
            dropped += 1;
            continue;
        };

        let service = columns
            .service
            .and_then(|i| record.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        rows.push(BillingRow {
            date,
            cost,
            usage,
            service,
        });
    }

    debug!(
        "File {}: {} row(s) parsed, {} dropped",
        path.display(),
        rows.len(),
        dropped
    );

    Ok((rows, dropped))
}

/// Parse a billing timestamp into a calendar date, discarding time-of-day.
///
/// Tries RFC 3339 first, then a series of common date-time and date-only
/// patterns. Slash- and dash-delimited forms prefer day-before-month, so an
/// ambiguous `03/04/2024` reads as April 3rd.
fn parse_billing_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // RFC 3339 / ISO 8601 with offset (including the `Z` suffix).
    let normalised = if let Some(stripped) = s.strip_suffix('Z') {
        format!("{}+00:00", stripped)
    } else {
        s.to_string()
    };
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&normalised) {
        return Some(dt.date_naive());
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d-%m-%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.date());
        }
    }

    // Day-first patterns come before month-first so ambiguous dates resolve
    // day-before-month.
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%d/%m/%y",
        "%Y/%m/%d",
        "%m/%d/%Y",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    None
}

/// Parse a currency-formatted numeric cell.
///
/// Strips thousands separators, whitespace and currency markers (`₹`, `$`,
/// `Rs`) before parsing; anything else failing to parse yields `None`.
fn parse_amount(s: &str, amount_junk: &Regex) -> Option<f64> {
    let cleaned = amount_junk.replace_all(s.trim(), "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
