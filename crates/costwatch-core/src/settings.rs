//! CLI settings and persisted last-used parameters.

use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CostwatchError, Result};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Cloud billing cost anomaly detection and optimization
#[derive(Parser, Debug, Clone)]
#[command(
    name = "costwatch",
    about = "Cloud billing cost anomaly detection and optimization",
    version
)]
pub struct Settings {
    /// Billing CSV file, or a directory of CSV exports
    pub input: PathBuf,

    /// Number of future days to project
    #[arg(long, default_value_t = 30)]
    pub horizon: usize,

    /// Expected fraction of anomalous days (isolation-forest contamination)
    #[arg(long, default_value_t = 0.05)]
    pub contamination: f64,

    /// Autoencoder training epochs
    #[arg(long, default_value_t = 40)]
    pub epochs: usize,

    /// Random seed shared by both detectors
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write anomalous days to this CSV file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,
}

impl Settings {
    /// Parse the command line, then fill in any argument the user did not
    /// set explicitly from the persisted last-used parameters.
    pub fn load_with_last_used() -> Self {
        let matches = Self::command().get_matches();
        let mut settings =
            Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        let last = LastUsedParams::load();
        merge_last_used(
            &mut settings,
            &last,
            is_arg_explicitly_set(&matches, "horizon"),
            is_arg_explicitly_set(&matches, "log_level"),
        );
        settings
    }

    /// Check configuration values that clap cannot express as value parsers.
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination < 0.5) {
            return Err(CostwatchError::Config(format!(
                "contamination must be in (0, 0.5), got {}",
                self.contamination
            )));
        }
        if self.horizon == 0 {
            return Err(CostwatchError::Config(
                "horizon must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Snapshot the parameters worth remembering for the next run.
    pub fn to_last_used(&self) -> LastUsedParams {
        LastUsedParams {
            horizon: Some(self.horizon),
            log_level: Some(self.log_level.clone()),
        }
    }
}

/// Overwrite defaults with persisted values for args the user did not set.
fn merge_last_used(
    settings: &mut Settings,
    last: &LastUsedParams,
    horizon_explicit: bool,
    log_level_explicit: bool,
) {
    if !horizon_explicit {
        if let Some(horizon) = last.horizon {
            settings.horizon = horizon;
        }
    }
    if !log_level_explicit {
        if let Some(level) = &last.log_level {
            settings.log_level = level.clone();
        }
    }
}

/// Whether `name` was supplied on the command line (as opposed to a default).
///
/// NOTE: clap stores the arg id using the *field name* (underscores), not
/// the kebab-case flag name.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.costwatch/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file:
    /// `~/.costwatch/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".costwatch").join("last_used.json")
    }

    /// Load persisted params from the default path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load persisted params from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to the default path, creating parent
    /// directories if needed.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── Settings parsing ──────────────────────────────────────────────────────

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::try_parse_from(["costwatch", "billing.csv"]).unwrap();
        assert_eq!(settings.input, PathBuf::from("billing.csv"));
        assert_eq!(settings.horizon, 30);
        assert!((settings.contamination - 0.05).abs() < 1e-12);
        assert_eq!(settings.epochs, 40);
        assert_eq!(settings.seed, 42);
        assert!(settings.export.is_none());
        assert_eq!(settings.log_level, "INFO");
    }

    #[test]
    fn test_settings_explicit_flags() {
        let settings = Settings::try_parse_from([
            "costwatch",
            "data/",
            "--horizon",
            "14",
            "--seed",
            "7",
            "--export",
            "out.csv",
            "--log-level",
            "DEBUG",
        ])
        .unwrap();
        assert_eq!(settings.horizon, 14);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.export, Some(PathBuf::from("out.csv")));
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_settings_missing_input_is_an_error() {
        assert!(Settings::try_parse_from(["costwatch"]).is_err());
    }

    #[test]
    fn test_settings_invalid_log_level_rejected() {
        assert!(Settings::try_parse_from(["costwatch", "x.csv", "--log-level", "TRACE"]).is_err());
    }

    // ── validate ──────────────────────────────────────────────────────────────

    #[test]
    fn test_validate_rejects_bad_contamination() {
        let mut settings = Settings::try_parse_from(["costwatch", "x.csv"]).unwrap();
        settings.contamination = 0.9;
        assert!(settings.validate().is_err());
        settings.contamination = 0.0;
        assert!(settings.validate().is_err());
        settings.contamination = 0.05;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_horizon() {
        let mut settings = Settings::try_parse_from(["costwatch", "x.csv"]).unwrap();
        settings.horizon = 0;
        assert!(settings.validate().is_err());
    }

    // ── merge_last_used ───────────────────────────────────────────────────────

    #[test]
    fn test_merge_fills_unset_args_only() {
        let mut settings = Settings::try_parse_from(["costwatch", "x.csv"]).unwrap();
        let last = LastUsedParams {
            horizon: Some(90),
            log_level: Some("DEBUG".to_string()),
        };

        merge_last_used(&mut settings, &last, false, true);
        assert_eq!(settings.horizon, 90);
        // log_level was explicit on the command line; keep it.
        assert_eq!(settings.log_level, "INFO");
    }

    // ── LastUsedParams persistence ────────────────────────────────────────────

    #[test]
    fn test_last_used_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = LastUsedParams::config_path_in(tmp.path());

        let params = LastUsedParams {
            horizon: Some(60),
            log_level: Some("WARNING".to_string()),
        };
        params.save_to(&path).unwrap();

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.horizon, Some(60));
        assert_eq!(loaded.log_level.as_deref(), Some("WARNING"));
    }

    #[test]
    fn test_last_used_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let loaded = LastUsedParams::load_from(&tmp.path().join("nope.json"));
        assert!(loaded.horizon.is_none());
        assert!(loaded.log_level.is_none());
    }

    #[test]
    fn test_last_used_corrupt_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("last_used.json");
        std::fs::write(&path, "{not json").unwrap();
        let loaded = LastUsedParams::load_from(&path);
        assert!(loaded.horizon.is_none());
    }

    #[test]
    fn test_to_last_used_snapshot() {
        let settings =
            Settings::try_parse_from(["costwatch", "x.csv", "--horizon", "21"]).unwrap();
        let last = settings.to_last_used();
        assert_eq!(last.horizon, Some(21));
        assert_eq!(last.log_level.as_deref(), Some("INFO"));
    }
}
