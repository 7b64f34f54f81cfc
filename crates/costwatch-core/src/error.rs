use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by costwatch.
#[derive(Error, Debug)]
pub enum CostwatchError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A delimited record could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required input column is absent from the file header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// No parseable billing rows survived cleaning.
    #[error("No parseable billing rows were found in the input")]
    EmptyDataset,

    /// The aggregated series is too short for the requested stage.
    #[error("Insufficient data: {days} day(s) after aggregation, need at least {min}")]
    InsufficientData { days: usize, min: usize },

    /// A feature column has zero variance, so the detector inputs cannot
    /// be standardized.
    #[error("Feature \"{feature}\" has zero variance; cannot standardize detector inputs")]
    DegenerateFeature { feature: String },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the costwatch crates.
pub type Result<T> = std::result::Result<T, CostwatchError>;
