//! Error types for nanosweep
//!
//! Per-experiment variants (`MissingLog` through `MissingColumn`) are never
//! fatal for a batch: loops collect them into their run reports and move on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Nanosweep error types
#[derive(Error, Debug)]
pub enum Error {
    /// The experiment has no `training_log.csv`
    #[error("{experiment}: no training log at {}", path.display())]
    MissingLog {
        /// Experiment directory name
        experiment: String,
        /// Expected log path
        path: PathBuf,
    },

    /// The training log exists but holds no data rows
    #[error("{experiment}: empty training log")]
    EmptyLog {
        /// Experiment directory name
        experiment: String,
    },

    /// A loss cell is neither a decimal nor `tensor(<decimal>)`
    #[error("{experiment}: could not parse {column} value {value:?}")]
    UnparsableLoss {
        /// Experiment directory name
        experiment: String,
        /// Column the value came from
        column: String,
        /// Raw cell text
        value: String,
    },

    /// Directory name does not follow the `out_bs.._nl.._..` convention
    #[error("{0}: could not parse hyperparameters from directory name")]
    UnparsableName(String),

    /// No `final_metrics.csv` for the experiment (run `evaluate` first)
    #[error("{experiment}: no metrics artifact at {}", path.display())]
    MissingMetricsArtifact {
        /// Experiment directory name
        experiment: String,
        /// Expected artifact path
        path: PathBuf,
    },

    /// Metrics artifact has a header but no row
    #[error("{0}: metrics artifact has no rows")]
    EmptyMetricsArtifact(String),

    /// A required column is absent from a table
    #[error("{}: missing column {column:?}", path.display())]
    MissingColumn {
        /// File that was read
        path: PathBuf,
        /// Column name that was expected
        column: String,
    },

    /// Invalid argument or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Chart rendering failed
    #[error("Plot error: {0}")]
    PlotError(String),

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// External trainer/sampler could not be spawned or waited on
    #[error("Process error: {0}")]
    ProcessError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the per-experiment taxonomy that batch loops skip over.
    #[must_use]
    pub const fn is_per_experiment(&self) -> bool {
        matches!(
            self,
            Self::MissingLog { .. }
                | Self::EmptyLog { .. }
                | Self::UnparsableLoss { .. }
                | Self::UnparsableName(_)
                | Self::MissingMetricsArtifact { .. }
                | Self::EmptyMetricsArtifact(_)
                | Self::MissingColumn { .. }
        )
    }
}
