//! Pipeline configuration
//!
//! Every stage resolves its paths through one [`PipelineConfig`], so the file
//! naming conventions live in a single place.

use std::path::{Path, PathBuf};

use crate::experiment::RUN_PREFIX;
use crate::plot::ChartFormat;

/// Default raw training log file name inside an experiment directory
pub const TRAINING_LOG_FILE: &str = "training_log.csv";
/// Default metrics artifact file name inside an experiment directory
pub const METRICS_FILE: &str = "final_metrics.csv";
/// Default summary table file name in the sweep root
pub const SUMMARY_FILE: &str = "all_experiment_summary.csv";
/// Default Parquet twin of the summary table
pub const SUMMARY_PARQUET_FILE: &str = "all_experiment_summary.parquet";
/// Default sweep manifest file name in the sweep root
pub const MANIFEST_FILE: &str = "sweep_manifest.json";

/// Paths and conventions shared by all pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    root: PathBuf,
    prefix: String,
    training_log_file: String,
    metrics_file: String,
    summary_file: String,
    plots_dir: String,
    samples_dir: String,
    top_n: usize,
    chart_format: ChartFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            prefix: RUN_PREFIX.to_string(),
            training_log_file: TRAINING_LOG_FILE.to_string(),
            metrics_file: METRICS_FILE.to_string(),
            summary_file: SUMMARY_FILE.to_string(),
            plots_dir: "plots".to_string(),
            samples_dir: "samples".to_string(),
            top_n: 5,
            chart_format: ChartFormat::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a config builder with defaults rooted at `.`
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Sweep root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name prefix that marks experiment directories
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// How many experiments the leaderboards and top-N charts cover
    #[must_use]
    pub const fn top_n(&self) -> usize {
        self.top_n
    }

    /// Image format for charts
    #[must_use]
    pub const fn chart_format(&self) -> ChartFormat {
        self.chart_format
    }

    /// Directory of one experiment
    #[must_use]
    pub fn experiment_dir(&self, experiment: &str) -> PathBuf {
        self.root.join(experiment)
    }

    /// `training_log.csv` of one experiment
    #[must_use]
    pub fn training_log_path(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join(&self.training_log_file)
    }

    /// `final_metrics.csv` of one experiment
    #[must_use]
    pub fn metrics_path(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join(&self.metrics_file)
    }

    /// Summary table in the sweep root
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.root.join(&self.summary_file)
    }

    /// Parquet twin of the summary table
    #[must_use]
    pub fn summary_parquet_path(&self) -> PathBuf {
        self.summary_path().with_extension("parquet")
    }

    /// Sweep manifest in the sweep root
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Output folder for per-experiment and sensitivity charts
    #[must_use]
    pub fn plots_dir(&self) -> PathBuf {
        self.root.join(&self.plots_dir)
    }

    /// Output folder for the top-N charts (`plots_top5` by default)
    #[must_use]
    pub fn top_plots_dir(&self) -> PathBuf {
        self.root.join(format!("{}_top{}", self.plots_dir, self.top_n))
    }

    /// Output folder for sampler transcripts
    #[must_use]
    pub fn samples_dir(&self) -> PathBuf {
        self.root.join(&self.samples_dir)
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the sweep root directory
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Set the experiment directory prefix
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the training log file name
    #[must_use]
    pub fn training_log_file(mut self, name: impl Into<String>) -> Self {
        self.config.training_log_file = name.into();
        self
    }

    /// Set the metrics artifact file name
    #[must_use]
    pub fn metrics_file(mut self, name: impl Into<String>) -> Self {
        self.config.metrics_file = name.into();
        self
    }

    /// Set the summary file name
    #[must_use]
    pub fn summary_file(mut self, name: impl Into<String>) -> Self {
        self.config.summary_file = name.into();
        self
    }

    /// Set the plots folder name
    #[must_use]
    pub fn plots_dir(mut self, name: impl Into<String>) -> Self {
        self.config.plots_dir = name.into();
        self
    }

    /// Set the samples folder name
    #[must_use]
    pub fn samples_dir(mut self, name: impl Into<String>) -> Self {
        self.config.samples_dir = name.into();
        self
    }

    /// Set the leaderboard size
    #[must_use]
    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    /// Set the chart image format
    #[must_use]
    pub fn chart_format(mut self, format: ChartFormat) -> Self {
        self.config.chart_format = format;
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
