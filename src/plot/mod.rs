//! Plot sink: loss curves, sensitivity charts, top-N overlay
//!
//! Charts are described as plain data ([`LineChart`]) and rendered by
//! [`render`]. A missing log or an unrenderable chart is a warning in the
//! [`PlotReport`], never an error for the batch.
//!
//! ```text
//! plots/
//!   <experiment>_loss_curve.png
//!   val_loss_vs_embd.png / val_loss_vs_dropout.png / val_loss_vs_batch.png
//! plots_top5/
//!   <experiment>_loss_curve.png
//!   top5_validation_comparison.png
//! ```

mod render;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::experiment::{list_runs, HyperparameterField, RawTrainingLog};
use crate::summary::{SummaryRow, SummaryTable};
use crate::{Error, Result};

pub use render::render;

/// Image format of written charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    /// Raster image (the default; requires the `png` feature)
    #[default]
    Png,
    /// Scalable vector graphics (always available)
    Svg,
}

impl ChartFormat {
    /// File extension without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }

    /// Check that this build can write the format.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for PNG when the crate was built without `png`.
    pub fn ensure_supported(self) -> Result<()> {
        match self {
            Self::Png if !cfg!(feature = "png") => Err(Error::InvalidInput(
                "PNG charts require the `png` feature; use --format svg".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// One line on a chart
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend entry
    pub label: String,
    /// Points in drawing order
    pub points: Vec<(f64, f64)>,
    /// Draw a marker at every point
    pub markers: bool,
}

/// A titled line chart, independent of the output backend
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    /// Caption
    pub title: String,
    /// X axis description
    pub x_desc: String,
    /// Y axis description
    pub y_desc: String,
    /// Lines, in legend order
    pub series: Vec<Series>,
    /// Image size in pixels
    pub size: (u32, u32),
}

/// Validation loss against one hyperparameter, one line per value of another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensitivityChart {
    /// File name without extension
    pub file_stem: &'static str,
    /// Caption
    pub title: &'static str,
    /// X axis description
    pub x_desc: &'static str,
    /// Field on the x axis
    pub x: HyperparameterField,
    /// Field that splits the lines
    pub split_by: HyperparameterField,
}

/// The three sensitivity charts written by `plot`
pub const SENSITIVITY_CHARTS: [SensitivityChart; 3] = [
    SensitivityChart {
        file_stem: "val_loss_vs_embd",
        title: "Validation Loss vs Embedding Size",
        x_desc: "Embedding Size (n_embd)",
        x: HyperparameterField::NEmbd,
        split_by: HyperparameterField::NHead,
    },
    SensitivityChart {
        file_stem: "val_loss_vs_dropout",
        title: "Validation Loss vs Dropout",
        x_desc: "Dropout",
        x: HyperparameterField::Dropout,
        split_by: HyperparameterField::NEmbd,
    },
    SensitivityChart {
        file_stem: "val_loss_vs_batch",
        title: "Validation Loss vs Batch Size",
        x_desc: "Batch Size",
        x: HyperparameterField::BatchSize,
        split_by: HyperparameterField::NEmbd,
    },
];

impl SensitivityChart {
    /// Build the chart from every row with a validation loss.
    ///
    /// Lines are ordered by the numeric split value, points by x.
    #[must_use]
    pub fn build(&self, rows: &[SummaryRow]) -> LineChart {
        let mut lines: Vec<(f64, Series)> = Vec::new();
        for row in rows {
            let Some(loss) = row.final_val_loss() else {
                continue;
            };
            let h = row.hyperparams();
            let split = self.split_by.value(h);
            let point = (self.x.value(h), loss);
            match lines.iter_mut().find(|(v, _)| *v == split) {
                Some((_, series)) => series.points.push(point),
                None => lines.push((
                    split,
                    Series {
                        label: format!("{}={}", self.split_by.name(), self.split_by.label(h)),
                        points: vec![point],
                        markers: true,
                    },
                )),
            }
        }

        lines.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        let series = lines
            .into_iter()
            .map(|(_, mut series)| {
                series.points.sort_by(|a, b| a.0.total_cmp(&b.0));
                series
            })
            .collect();

        LineChart {
            title: self.title.to_string(),
            x_desc: self.x_desc.to_string(),
            y_desc: "Validation Loss".to_string(),
            series,
            size: (600, 400),
        }
    }
}

/// Train and validation curves of one experiment.
#[must_use]
pub fn loss_curve_chart(log: &RawTrainingLog) -> LineChart {
    LineChart {
        title: format!("Loss Curve: {}", log.experiment()),
        x_desc: "Iterations".to_string(),
        y_desc: "Loss".to_string(),
        series: vec![
            Series {
                label: "Train Loss".to_string(),
                points: log.train_curve(),
                markers: false,
            },
            Series {
                label: "Validation Loss".to_string(),
                points: log.val_curve(),
                markers: false,
            },
        ],
        size: (800, 400),
    }
}

/// Validation curves of several experiments on one chart.
#[must_use]
pub fn validation_overlay_chart(logs: &[RawTrainingLog]) -> LineChart {
    LineChart {
        title: format!("Top {} Experiments: Validation Loss Comparison", logs.len()),
        x_desc: "Iterations".to_string(),
        y_desc: "Validation Loss".to_string(),
        series: logs
            .iter()
            .map(|log| Series {
                label: format!("{} (val)", log.experiment()),
                points: log.val_curve(),
                markers: false,
            })
            .collect(),
        size: (1000, 600),
    }
}

/// Charts written and problems met by one plotting pass
#[derive(Debug, Default)]
pub struct PlotReport {
    /// Files written
    pub written: Vec<PathBuf>,
    /// Charts skipped, with the reason
    pub warnings: Vec<String>,
}

impl PlotReport {
    fn write(&mut self, chart: &LineChart, path: PathBuf, format: ChartFormat) {
        match render(chart, &path, format) {
            Ok(()) => {
                info!(path = %path.display(), "saved chart");
                self.written.push(path);
            }
            Err(e) => self.warn(format!("{}: {e}", path.display())),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

fn chart_path(dir: &Path, stem: &str, format: ChartFormat) -> PathBuf {
    dir.join(format!("{stem}.{}", format.extension()))
}

/// Load the log of `experiment`, or record why it cannot be plotted.
fn load_log(config: &PipelineConfig, experiment: &str, report: &mut PlotReport) -> Option<RawTrainingLog> {
    match RawTrainingLog::load(experiment, &config.training_log_path(experiment)) {
        Ok(log) => Some(log),
        Err(e) => {
            report.warn(e.to_string());
            None
        }
    }
}

/// Loss curve of every experiment plus the sensitivity charts.
///
/// # Errors
///
/// Returns error if the root cannot be listed, the plots directory cannot
/// be created, or the chart format is unsupported.
pub fn plot_all(config: &PipelineConfig, table: &SummaryTable) -> Result<PlotReport> {
    let format = config.chart_format();
    format.ensure_supported()?;
    let dir = config.plots_dir();
    fs::create_dir_all(&dir)?;

    let mut report = PlotReport::default();
    for experiment in list_runs(config.root(), config.prefix())? {
        if let Some(log) = load_log(config, &experiment, &mut report) {
            let path = chart_path(&dir, &format!("{experiment}_loss_curve"), format);
            report.write(&loss_curve_chart(&log), path, format);
        }
    }

    if table.has_val_loss() {
        for spec in &SENSITIVITY_CHARTS {
            let path = chart_path(&dir, spec.file_stem, format);
            report.write(&spec.build(table.rows()), path, format);
        }
    } else {
        report.warn("no experiment has a validation loss; sensitivity charts skipped".to_string());
    }
    Ok(report)
}

/// Individual curves and the validation overlay for the best experiments.
///
/// Only rows with a validation loss are ranked.
///
/// # Errors
///
/// Returns error if the output directory cannot be created or the chart
/// format is unsupported.
pub fn plot_top(config: &PipelineConfig, table: &SummaryTable) -> Result<PlotReport> {
    let format = config.chart_format();
    format.ensure_supported()?;
    let dir = config.top_plots_dir();
    fs::create_dir_all(&dir)?;

    let mut report = PlotReport::default();
    let ranked: Vec<&SummaryRow> = table
        .rows()
        .iter()
        .filter(|r| r.final_val_loss().is_some())
        .take(config.top_n())
        .collect();

    let mut logs = Vec::with_capacity(ranked.len());
    for row in ranked {
        if let Some(log) = load_log(config, row.experiment(), &mut report) {
            let path = chart_path(&dir, &format!("{}_loss_curve", row.experiment()), format);
            report.write(&loss_curve_chart(&log), path, format);
            logs.push(log);
        }
    }

    if logs.is_empty() {
        report.warn("no training logs for the top experiments; comparison chart skipped".to_string());
    } else {
        let stem = format!("top{}_validation_comparison", config.top_n());
        report.write(&validation_overlay_chart(&logs), chart_path(&dir, &stem, format), format);
    }
    Ok(report)
}
