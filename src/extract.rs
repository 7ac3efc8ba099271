//! Metrics extraction: training log -> `final_metrics.csv`
//!
//! Extraction is a write-once cache keyed by experiment directory:
//!
//! 1. artifact present -> report it and stop (the raw log is not read)
//! 2. read the log, parse the last row
//! 3. decode hyperparameters from the directory name
//! 4. store the artifact (never replacing an existing file)
//!
//! An existing artifact is never revalidated against a newer log.

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::experiment::{list_runs, ExperimentMetrics, HyperparameterSet, RawTrainingLog};
use crate::{Error, Result};

/// Result of extracting one experiment.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    /// `final_metrics.csv` already existed; nothing was read or written.
    AlreadyPresent,
    /// A new artifact was written with these metrics.
    Created(ExperimentMetrics),
}

/// Extract and cache the metrics of one experiment.
///
/// # Errors
///
/// Per-experiment errors (`MissingLog`, `EmptyLog`, `MissingColumn`,
/// `UnparsableLoss`, `UnparsableName`) plus I/O and CSV failures. No artifact
/// is written on error.
pub fn extract_metrics(config: &PipelineConfig, experiment: &str) -> Result<ExtractOutcome> {
    let metrics_path = config.metrics_path(experiment);
    if metrics_path.exists() {
        return Ok(ExtractOutcome::AlreadyPresent);
    }

    let log = RawTrainingLog::load(experiment, &config.training_log_path(experiment))?;
    let last = log.final_losses()?;
    let hyperparams = HyperparameterSet::decode(experiment)
        .ok_or_else(|| Error::UnparsableName(experiment.to_string()))?;

    let metrics = ExperimentMetrics::new(last.train_loss, last.val_loss, last.iters, hyperparams);
    if metrics.write_new(&metrics_path)? {
        Ok(ExtractOutcome::Created(metrics))
    } else {
        Ok(ExtractOutcome::AlreadyPresent)
    }
}

/// Tally of one `evaluate` pass.
#[derive(Debug, Default)]
pub struct EvaluationReport {
    /// Experiments whose artifact was written in this pass
    pub created: Vec<(String, ExperimentMetrics)>,
    /// Experiments that already had an artifact
    pub already_present: Vec<String>,
    /// Experiments skipped, with the reason
    pub failures: Vec<(String, Error)>,
}

impl EvaluationReport {
    /// Experiments that now have an artifact.
    #[must_use]
    pub fn with_metrics(&self) -> usize {
        self.created.len() + self.already_present.len()
    }

    /// Experiments looked at.
    #[must_use]
    pub fn total(&self) -> usize {
        self.with_metrics() + self.failures.len()
    }

    fn record(&mut self, experiment: String, outcome: Result<ExtractOutcome>) {
        match outcome {
            Ok(ExtractOutcome::Created(metrics)) => {
                info!(
                    experiment = %experiment,
                    val_loss = metrics.final_val_loss(),
                    "created metrics artifact"
                );
                self.created.push((experiment, metrics));
            }
            Ok(ExtractOutcome::AlreadyPresent) => {
                info!(experiment = %experiment, "metrics artifact already present");
                self.already_present.push(experiment);
            }
            Err(e @ Error::UnparsableName(_)) => {
                warn!(experiment = %experiment, "losses readable but directory name is not; no artifact written");
                self.failures.push((experiment, e));
            }
            Err(e) => {
                warn!(experiment = %experiment, error = %e, "skipping experiment");
                self.failures.push((experiment, e));
            }
        }
    }
}

/// Run [`extract_metrics`] over every experiment under the sweep root.
///
/// Per-experiment failures are collected in the report; they never abort
/// the pass.
///
/// # Errors
///
/// Returns error only if the sweep root cannot be listed.
pub fn evaluate_all(config: &PipelineConfig) -> Result<EvaluationReport> {
    let runs = list_runs(config.root(), config.prefix())?;
    info!(count = runs.len(), root = %config.root().display(), "evaluating experiments");

    let mut report = EvaluationReport::default();
    for (experiment, outcome) in extract_each(config, runs) {
        report.record(experiment, outcome);
    }
    Ok(report)
}

#[cfg(not(feature = "parallel"))]
fn extract_each(
    config: &PipelineConfig,
    runs: Vec<String>,
) -> Vec<(String, Result<ExtractOutcome>)> {
    runs.into_iter()
        .map(|run| {
            let outcome = extract_metrics(config, &run);
            (run, outcome)
        })
        .collect()
}

// Experiments share no state, so extraction can fan out; order is restored
// because `list_runs` is sorted and rayon's collect preserves it.
#[cfg(feature = "parallel")]
fn extract_each(
    config: &PipelineConfig,
    runs: Vec<String>,
) -> Vec<(String, Result<ExtractOutcome>)> {
    use rayon::prelude::*;

    runs.into_par_iter()
        .map(|run| {
            let outcome = extract_metrics(config, &run);
            (run, outcome)
        })
        .collect()
}
