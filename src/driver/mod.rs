//! Sweep and sampling drivers
//!
//! The drivers hand each run to an external program and record what
//! happened. They never inspect the run's output; a trainer that exits
//! non-zero simply leaves a log the extractor will report on later.
//!
//! ```text
//! SweepGrid --combinations--> TrainerCommand --execute--> RunRecord
//!                                                           |
//!                                                  sweep_manifest.json
//! list_runs --> SamplerCommand --execute--> samples/<run>.txt
//! ```

pub mod grid;
pub mod process;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::experiment::{list_runs, HyperparameterField, HyperparameterSet, RunRecord, RunStatus};
use crate::Result;

pub use grid::SweepGrid;
pub use process::{execute, Invocation, ProcessOutcome, POLL_INTERVAL};

/// External trainer: program, leading arguments, working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerCommand {
    program: String,
    leading_args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl Default for TrainerCommand {
    fn default() -> Self {
        Self::new(
            "python",
            vec!["train.py".into(), "config/train_shakespeare_char.py".into()],
        )
    }
}

impl TrainerCommand {
    /// Trainer run as `program leading_args... --<field>=<value>...`
    #[must_use]
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
            working_dir: None,
        }
    }

    /// Run the trainer in `dir` (default: the sweep root).
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Invocation training `h` into its encoded output directory.
    #[must_use]
    pub fn invocation(&self, h: &HyperparameterSet, default_dir: &Path) -> Invocation {
        let mut args = self.leading_args.clone();
        args.extend(
            HyperparameterField::ALL
                .iter()
                .map(|field| format!("--{}={}", field.name(), field.label(h))),
        );
        args.push(format!("--out_dir={}", h.encode()));
        Invocation::new(self.program.clone(), args)
            .in_dir(self.working_dir.as_deref().unwrap_or(default_dir))
    }
}

/// External sampler and its generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerCommand {
    program: String,
    leading_args: Vec<String>,
    working_dir: Option<PathBuf>,
    start: String,
    temperature: f64,
    top_k: u32,
}

impl Default for SamplerCommand {
    fn default() -> Self {
        Self {
            program: "python".into(),
            leading_args: vec!["sample.py".into()],
            working_dir: None,
            start: "To be or not to be".into(),
            temperature: 0.8,
            top_k: 50,
        }
    }
}

impl SamplerCommand {
    /// Sampler run as `program leading_args... --out_dir=<run> ...`
    #[must_use]
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
            ..Self::default()
        }
    }

    /// Run the sampler in `dir` (default: the sweep root).
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Prompt the sampler starts from
    #[must_use]
    pub fn start(mut self, prompt: impl Into<String>) -> Self {
        self.start = prompt.into();
        self
    }

    /// Sampling temperature
    #[must_use]
    pub const fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Top-k cutoff
    #[must_use]
    pub const fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    /// Invocation sampling from the checkpoint in `run`.
    #[must_use]
    pub fn invocation(&self, run: &str, default_dir: &Path) -> Invocation {
        let mut args = self.leading_args.clone();
        args.push(format!("--out_dir={run}"));
        args.push(format!("--start={}", self.start));
        args.push(format!("--temperature={}", self.temperature));
        args.push(format!("--top_k={}", self.top_k));
        Invocation::new(self.program.clone(), args)
            .in_dir(self.working_dir.as_deref().unwrap_or(default_dir))
    }
}

/// Knobs shared by both drivers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverOptions {
    /// Kill a child that runs longer than this
    pub timeout: Option<Duration>,
    /// Plan only; spawn nothing and write nothing
    pub dry_run: bool,
}

/// Planned commands and, unless dry-run, their outcomes
#[derive(Debug, Default)]
pub struct DriverReport {
    /// Commands in execution order
    pub planned: Vec<Invocation>,
    /// One record per planned command (all `Pending` on a dry run)
    pub records: Vec<RunRecord>,
}

impl DriverReport {
    /// Runs that did not end in `Success`.
    #[must_use]
    pub fn unsuccessful(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status() != RunStatus::Success)
            .count()
    }
}

#[allow(clippy::cast_precision_loss)]
fn run_one(
    invocation: &Invocation,
    record: &mut RunRecord,
    transcript: Option<&Path>,
    options: DriverOptions,
) {
    info!(run = record.run_id(), command = %invocation, "starting run");
    record.start();
    match execute(invocation, transcript, options.timeout) {
        Ok(outcome) => {
            record.complete(outcome.status, outcome.exit_code);
            let secs = record.elapsed().map(|d| d.num_milliseconds() as f64 / 1000.0);
            match outcome.status {
                RunStatus::Success => info!(run = record.run_id(), elapsed_secs = ?secs, "run finished"),
                status => warn!(run = record.run_id(), ?status, exit_code = ?outcome.exit_code, "run did not succeed"),
            }
        }
        Err(e) => {
            error!(run = record.run_id(), error = %e, "run could not be executed");
            record.complete(RunStatus::Failed, None);
        }
    }
}

/// Write the run records as a pretty JSON array.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn write_manifest(path: &Path, records: &[RunRecord]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// Read a manifest written by [`write_manifest`].
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn read_manifest(path: &Path) -> Result<Vec<RunRecord>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Train every valid combination of `grid`, one run at a time.
///
/// Run failures are recorded, never returned. The manifest is rewritten
/// after each run so an interrupted sweep still leaves a record.
///
/// # Errors
///
/// Returns error only if the manifest cannot be written.
pub fn run_sweep(
    config: &PipelineConfig,
    grid: &SweepGrid,
    trainer: &TrainerCommand,
    options: DriverOptions,
) -> Result<DriverReport> {
    let combinations = grid.combinations();
    info!(
        runs = combinations.len(),
        skipped = grid.len() - combinations.len(),
        dry_run = options.dry_run,
        "planning sweep"
    );

    let mut report = DriverReport::default();
    for h in &combinations {
        report.planned.push(trainer.invocation(h, config.root()));
        report.records.push(RunRecord::new(h.encode()));
    }
    if options.dry_run {
        return Ok(report);
    }

    let manifest = config.manifest_path();
    for i in 0..report.records.len() {
        run_one(&report.planned[i], &mut report.records[i], None, options);
        write_manifest(&manifest, &report.records)?;
    }
    if report.records.is_empty() {
        write_manifest(&manifest, &report.records)?;
    }
    Ok(report)
}

/// Sample from every discovered experiment into `<samples_dir>/<run>.txt`.
///
/// # Errors
///
/// Returns error if the root cannot be listed or the samples directory
/// cannot be created.
pub fn run_sampling(
    config: &PipelineConfig,
    sampler: &SamplerCommand,
    options: DriverOptions,
) -> Result<DriverReport> {
    let runs = list_runs(config.root(), config.prefix())?;
    info!(runs = runs.len(), dry_run = options.dry_run, "planning sampling");

    let mut report = DriverReport::default();
    for run in &runs {
        report.planned.push(sampler.invocation(run, config.root()));
        report.records.push(RunRecord::new(run.clone()));
    }
    if options.dry_run {
        return Ok(report);
    }

    let samples_dir = config.samples_dir();
    fs::create_dir_all(&samples_dir)?;
    for (invocation, record) in report.planned.iter().zip(report.records.iter_mut()) {
        let transcript = samples_dir.join(format!("{}.txt", record.run_id()));
        run_one(invocation, record, Some(&transcript), options);
        if record.status() == RunStatus::Success {
            info!(path = %transcript.display(), "sample saved");
        }
    }
    Ok(report)
}
