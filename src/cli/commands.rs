//! CLI command implementations
//!
//! Reports go to stdout; progress and per-experiment problems go through
//! `tracing` to stderr.

use std::time::Duration;

use tracing::info;

use super::{Cli, Command, PlotArgs, ProcessArgs, SampleArgs, SummaryArgs, SweepArgs, TopArgs};
use crate::config::PipelineConfig;
use crate::driver::{self, DriverOptions, DriverReport, SamplerCommand, SweepGrid, TrainerCommand};
use crate::report::{
    rows_to_json, AggregationSummary, Banner, BreakdownBlock, ComparisonTable, EvaluationSummary,
    Leaderboard, MissingMetrics, RunSummary, StatsBlock, COMPARE_COLUMNS, TOP_COLUMNS,
};
use crate::summary::{self, AggregationReport, SummaryTable};
use crate::{extract, plot, storage, Error, Result};

/// Execute a CLI command based on the parsed arguments
///
/// # Errors
///
/// Only top-level failures: unreadable root, bad arguments, unwritable
/// outputs. Per-experiment problems are reported, not returned.
pub fn run_command(cli: &Cli) -> Result<()> {
    let base = PipelineConfig::builder()
        .root(cli.root.clone())
        .prefix(cli.prefix.clone());

    match &cli.command {
        Command::Sweep(args) => run_sweep(&base.build(), args),
        Command::Sample(args) => run_sample(&base.build(), args),
        Command::Evaluate => run_evaluate(&base.build()),
        Command::Summary(args) => run_summary(&base.top_n(args.top).build(), args),
        Command::Top(args) => run_top(&base.top_n(args.n).chart_format(args.format).build(), args),
        Command::Compare => run_compare(&base.build()),
        Command::Plot(args) => run_plot(&base.chart_format(args.format).build(), args),
    }
}

fn driver_options(args: &ProcessArgs) -> DriverOptions {
    DriverOptions {
        timeout: args.timeout_secs.map(Duration::from_secs),
        dry_run: args.dry_run,
    }
}

fn print_driver_report(report: &DriverReport, dry_run: bool) {
    if dry_run {
        for (i, invocation) in report.planned.iter().enumerate() {
            println!("[{}/{}] {invocation}", i + 1, report.planned.len());
        }
    } else {
        print!("{}", RunSummary(&report.records));
    }
}

fn run_sweep(config: &PipelineConfig, args: &SweepArgs) -> Result<()> {
    let grid = match &args.grid {
        Some(path) => SweepGrid::from_yaml_file(path)?,
        None => SweepGrid::member(args.member)?,
    };
    let mut trainer = match &args.trainer {
        Some(program) => TrainerCommand::new(program.clone(), args.trainer_args.clone()),
        None => TrainerCommand::default(),
    };
    if let Some(dir) = &args.process.working_dir {
        trainer = trainer.working_dir(dir.clone());
    }

    let report = driver::run_sweep(config, &grid, &trainer, driver_options(&args.process))?;
    print_driver_report(&report, args.process.dry_run);
    Ok(())
}

fn run_sample(config: &PipelineConfig, args: &SampleArgs) -> Result<()> {
    if !(args.temperature > 0.0) {
        return Err(Error::InvalidInput(format!(
            "temperature must be positive, got {}",
            args.temperature
        )));
    }
    let mut sampler = match &args.sampler {
        Some(program) => SamplerCommand::new(program.clone(), args.sampler_args.clone()),
        None => SamplerCommand::default(),
    }
    .start(args.start.clone())
    .temperature(args.temperature)
    .top_k(args.top_k);
    if let Some(dir) = &args.process.working_dir {
        sampler = sampler.working_dir(dir.clone());
    }

    let report = driver::run_sampling(config, &sampler, driver_options(&args.process))?;
    print_driver_report(&report, args.process.dry_run);
    Ok(())
}

fn run_evaluate(config: &PipelineConfig) -> Result<()> {
    let report = extract::evaluate_all(config)?;
    print!("{}", Banner("EVALUATION COMPLETE"));
    print!("{}", EvaluationSummary(&report));
    Ok(())
}

/// Aggregate and persist the summary CSV (skipped when no row was built).
fn aggregate_and_save(config: &PipelineConfig) -> Result<AggregationReport> {
    let report = summary::aggregate(config)?;
    if !report.table.is_empty() {
        let path = config.summary_path();
        report.table.write_csv(&path)?;
        info!(path = %path.display(), rows = report.table.len(), "summary saved");
    }
    Ok(report)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_summary(config: &PipelineConfig, args: &SummaryArgs) -> Result<()> {
    let report = aggregate_and_save(config)?;
    if args.parquet && !report.table.is_empty() {
        storage::write_parquet(&report.table, &config.summary_parquet_path())?;
    }

    if args.json {
        return print_json(&rows_to_json(report.table.rows()));
    }

    let table = &report.table;
    if table.is_empty() {
        println!("No experiment data found");
    } else {
        print!("{}", Banner("SUMMARY CREATED"));
        print!("{}", AggregationSummary(&report));
        println!("Saved to: {}", config.summary_path().display());

        if table.has_val_loss() {
            print!("{}", Banner(&format!("TOP {} MODELS BY VALIDATION LOSS", config.top_n())));
            print!("{}", Leaderboard(table.top_n(config.top_n())));
            if let Some(stats) = table.val_loss_stats() {
                print!("{}", Banner("SUMMARY STATISTICS"));
                print!("{}", StatsBlock(&stats));
            }
            print!("{}", Banner("MEAN VALIDATION LOSS BY HYPERPARAMETER"));
            print!("{}", BreakdownBlock(&table.breakdown()));
        }
    }
    print!("{}", MissingMetrics(&report.missing_metrics));
    Ok(())
}

/// Load the persisted summary, preferring the CSV over the Parquet copy.
fn load_summary(config: &PipelineConfig) -> Result<SummaryTable> {
    let csv_path = config.summary_path();
    if csv_path.is_file() {
        return SummaryTable::read_csv(&csv_path);
    }
    let parquet_path = config.summary_parquet_path();
    if parquet_path.is_file() {
        info!(path = %parquet_path.display(), "summary CSV missing; reading Parquet copy");
        return storage::SummaryStore::load_parquet(&parquet_path)?.to_summary_table();
    }
    Err(Error::InvalidInput(format!(
        "{} not found; run `nanosweep summary` first",
        csv_path.display()
    )))
}

fn run_top(config: &PipelineConfig, args: &TopArgs) -> Result<()> {
    let table = load_summary(config)?;
    let ranked: Vec<_> = table
        .rows()
        .iter()
        .filter(|r| r.final_val_loss().is_some())
        .take(config.top_n())
        .cloned()
        .collect();

    if args.json {
        print_json(&rows_to_json(&ranked))?;
    } else {
        print!("{}", Banner(&format!("TOP {} EXPERIMENTS BY VALIDATION LOSS", config.top_n())));
        print!("{}", ComparisonTable::new(&ranked, TOP_COLUMNS));
    }

    if !args.no_plots {
        let plots = plot::plot_top(config, &table)?;
        info!(written = plots.written.len(), skipped = plots.warnings.len(), "top-N charts done");
    }
    Ok(())
}

fn run_compare(config: &PipelineConfig) -> Result<()> {
    let report = aggregate_and_save(config)?;
    if report.table.is_empty() {
        println!("No final_metrics.csv files found");
        return Ok(());
    }
    print!("{}", Banner("FINAL EXPERIMENT COMPARISON"));
    print!("{}", ComparisonTable::new(report.table.rows(), COMPARE_COLUMNS));
    println!("Saved all results to: {}", config.summary_path().display());
    Ok(())
}

fn run_plot(config: &PipelineConfig, _args: &PlotArgs) -> Result<()> {
    let report = summary::aggregate(config)?;
    let plots = plot::plot_all(config, &report.table)?;
    println!(
        "Saved {} charts to {} ({} skipped)",
        plots.written.len(),
        config.plots_dir().display(),
        plots.warnings.len()
    );
    Ok(())
}
