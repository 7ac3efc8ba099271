//! Command-line interface
//!
//! One subcommand per pipeline stage:
//!
//! ```bash
//! nanosweep sweep --member 1            # train the 32-run slice of member 1
//! nanosweep evaluate                    # training_log.csv -> final_metrics.csv
//! nanosweep summary --parquet           # all_experiment_summary.csv (+ .parquet)
//! nanosweep top -n 5                    # leaderboard + plots_top5/
//! nanosweep compare                     # comparison table
//! nanosweep plot                        # plots/*.png (--format svg)
//! nanosweep sample --temperature 0.8    # samples/<run>.txt
//! ```

mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::experiment::RUN_PREFIX;
use crate::plot::ChartFormat;

pub use commands::run_command;

/// nanosweep: hyperparameter sweeps and metrics harvesting for char-level GPT runs
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "nanosweep")]
#[command(version)]
#[command(about = "Run hyperparameter sweeps and rank the resulting experiments")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Sweep root holding the experiment directories
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Name prefix of experiment directories
    #[arg(long, global = true, default_value = RUN_PREFIX)]
    pub prefix: String,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    /// Log filter implied by `-v`/`-q`
    #[must_use]
    pub const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train every combination of a sweep grid
    Sweep(SweepArgs),

    /// Generate a text sample from every experiment
    Sample(SampleArgs),

    /// Extract final metrics from every training log
    Evaluate,

    /// Aggregate metrics into the ranked summary table
    Summary(SummaryArgs),

    /// Show the best experiments and plot their curves
    Top(TopArgs),

    /// Print a comparison table of all experiments
    Compare,

    /// Plot every loss curve and the sensitivity charts
    Plot(PlotArgs),
}

/// Subprocess options shared by `sweep` and `sample`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProcessArgs {
    /// Working directory of the external program (default: --root)
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Kill a run that takes longer than this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the planned commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the sweep command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct SweepArgs {
    /// Group member preset (fixes block_size and n_layer)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub member: u8,

    /// YAML grid file (overrides --member)
    #[arg(short, long)]
    pub grid: Option<PathBuf>,

    /// Trainer program (default: python train.py config/train_shakespeare_char.py)
    #[arg(long)]
    pub trainer: Option<String>,

    /// Leading trainer argument, repeatable (used with --trainer)
    #[arg(long = "trainer-arg", action = ArgAction::Append, allow_hyphen_values = true)]
    pub trainer_args: Vec<String>,

    #[command(flatten)]
    pub process: ProcessArgs,
}

/// Arguments for the sample command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct SampleArgs {
    /// Prompt the sampler starts from
    #[arg(long, default_value = "To be or not to be")]
    pub start: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.8)]
    pub temperature: f64,

    /// Top-k cutoff
    #[arg(long, default_value_t = 50)]
    pub top_k: u32,

    /// Sampler program (default: python sample.py)
    #[arg(long)]
    pub sampler: Option<String>,

    /// Leading sampler argument, repeatable (used with --sampler)
    #[arg(long = "sampler-arg", action = ArgAction::Append, allow_hyphen_values = true)]
    pub sampler_args: Vec<String>,

    #[command(flatten)]
    pub process: ProcessArgs,
}

/// Arguments for the summary command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct SummaryArgs {
    /// Emit the table as JSON instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Also write all_experiment_summary.parquet
    #[arg(long)]
    pub parquet: bool,

    /// Leaderboard size
    #[arg(short = 'n', long, default_value_t = 5)]
    pub top: usize,
}

/// Arguments for the top command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct TopArgs {
    /// How many experiments to show
    #[arg(short = 'n', long, default_value_t = 5)]
    pub n: usize,

    /// Emit rows as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip writing the plots_top<N> charts
    #[arg(long)]
    pub no_plots: bool,

    /// Chart image format
    #[arg(long, value_enum, default_value_t = ChartFormat::Png)]
    pub format: ChartFormat,
}

/// Arguments for the plot command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct PlotArgs {
    /// Chart image format
    #[arg(long, value_enum, default_value_t = ChartFormat::Png)]
    pub format: ChartFormat,
}

/// Parse command-line arguments
///
/// # Errors
///
/// Returns the clap error for unknown commands or invalid values.
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_globals() {
        let cli = parse_args(["nanosweep", "--root", "/sweeps", "-vv", "evaluate"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/sweeps"));
        assert_eq!(cli.prefix, "out_bs");
        assert_eq!(cli.command, Command::Evaluate);
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn test_global_after_subcommand() {
        let cli = parse_args(["nanosweep", "compare", "--prefix", "out_", "-q"]).unwrap();
        assert_eq!(cli.prefix, "out_");
        assert_eq!(cli.log_filter(), "error");
    }

    #[test]
    fn test_parse_sweep() {
        let cli = parse_args([
            "nanosweep",
            "sweep",
            "--member",
            "3",
            "--timeout-secs",
            "600",
            "--dry-run",
            "--trainer",
            "python3",
            "--trainer-arg",
            "train.py",
        ])
        .unwrap();
        match cli.command {
            Command::Sweep(args) => {
                assert_eq!(args.member, 3);
                assert_eq!(args.process.timeout_secs, Some(600));
                assert!(args.process.dry_run);
                assert_eq!(args.trainer.as_deref(), Some("python3"));
                assert_eq!(args.trainer_args, vec!["train.py"]);
            }
            other => panic!("Expected Sweep command, got {other:?}"),
        }
    }

    #[test]
    fn test_member_out_of_range() {
        assert!(parse_args(["nanosweep", "sweep", "--member", "5"]).is_err());
    }

    #[test]
    fn test_parse_sample_defaults() {
        let cli = parse_args(["nanosweep", "sample"]).unwrap();
        match cli.command {
            Command::Sample(args) => {
                assert_eq!(args.start, "To be or not to be");
                assert!((args.temperature - 0.8).abs() < f64::EPSILON);
                assert_eq!(args.top_k, 50);
                assert!(args.sampler.is_none());
            }
            other => panic!("Expected Sample command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_top_and_summary() {
        let cli = parse_args(["nanosweep", "top", "-n", "3", "--json", "--format", "png"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Top(TopArgs {
                n: 3,
                json: true,
                no_plots: false,
                format: ChartFormat::Png,
            })
        );

        let cli = parse_args(["nanosweep", "summary", "--parquet"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Summary(SummaryArgs {
                json: false,
                parquet: true,
                top: 5,
            })
        );
    }

    #[test]
    fn test_chart_format_defaults_to_png() {
        let cli = parse_args(["nanosweep", "plot"]).unwrap();
        assert_eq!(cli.command, Command::Plot(PlotArgs { format: ChartFormat::Png }));

        let cli = parse_args(["nanosweep", "plot", "--format", "svg"]).unwrap();
        assert_eq!(cli.command, Command::Plot(PlotArgs { format: ChartFormat::Svg }));
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse_args(["nanosweep", "train"]).is_err());
    }
}
