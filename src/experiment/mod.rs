//! Experiment schema: what one sweep directory contains
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1/   <- HyperparameterSet::encode()
//!     training_log.csv                         <- RawTrainingLog (external trainer)
//!     final_metrics.csv                        <- ExperimentMetrics (extractor cache)
//!   all_experiment_summary.csv                 <- SummaryTable
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use nanosweep::experiment::{HyperparameterSet, RunRecord, RunStatus};
//!
//! let name = "out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1";
//! let h = HyperparameterSet::decode(name).unwrap();
//! assert_eq!(h.encode(), name);
//!
//! let mut run = RunRecord::new(h.encode());
//! run.start();
//! run.complete(RunStatus::Success, Some(0));
//! ```

mod discovery;
mod hyperparams;
mod metrics_record;
mod run_record;
mod training_log;

pub use discovery::list_runs;
pub use hyperparams::{
    format_dropout, HyperparameterField, HyperparameterSet, DROPOUT_TOLERANCE, RUN_PREFIX,
};
pub use metrics_record::ExperimentMetrics;
pub use run_record::{RunRecord, RunStatus};
pub use training_log::{
    parse_iter, parse_loss, FinalLosses, LogEntry, RawTrainingLog, ITER_COLUMN,
    TRAIN_LOSS_COLUMN, VAL_LOSS_COLUMN,
};
