//! # nanosweep: hyperparameter sweeps for character-level GPT training
//!
//! nanosweep drives an external trainer over a grid of hyperparameters and
//! turns the resulting experiment directories into ranked reports.
//!
//! ## Pipeline
//!
//! ```text
//! sweep ──> <root>/out_bs.._nl.._nh.._ne.._b.._mi.._do../training_log.csv
//!                │
//! evaluate ──────┴──> final_metrics.csv   (extract, cached per experiment)
//!                          │
//! summary ─────────────────┴──> all_experiment_summary.csv (+ .parquet)
//!                                    │
//! top / compare / plot ──────────────┴──> leaderboards, charts
//! ```
//!
//! Every stage is a function of the files under the sweep root; nothing is
//! held in memory between stages. Per-experiment problems (missing logs,
//! unparsable names, absent metrics) are collected into the stage's report
//! and never abort a batch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use nanosweep::config::PipelineConfig;
//! use nanosweep::{extract, summary};
//!
//! let config = PipelineConfig::builder().root("sweeps/member1").build();
//! extract::evaluate_all(&config)?;
//! let report = summary::aggregate(&config)?;
//! for row in report.table.top_n(5) {
//!     println!("{} {:?}", row.experiment(), row.final_val_loss());
//! }
//! # Ok::<(), nanosweep::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod experiment;
pub mod extract;
pub mod plot;
pub mod report;
pub mod storage;
pub mod summary;

pub use error::{Error, Result};
