//! Raw training log written by the external trainer
//!
//! `training_log.csv` has one row per evaluation step with at least the
//! columns `iter`, `train_loss` and `val_loss`. Depending on the trainer
//! version, loss cells hold either a plain decimal or the repr of a scalar
//! tensor (`tensor(1.2345)`).

use std::path::Path;

use crate::{Error, Result};

/// Iteration column
pub const ITER_COLUMN: &str = "iter";
/// Training loss column
pub const TRAIN_LOSS_COLUMN: &str = "train_loss";
/// Validation loss column
pub const VAL_LOSS_COLUMN: &str = "val_loss";

/// Parse a loss cell: a decimal, optionally wrapped as `tensor(<decimal>)`.
///
/// Returns `None` for anything else, including empty cells.
///
/// ```rust
/// use nanosweep::experiment::parse_loss;
///
/// assert_eq!(parse_loss("tensor(1.2345)"), Some(1.2345));
/// assert_eq!(parse_loss(" 0.9876 "), Some(0.9876));
/// assert_eq!(parse_loss("loss=0.9"), None);
/// ```
#[must_use]
pub fn parse_loss(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed
        .strip_prefix("tensor(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(trimmed);
    number.trim().parse().ok()
}

/// Parse an `iter` cell. Accepts integers and integral floats (`500.0`).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_iter(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(iter) = trimmed.parse::<u64>() {
        return Some(iter);
    }
    let float: f64 = trimmed.parse().ok()?;
    (float.is_finite() && float >= 0.0 && float.fract() == 0.0).then_some(float as u64)
}

/// One logged evaluation step, cells kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Raw `iter` cell
    pub iter: String,
    /// Raw `train_loss` cell
    pub train_loss: String,
    /// Raw `val_loss` cell
    pub val_loss: String,
}

/// Losses of the final logged step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalLosses {
    /// Training loss at the last row
    pub train_loss: f64,
    /// Validation loss at the last row
    pub val_loss: f64,
    /// `iter` of the last row
    pub iters: u64,
}

/// A parsed `training_log.csv`.
#[derive(Debug, Clone)]
pub struct RawTrainingLog {
    experiment: String,
    entries: Vec<LogEntry>,
}

impl RawTrainingLog {
    /// Build a log from entries already in memory.
    #[must_use]
    pub fn new(experiment: impl Into<String>, entries: Vec<LogEntry>) -> Self {
        Self {
            experiment: experiment.into(),
            entries,
        }
    }

    /// Read the log of `experiment` from `path`.
    ///
    /// # Errors
    ///
    /// - `MissingLog` if the file does not exist
    /// - `EmptyLog` if it has no data rows (zero-byte files included)
    /// - `MissingColumn` if one of `iter`/`train_loss`/`val_loss` is absent
    pub fn load(experiment: &str, path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MissingLog {
                experiment: experiment.to_string(),
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        if records.is_empty() {
            return Err(Error::EmptyLog {
                experiment: experiment.to_string(),
            });
        }

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| Error::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };
        let iter_idx = column(ITER_COLUMN)?;
        let train_idx = column(TRAIN_LOSS_COLUMN)?;
        let val_idx = column(VAL_LOSS_COLUMN)?;

        let entries = records
            .iter()
            .map(|record| LogEntry {
                iter: record.get(iter_idx).unwrap_or_default().to_string(),
                train_loss: record.get(train_idx).unwrap_or_default().to_string(),
                val_loss: record.get(val_idx).unwrap_or_default().to_string(),
            })
            .collect();

        Ok(Self::new(experiment, entries))
    }

    /// Experiment this log belongs to.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// All rows in logged order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of logged rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no row was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the last row into final losses.
    ///
    /// # Errors
    ///
    /// `EmptyLog` for an empty log, `UnparsableLoss` when a loss or the
    /// iteration cell cannot be parsed.
    pub fn final_losses(&self) -> Result<FinalLosses> {
        let last = self.entries.last().ok_or_else(|| Error::EmptyLog {
            experiment: self.experiment.clone(),
        })?;
        let unparsable = |column: &str, value: &str| Error::UnparsableLoss {
            experiment: self.experiment.clone(),
            column: column.to_string(),
            value: value.to_string(),
        };

        let train_loss =
            parse_loss(&last.train_loss).ok_or_else(|| unparsable(TRAIN_LOSS_COLUMN, &last.train_loss))?;
        let val_loss =
            parse_loss(&last.val_loss).ok_or_else(|| unparsable(VAL_LOSS_COLUMN, &last.val_loss))?;
        let iters = parse_iter(&last.iter).ok_or_else(|| unparsable(ITER_COLUMN, &last.iter))?;

        Ok(FinalLosses {
            train_loss,
            val_loss,
            iters,
        })
    }

    /// `(iter, train_loss)` points; rows that do not parse are dropped.
    #[must_use]
    pub fn train_curve(&self) -> Vec<(f64, f64)> {
        self.curve(|e| &e.train_loss)
    }

    /// `(iter, val_loss)` points; rows that do not parse are dropped.
    #[must_use]
    pub fn val_curve(&self) -> Vec<(f64, f64)> {
        self.curve(|e| &e.val_loss)
    }

    #[allow(clippy::cast_precision_loss)]
    fn curve(&self, cell: impl Fn(&LogEntry) -> &String) -> Vec<(f64, f64)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let point = parse_iter(&entry.iter)
                    .zip(parse_loss(cell(entry)))
                    .map(|(iter, loss)| (iter as f64, loss));
                if point.is_none() {
                    tracing::debug!(experiment = %self.experiment, iter = %entry.iter, "dropping unparsable log row");
                }
                point
            })
            .collect()
    }
}
