//! Text and JSON reporters
//!
//! Each renderer is a borrowed view with a `Display` impl, so the CLI can
//! `print!` it and tests can `to_string()` it. Nothing here touches the
//! filesystem.

use std::fmt;

use crate::experiment::{HyperparameterField, RunRecord, RunStatus};
use crate::extract::EvaluationReport;
use crate::summary::{AggregationReport, HyperparameterBreakdown, SummaryRow, ValLossStats};

const RULE_WIDTH: usize = 80;

/// How many missing experiments are listed before eliding.
pub const MISSING_LIST_LIMIT: usize = 5;

/// Columns of the `compare` table
pub const COMPARE_COLUMNS: &[&str] = &[
    "experiment",
    "final_val_loss",
    "final_train_loss",
    "max_iters",
    "n_layer",
    "n_head",
    "n_embd",
    "batch_size",
    "dropout",
];

/// Columns of the `top` table
pub const TOP_COLUMNS: &[&str] = &[
    "experiment",
    "final_val_loss",
    "final_train_loss",
    "n_head",
    "n_embd",
    "batch_size",
    "dropout",
];

fn loss(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

/// A titled section separator
pub struct Banner<'a>(pub &'a str);

impl fmt::Display for Banner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{rule}")?;
        writeln!(f, "{}", self.0)?;
        writeln!(f, "{rule}")
    }
}

/// Ranked, multi-line description of the best experiments
pub struct Leaderboard<'a>(pub &'a [SummaryRow]);

impl fmt::Display for Leaderboard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, row) in self.0.iter().enumerate() {
            let h = row.hyperparams();
            writeln!(f, "Rank {}: {}", rank + 1, row.experiment())?;
            writeln!(f, "  Val Loss:     {}", loss(row.final_val_loss()))?;
            writeln!(f, "  Train Loss:   {}", loss(row.final_train_loss()))?;
            writeln!(
                f,
                "  Architecture: n_layer={}, n_head={}, n_embd={}",
                h.n_layer, h.n_head, h.n_embd
            )?;
            writeln!(
                f,
                "  Training:     batch={}, iters={}, dropout={}",
                h.batch_size,
                h.max_iters,
                HyperparameterField::Dropout.label(h)
            )?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Aligned table of selected columns
pub struct ComparisonTable<'a> {
    rows: &'a [SummaryRow],
    columns: &'a [&'a str],
}

impl<'a> ComparisonTable<'a> {
    /// Table with the given columns (canonical names or passthrough extras).
    #[must_use]
    pub const fn new(rows: &'a [SummaryRow], columns: &'a [&'a str]) -> Self {
        Self { rows, columns }
    }

    fn cell(row: &SummaryRow, column: &str) -> String {
        match column {
            "experiment" => row.experiment().to_string(),
            "final_train_loss" => loss(row.final_train_loss()),
            "final_val_loss" => loss(row.final_val_loss()),
            other => HyperparameterField::from_name(other).map_or_else(
                || row.extra(other).unwrap_or_default().to_string(),
                |field| field.label(row.hyperparams()),
            ),
        }
    }
}

impl fmt::Display for ComparisonTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| self.columns.iter().map(|c| Self::cell(row, c)).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|r| r[i].len())
                    .chain(std::iter::once(c.len()))
                    .max()
                    .unwrap_or_default()
            })
            .collect();

        write_aligned(f, &widths, self.columns.iter().copied())?;
        for row in &cells {
            write_aligned(f, &widths, row.iter().map(String::as_str))?;
        }
        Ok(())
    }
}

fn write_aligned<'v>(
    f: &mut fmt::Formatter<'_>,
    widths: &[usize],
    values: impl Iterator<Item = &'v str>,
) -> fmt::Result {
    for (i, (value, &width)) in values.zip(widths).enumerate() {
        if i == 0 {
            write!(f, "{value:<width$}")?;
        } else {
            write!(f, "  {value:>width$}")?;
        }
    }
    writeln!(f)
}

/// Validation-loss statistics
pub struct StatsBlock<'a>(pub &'a ValLossStats);

impl fmt::Display for StatsBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        writeln!(f, "Experiments:      {}", s.count)?;
        writeln!(f, "Best Val Loss:    {:.4}", s.min)?;
        writeln!(f, "Worst Val Loss:   {:.4}", s.max)?;
        writeln!(f, "Mean Val Loss:    {:.4}", s.mean)?;
        writeln!(f, "Median Val Loss:  {:.4}", s.median)?;
        match s.std_dev {
            Some(std) => writeln!(f, "Std Dev Val Loss: {std:.4}"),
            None => writeln!(f, "Std Dev Val Loss: n/a"),
        }
    }
}

/// Mean validation loss per hyperparameter value
pub struct BreakdownBlock<'a>(pub &'a [HyperparameterBreakdown]);

impl fmt::Display for BreakdownBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for breakdown in self.0.iter().filter(|b| !b.groups.is_empty()) {
            let name = breakdown.field.name();
            writeln!(f, "\n{name}:")?;
            for group in &breakdown.groups {
                writeln!(
                    f,
                    "  {name}={}: {:.4} ({} runs)",
                    group.value, group.mean_val_loss, group.count
                )?;
            }
        }
        Ok(())
    }
}

/// Experiments without a metrics artifact, elided after a few entries
pub struct MissingMetrics<'a>(pub &'a [String]);

impl fmt::Display for MissingMetrics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        writeln!(f, "{} experiments missing final_metrics.csv", self.0.len())?;
        writeln!(f, "Run `nanosweep evaluate` first to extract metrics from training logs")?;
        for experiment in self.0.iter().take(MISSING_LIST_LIMIT) {
            writeln!(f, "  - {experiment}")?;
        }
        if self.0.len() > MISSING_LIST_LIMIT {
            writeln!(f, "  ... and {} more", self.0.len() - MISSING_LIST_LIMIT)?;
        }
        Ok(())
    }
}

/// Closing tally of an `evaluate` pass
pub struct EvaluationSummary<'a>(pub &'a EvaluationReport);

impl fmt::Display for EvaluationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(f, "Processed: {} experiments", r.created.len())?;
        writeln!(f, "Skipped (already exist): {} experiments", r.already_present.len())?;
        writeln!(f, "Failed: {} experiments", r.failures.len())?;
        writeln!(f, "Total: {} experiments with metrics", r.with_metrics())?;
        for (experiment, error) in &r.failures {
            writeln!(f, "  - {experiment}: {error}")?;
        }
        Ok(())
    }
}

/// Closing tally of a `summary` pass
pub struct AggregationSummary<'a>(pub &'a AggregationReport);

impl fmt::Display for AggregationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(f, "Total experiments: {}", r.table.len())?;
        for warning in &r.warnings {
            writeln!(f, "WARNING: {warning}")?;
        }
        for (experiment, error) in &r.failures {
            writeln!(f, "  - {experiment}: {error}")?;
        }
        Ok(())
    }
}

/// Status tally of driver invocations
pub struct RunSummary<'a>(pub &'a [RunRecord]);

impl fmt::Display for RunSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |status: RunStatus| self.0.iter().filter(|r| r.status() == status).count();
        writeln!(f, "Runs: {}", self.0.len())?;
        writeln!(f, "  succeeded: {}", count(RunStatus::Success))?;
        writeln!(f, "  failed:    {}", count(RunStatus::Failed))?;
        writeln!(f, "  cancelled: {}", count(RunStatus::Cancelled))?;
        for record in self.0.iter().filter(|r| r.status() != RunStatus::Success) {
            match record.exit_code() {
                Some(code) => writeln!(f, "  - {} ({:?}, exit code {code})", record.run_id(), record.status())?,
                None => writeln!(f, "  - {} ({:?})", record.run_id(), record.status())?,
            }
        }
        Ok(())
    }
}

/// Rows as a JSON array of objects.
#[must_use]
pub fn rows_to_json(rows: &[SummaryRow]) -> serde_json::Value {
    serde_json::Value::Array(rows.iter().map(SummaryRow::to_json).collect())
}
