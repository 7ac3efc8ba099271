//! Summary aggregation: every `final_metrics.csv` -> one ranked table
//!
//! The [`SummaryTable`] is the single source of truth for the reporters and
//! the plot sink. It is rebuilt wholesale on every run:
//!
//! - experiments without an artifact are listed in `missing_metrics`
//! - loss columns are resolved through [`aliases`] so legacy artifact
//!   layouts still fold in
//! - if an artifact lacks a loss, both losses are recomputed from the raw
//!   training log; if that fails too the row is kept without losses
//! - rows are sorted by ascending `final_val_loss`, rows without it last
//!
//! ## Column order
//!
//! ```text
//! experiment, final_train_loss, final_val_loss,
//! block_size, n_layer, n_head, n_embd, batch_size, max_iters, dropout,
//! <passthrough columns in first-seen order>
//! ```

pub mod aliases;
pub mod stats;

use std::cmp::Ordering;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::experiment::{
    list_runs, parse_loss, HyperparameterField, HyperparameterSet, RawTrainingLog,
    DROPOUT_TOLERANCE,
};
use crate::{Error, Result};

pub use aliases::{ColumnAliases, TRAIN_LOSS, VAL_LOSS};
pub use stats::{breakdown, GroupMean, HyperparameterBreakdown, ValLossStats};

/// Experiment identifier column
pub const EXPERIMENT_COLUMN: &str = "experiment";

/// Leading columns of every summary table, in order.
pub const CANONICAL_COLUMNS: [&str; 10] = [
    EXPERIMENT_COLUMN,
    "final_train_loss",
    "final_val_loss",
    "block_size",
    "n_layer",
    "n_head",
    "n_embd",
    "batch_size",
    "max_iters",
    "dropout",
];

/// One experiment in the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    experiment: String,
    hyperparams: HyperparameterSet,
    final_train_loss: Option<f64>,
    final_val_loss: Option<f64>,
    extras: Vec<(String, String)>,
}

impl SummaryRow {
    /// Create a row without passthrough columns.
    ///
    /// Non-finite losses (a diverged run logs `nan`) are stored as absent, so
    /// such rows rank last and stay out of every statistic.
    #[must_use]
    pub fn new(
        experiment: impl Into<String>,
        hyperparams: HyperparameterSet,
        final_train_loss: Option<f64>,
        final_val_loss: Option<f64>,
    ) -> Self {
        Self {
            experiment: experiment.into(),
            hyperparams,
            final_train_loss: final_train_loss.filter(|v| v.is_finite()),
            final_val_loss: final_val_loss.filter(|v| v.is_finite()),
            extras: Vec::new(),
        }
    }

    /// Attach a passthrough column.
    #[must_use]
    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.push((column.into(), value.into()));
        self
    }

    /// Experiment directory name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Hyperparameters decoded from the experiment name.
    #[must_use]
    pub const fn hyperparams(&self) -> &HyperparameterSet {
        &self.hyperparams
    }

    /// Final training loss, if known.
    #[must_use]
    pub const fn final_train_loss(&self) -> Option<f64> {
        self.final_train_loss
    }

    /// Final validation loss, if known.
    #[must_use]
    pub const fn final_val_loss(&self) -> Option<f64> {
        self.final_val_loss
    }

    /// Passthrough columns in artifact order.
    #[must_use]
    pub fn extras(&self) -> &[(String, String)] {
        &self.extras
    }

    /// Look up one passthrough column.
    #[must_use]
    pub fn extra(&self, column: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// JSON object with the canonical fields followed by the extras.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let h = &self.hyperparams;
        let mut map = serde_json::Map::new();
        map.insert(EXPERIMENT_COLUMN.into(), self.experiment.clone().into());
        map.insert("final_train_loss".into(), self.final_train_loss.into());
        map.insert("final_val_loss".into(), self.final_val_loss.into());
        map.insert("block_size".into(), h.block_size.into());
        map.insert("n_layer".into(), h.n_layer.into());
        map.insert("n_head".into(), h.n_head.into());
        map.insert("n_embd".into(), h.n_embd.into());
        map.insert("batch_size".into(), h.batch_size.into());
        map.insert("max_iters".into(), h.max_iters.into());
        map.insert("dropout".into(), h.dropout.into());
        for (column, value) in &self.extras {
            map.insert(column.clone(), value.clone().into());
        }
        serde_json::Value::Object(map)
    }
}

/// Ascending by validation loss, missing losses last.
fn by_val_loss(a: &SummaryRow, b: &SummaryRow) -> Ordering {
    match (a.final_val_loss, b.final_val_loss) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// All experiments, ranked by validation loss.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
    extra_columns: Vec<String>,
}

impl SummaryTable {
    /// Build a table; rows are stably sorted by ascending validation loss.
    #[must_use]
    pub fn from_rows(mut rows: Vec<SummaryRow>) -> Self {
        rows.sort_by(by_val_loss);

        let mut extra_columns: Vec<String> = Vec::new();
        for row in &rows {
            for (column, _) in &row.extras {
                if !CANONICAL_COLUMNS.contains(&column.as_str()) && !extra_columns.contains(column)
                {
                    extra_columns.push(column.clone());
                }
            }
        }

        Self {
            rows,
            extra_columns,
        }
    }

    /// Rows, best first.
    #[must_use]
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The best `n` rows; all rows when the table is shorter.
    #[must_use]
    pub fn top_n(&self, n: usize) -> &[SummaryRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Look a row up by experiment name.
    #[must_use]
    pub fn get(&self, experiment: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.experiment == experiment)
    }

    /// Passthrough column names in first-seen order.
    #[must_use]
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    /// Full header: canonical columns then passthrough columns.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        CANONICAL_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(self.extra_columns.iter().cloned())
            .collect()
    }

    /// True if at least one row has a validation loss.
    #[must_use]
    pub fn has_val_loss(&self) -> bool {
        self.rows.iter().any(|r| r.final_val_loss.is_some())
    }

    /// Statistics over the validation-loss column.
    #[must_use]
    pub fn val_loss_stats(&self) -> Option<ValLossStats> {
        ValLossStats::from_rows(&self.rows)
    }

    /// Mean validation loss per hyperparameter value.
    #[must_use]
    pub fn breakdown(&self) -> Vec<HyperparameterBreakdown> {
        breakdown(&self.rows)
    }

    /// Write the table as CSV. Missing values become empty cells.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.columns())?;

        for row in &self.rows {
            let mut record = vec![
                row.experiment.clone(),
                format_optional(row.final_train_loss),
                format_optional(row.final_val_loss),
            ];
            record.extend(HyperparameterField::ALL.iter().map(|f| f.label(&row.hyperparams)));
            record.extend(
                self.extra_columns
                    .iter()
                    .map(|c| row.extra(c).unwrap_or_default().to_string()),
            );
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Read a table written by [`write_csv`](Self::write_csv) (or by the
    /// older pandas tooling).
    ///
    /// Loss cells that do not parse are treated as missing. Hyperparameters
    /// come from their columns, falling back to decoding the experiment
    /// name; rows with neither are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or lacks an `experiment`
    /// column.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let index = |name: &str| headers.iter().position(|h| h == name);

        let experiment_idx = index(EXPERIMENT_COLUMN).ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column: EXPERIMENT_COLUMN.to_string(),
        })?;
        let train_idx = index(TRAIN_LOSS.canonical);
        let val_idx = index(VAL_LOSS.canonical);
        let field_idx: Vec<Option<usize>> =
            HyperparameterField::ALL.iter().map(|f| index(f.name())).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or_default();
            let experiment = cell(Some(experiment_idx)).to_string();

            let hyperparams = hyperparams_from_cells(&field_idx, &cell)
                .or_else(|| HyperparameterSet::decode(&experiment));
            let Some(hyperparams) = hyperparams else {
                warn!(experiment = %experiment, "summary row has no usable hyperparameters; skipping");
                continue;
            };

            let mut row = SummaryRow::new(
                experiment,
                hyperparams,
                parse_loss(cell(train_idx)),
                parse_loss(cell(val_idx)),
            );
            for (i, column) in headers.iter().enumerate() {
                if is_derived_column(column) {
                    continue;
                }
                match record.get(i) {
                    Some(value) if !value.is_empty() => {
                        row.extras.push((column.clone(), value.to_string()));
                    }
                    _ => {}
                }
            }
            rows.push(row);
        }

        Ok(Self::from_rows(rows))
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn hyperparams_from_cells<'a>(
    field_idx: &[Option<usize>],
    cell: &impl Fn(Option<usize>) -> &'a str,
) -> Option<HyperparameterSet> {
    let text = |field: HyperparameterField| {
        let position = HyperparameterField::ALL.iter().position(|f| *f == field)?;
        let raw = cell(field_idx[position]).trim();
        (!raw.is_empty()).then_some(raw)
    };
    Some(HyperparameterSet {
        block_size: text(HyperparameterField::BlockSize)?.parse().ok()?,
        n_layer: text(HyperparameterField::NLayer)?.parse().ok()?,
        n_head: text(HyperparameterField::NHead)?.parse().ok()?,
        n_embd: text(HyperparameterField::NEmbd)?.parse().ok()?,
        batch_size: text(HyperparameterField::BatchSize)?.parse().ok()?,
        max_iters: text(HyperparameterField::MaxIters)?.parse().ok()?,
        dropout: text(HyperparameterField::Dropout)?.parse().ok()?,
    })
}

/// Outcome of one aggregation pass.
#[derive(Debug, Default)]
pub struct AggregationReport {
    /// The ranked table
    pub table: SummaryTable,
    /// Experiments without a metrics artifact
    pub missing_metrics: Vec<String>,
    /// Experiments skipped for other reasons
    pub failures: Vec<(String, Error)>,
    /// Table-level problems (e.g. no row has a validation loss)
    pub warnings: Vec<String>,
}

/// Read the header and first row of a metrics artifact as column/value pairs.
fn read_artifact_cells(experiment: &str, path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let record = reader
        .records()
        .next()
        .ok_or_else(|| Error::EmptyMetricsArtifact(experiment.to_string()))??;

    Ok(headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.trim().to_string(), v.trim().to_string()))
        .collect())
}

/// Columns the summary derives itself, so they are not passed through.
fn is_derived_column(column: &str) -> bool {
    column.is_empty()
        || column == EXPERIMENT_COLUMN
        || column == aliases::PANDAS_INDEX_COLUMN
        || TRAIN_LOSS.matches(column)
        || VAL_LOSS.matches(column)
        || HyperparameterField::from_name(column).is_some()
}

/// Hyperparameter columns of the artifact that disagree with the name.
fn diverging_fields(cells: &[(String, String)], h: &HyperparameterSet) -> Vec<&'static str> {
    HyperparameterField::ALL
        .into_iter()
        .filter(|field| {
            cells
                .iter()
                .find(|(c, _)| c == field.name())
                .and_then(|(_, v)| v.parse::<f64>().ok())
                .is_some_and(|v| (v - field.value(h)).abs() > DROPOUT_TOLERANCE)
        })
        .map(HyperparameterField::name)
        .collect()
}

/// Build the summary row of one experiment from its artifact.
///
/// # Errors
///
/// `MissingMetricsArtifact`, `UnparsableName`, `EmptyMetricsArtifact`, or a
/// CSV/I-O error reading the artifact.
pub fn load_row(config: &PipelineConfig, experiment: &str) -> Result<SummaryRow> {
    let metrics_path = config.metrics_path(experiment);
    if !metrics_path.is_file() {
        return Err(Error::MissingMetricsArtifact {
            experiment: experiment.to_string(),
            path: metrics_path,
        });
    }
    let hyperparams = HyperparameterSet::decode(experiment)
        .ok_or_else(|| Error::UnparsableName(experiment.to_string()))?;
    let cells = read_artifact_cells(experiment, &metrics_path)?;

    let mut train = TRAIN_LOSS.resolve(&cells).map(|(_, v)| v);
    let mut val = VAL_LOSS.resolve(&cells).map(|(_, v)| v);
    if train.is_none() || val.is_none() {
        let recomputed = RawTrainingLog::load(experiment, &config.training_log_path(experiment))
            .and_then(|log| log.final_losses());
        match recomputed {
            Ok(last) => {
                debug!(experiment = %experiment, "losses recomputed from training log");
                train = Some(last.train_loss);
                val = Some(last.val_loss);
            }
            Err(e) => {
                warn!(experiment = %experiment, error = %e, "no loss values in artifact or training log");
            }
        }
    }

    if [train, val].iter().flatten().any(|v| !v.is_finite()) {
        warn!(experiment = %experiment, "non-finite loss (diverged run?); treated as missing");
    }

    let diverging = diverging_fields(&cells, &hyperparams);
    if !diverging.is_empty() {
        warn!(
            experiment = %experiment,
            fields = ?diverging,
            "metrics artifact hyperparameters disagree with directory name; using the name"
        );
    }

    let mut row = SummaryRow::new(experiment, hyperparams, train, val);
    row.extras = cells
        .into_iter()
        .filter(|(column, _)| !is_derived_column(column))
        .collect();
    Ok(row)
}

/// Aggregate every experiment under the sweep root into a [`SummaryTable`].
///
/// # Errors
///
/// Returns error only if the sweep root cannot be listed.
pub fn aggregate(config: &PipelineConfig) -> Result<AggregationReport> {
    let runs = list_runs(config.root(), config.prefix())?;
    info!(count = runs.len(), root = %config.root().display(), "aggregating experiments");

    let mut report = AggregationReport::default();
    let mut rows = Vec::with_capacity(runs.len());
    for experiment in runs {
        match load_row(config, &experiment) {
            Ok(row) => {
                match row.final_val_loss {
                    Some(loss) => info!(experiment = %experiment, val_loss = loss, "summarized"),
                    None => warn!(experiment = %experiment, "summarized without loss values"),
                }
                rows.push(row);
            }
            Err(Error::MissingMetricsArtifact { .. }) => {
                debug!(experiment = %experiment, "no metrics artifact");
                report.missing_metrics.push(experiment);
            }
            Err(e) => {
                warn!(experiment = %experiment, error = %e, "skipping experiment");
                report.failures.push((experiment, e));
            }
        }
    }

    report.table = SummaryTable::from_rows(rows);
    if !report.table.is_empty() {
        let has_train = report.table.rows().iter().any(|r| r.final_train_loss.is_some());
        let has_val = report.table.has_val_loss();
        for (column, present) in [(TRAIN_LOSS.canonical, has_train), (VAL_LOSS.canonical, has_val)] {
            if !present {
                warn!(column, "no experiment has this column");
                report.warnings.push(format!("missing column in summary: {column}"));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, val: Option<f64>) -> SummaryRow {
        SummaryRow::new(name, HyperparameterSet::decode(name).unwrap(), Some(1.0), val)
    }

    #[test]
    fn test_from_rows_sorts_missing_last() {
        let table = SummaryTable::from_rows(vec![
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1", None),
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.2", Some(0.5)),
            row("out_bs64_nl4_nh4_ne128_b16_mi1000_do0.1", Some(0.3)),
        ]);
        let order: Vec<Option<f64>> = table.rows().iter().map(SummaryRow::final_val_loss).collect();
        assert_eq!(order, vec![Some(0.3), Some(0.5), None]);
    }

    #[test]
    fn test_top_n_bounds() {
        let table = SummaryTable::from_rows(vec![
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1", Some(0.4)),
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.2", Some(0.5)),
        ]);
        assert_eq!(table.top_n(3).len(), 2);
        assert_eq!(table.top_n(1).len(), 1);
        assert!(table.top_n(0).is_empty());
    }

    #[test]
    fn test_columns_canonical_then_extras() {
        let table = SummaryTable::from_rows(vec![
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1", Some(0.4)).with_extra("actual_iters", "1000"),
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.2", Some(0.5)).with_extra("seed", "7"),
        ]);
        let columns = table.columns();
        assert_eq!(&columns[..3], &["experiment", "final_train_loss", "final_val_loss"]);
        assert_eq!(&columns[10..], &["actual_iters", "seed"]);
    }

    #[test]
    fn test_csv_roundtrip_keeps_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let table = SummaryTable::from_rows(vec![
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1", Some(0.4)).with_extra("actual_iters", "990"),
            SummaryRow::new(
                "out_bs64_nl4_nh4_ne128_b8_mi1000_do0.2",
                HyperparameterSet::decode("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.2").unwrap(),
                None,
                None,
            ),
        ]);
        table.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().nth(2).unwrap().starts_with("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.2,,,64,"));

        let back = SummaryTable::read_csv(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_read_csv_requires_experiment_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        std::fs::write(&path, "final_val_loss\n0.5\n").unwrap();
        assert!(matches!(
            SummaryTable::read_csv(&path),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_read_csv_falls_back_to_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        std::fs::write(
            &path,
            "experiment,final_val_loss\nout_bs64_nl4_nh8_ne256_b8_mi1000_do0.1,not-a-number\nbaseline,0.2\n",
        )
        .unwrap();

        let table = SummaryTable::read_csv(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].hyperparams().n_head, 8);
        assert_eq!(table.rows()[0].final_val_loss(), None);
    }

    #[test]
    fn test_read_csv_drops_pandas_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        std::fs::write(
            &path,
            "Unnamed: 0,experiment,final_val_loss,actual_iters
0,out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1,0.5,990
",
        )
        .unwrap();

        let table = SummaryTable::read_csv(&path).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.extra("Unnamed: 0"), None);
        assert_eq!(row.extra("actual_iters"), Some("990"));
        assert_eq!(table.extra_columns(), &["actual_iters".to_string()]);
    }

    #[test]
    fn test_derived_columns() {
        assert!(is_derived_column("validation_loss"));
        assert!(is_derived_column("Unnamed: 0"));
        assert!(is_derived_column("n_embd"));
        assert!(!is_derived_column("actual_iters"));
    }

    #[test]
    fn test_to_json() {
        let json = row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1", Some(0.4))
            .with_extra("actual_iters", "1000")
            .to_json();
        assert_eq!(json["experiment"], "out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1");
        assert_eq!(json["n_embd"], 128);
        assert_eq!(json["actual_iters"], "1000");
    }
}
