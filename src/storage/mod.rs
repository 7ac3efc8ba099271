//! Columnar export of the summary table (Arrow/Parquet)
//!
//! The CSV summary stays the interchange format; the Parquet twin is for
//! notebooks and dataframe tools that want typed columns:
//! - losses: nullable `Float64`
//! - hyperparameters: `UInt32` / `UInt64` / `Float64`, non-nullable
//! - passthrough columns: nullable `Utf8`
//!
//! Write pattern is whole-table only, like the summary CSV: every
//! aggregation rewrites the file.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tracing::debug;

use crate::experiment::HyperparameterSet;
use crate::summary::{SummaryRow, SummaryTable, CANONICAL_COLUMNS};
use crate::{Error, Result};

/// Arrow schema of a summary table: canonical columns then its extras.
#[must_use]
pub fn summary_schema(table: &SummaryTable) -> SchemaRef {
    let mut fields = vec![
        Field::new("experiment", DataType::Utf8, false),
        Field::new("final_train_loss", DataType::Float64, true),
        Field::new("final_val_loss", DataType::Float64, true),
        Field::new("block_size", DataType::UInt32, false),
        Field::new("n_layer", DataType::UInt32, false),
        Field::new("n_head", DataType::UInt32, false),
        Field::new("n_embd", DataType::UInt32, false),
        Field::new("batch_size", DataType::UInt32, false),
        Field::new("max_iters", DataType::UInt64, false),
        Field::new("dropout", DataType::Float64, false),
    ];
    fields.extend(
        table
            .extra_columns()
            .iter()
            .map(|c| Field::new(c.as_str(), DataType::Utf8, true)),
    );
    Arc::new(Schema::new(fields))
}

fn u32_column(rows: &[SummaryRow], get: impl Fn(&HyperparameterSet) -> u32) -> ArrayRef {
    Arc::new(UInt32Array::from_iter_values(
        rows.iter().map(|r| get(r.hyperparams())),
    ))
}

/// Convert a summary table into one `RecordBatch`.
///
/// # Errors
///
/// Returns error if Arrow rejects the columns.
pub fn to_record_batch(table: &SummaryTable) -> Result<RecordBatch> {
    let rows = table.rows();
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(SummaryRow::experiment))),
        Arc::new(rows.iter().map(SummaryRow::final_train_loss).collect::<Float64Array>()),
        Arc::new(rows.iter().map(SummaryRow::final_val_loss).collect::<Float64Array>()),
        u32_column(rows, |h| h.block_size),
        u32_column(rows, |h| h.n_layer),
        u32_column(rows, |h| h.n_head),
        u32_column(rows, |h| h.n_embd),
        u32_column(rows, |h| h.batch_size),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|r| r.hyperparams().max_iters),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.hyperparams().dropout),
        )),
    ];
    for column in table.extra_columns() {
        let values: StringArray = rows.iter().map(|r| r.extra(column)).collect();
        columns.push(Arc::new(values));
    }

    Ok(RecordBatch::try_new(summary_schema(table), columns)?)
}

/// Write the summary table as a single-batch Parquet file.
///
/// # Errors
///
/// Returns error if the file cannot be created or encoded.
pub fn write_parquet(table: &SummaryTable, path: &Path) -> Result<()> {
    let batch = to_record_batch(table)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    debug!(rows = batch.num_rows(), path = %path.display(), "wrote parquet summary");
    Ok(())
}

/// Record batches of a persisted summary
pub struct SummaryStore {
    batches: Vec<RecordBatch>,
}

impl SummaryStore {
    /// Wrap existing batches
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Load a summary Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path.as_ref())
            .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

        let reader = builder
            .build()
            .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
            batches.push(batch);
        }

        Ok(Self { batches })
    }

    /// All record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Rebuild the summary table from the stored batches.
    ///
    /// # Errors
    ///
    /// Returns error if a canonical column is missing or has the wrong type.
    pub fn to_summary_table(&self) -> Result<SummaryTable> {
        let mut rows = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            rows.extend(rows_from_batch(batch)?);
        }
        Ok(SummaryTable::from_rows(rows))
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::StorageError(format!("Missing column {name:?}")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::StorageError(format!("Column {name:?} has unexpected type")))
}

fn optional(values: &Float64Array, i: usize) -> Option<f64> {
    (!values.is_null(i)).then(|| values.value(i))
}

fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<SummaryRow>> {
    let experiment = column::<StringArray>(batch, "experiment")?;
    let train = column::<Float64Array>(batch, "final_train_loss")?;
    let val = column::<Float64Array>(batch, "final_val_loss")?;
    let block_size = column::<UInt32Array>(batch, "block_size")?;
    let n_layer = column::<UInt32Array>(batch, "n_layer")?;
    let n_head = column::<UInt32Array>(batch, "n_head")?;
    let n_embd = column::<UInt32Array>(batch, "n_embd")?;
    let batch_size = column::<UInt32Array>(batch, "batch_size")?;
    let max_iters = column::<UInt64Array>(batch, "max_iters")?;
    let dropout = column::<Float64Array>(batch, "dropout")?;

    let schema = batch.schema();
    let mut extras: Vec<(&str, &StringArray)> = Vec::new();
    for field in schema.fields() {
        let name = field.name().as_str();
        if !CANONICAL_COLUMNS.contains(&name) {
            extras.push((name, column::<StringArray>(batch, name)?));
        }
    }

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let hyperparams = HyperparameterSet {
            block_size: block_size.value(i),
            n_layer: n_layer.value(i),
            n_head: n_head.value(i),
            n_embd: n_embd.value(i),
            batch_size: batch_size.value(i),
            max_iters: max_iters.value(i),
            dropout: dropout.value(i),
        };
        let mut row = SummaryRow::new(
            experiment.value(i),
            hyperparams,
            optional(train, i),
            optional(val, i),
        );
        for (name, values) in &extras {
            if !values.is_null(i) {
                row = row.with_extra(*name, values.value(i));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> SummaryTable {
        let a = "out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1";
        let b = "out_bs128_nl6_nh8_ne256_b16_mi2000_do0.2";
        SummaryTable::from_rows(vec![
            SummaryRow::new(a, HyperparameterSet::decode(a).unwrap(), Some(1.2), Some(1.3))
                .with_extra("actual_iters", "1000"),
            SummaryRow::new(b, HyperparameterSet::decode(b).unwrap(), None, None),
        ])
    }

    #[test]
    fn test_record_batch_shape() {
        let batch = to_record_batch(&sample_table()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 11);
        assert_eq!(batch.schema().field(10).name(), "actual_iters");

        let val = column::<Float64Array>(&batch, "final_val_loss").unwrap();
        assert!(!val.is_null(0));
        assert!(val.is_null(1));
    }

    #[test]
    fn test_parquet_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.parquet");
        let table = sample_table();

        write_parquet(&table, &path).unwrap();
        let store = SummaryStore::load_parquet(&path).unwrap();
        assert_eq!(store.num_rows(), 2);
        assert_eq!(store.to_summary_table().unwrap(), table);
    }

    #[test]
    fn test_empty_table_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");

        write_parquet(&SummaryTable::default(), &path).unwrap();
        let store = SummaryStore::load_parquet(&path).unwrap();
        assert!(store.to_summary_table().unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = SummaryStore::load_parquet("/nonexistent/summary.parquet");
        assert!(matches!(result, Err(Error::StorageError(_))));
    }

    #[test]
    fn test_missing_column_rejected() {
        let schema = Arc::new(Schema::new(vec![Field::new("experiment", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["x"])) as ArrayRef],
        )
        .unwrap();
        let err = SummaryStore::new(vec![batch]).to_summary_table().unwrap_err();
        assert!(err.to_string().contains("final_train_loss"));
    }
}
