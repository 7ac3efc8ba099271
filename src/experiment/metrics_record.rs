//! Experiment Metrics - final losses of one run plus its hyperparameters

use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::HyperparameterSet;
use crate::{Error, Result};

/// Final metrics of one experiment.
///
/// Derived from the last row of the training log and the directory name,
/// then persisted as a one-row `final_metrics.csv` that acts as a
/// write-once cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperimentMetrics {
    final_train_loss: f64,
    final_val_loss: f64,
    actual_iters: u64,
    hyperparams: HyperparameterSet,
}

/// On-disk row. Field order is the artifact's column order.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactRow {
    final_train_loss: f64,
    final_val_loss: f64,
    max_iters: u64,
    n_layer: u32,
    n_head: u32,
    n_embd: u32,
    batch_size: u32,
    dropout: f64,
    block_size: u32,
    actual_iters: u64,
}

impl ExperimentMetrics {
    /// Create a metrics record.
    ///
    /// # Arguments
    ///
    /// * `final_train_loss` - Training loss at the last logged step
    /// * `final_val_loss` - Validation loss at the last logged step
    /// * `actual_iters` - `iter` of the last logged step
    /// * `hyperparams` - Decoded from the experiment directory name
    #[must_use]
    pub const fn new(
        final_train_loss: f64,
        final_val_loss: f64,
        actual_iters: u64,
        hyperparams: HyperparameterSet,
    ) -> Self {
        Self {
            final_train_loss,
            final_val_loss,
            actual_iters,
            hyperparams,
        }
    }

    /// Training loss at the last logged step.
    #[must_use]
    pub const fn final_train_loss(&self) -> f64 {
        self.final_train_loss
    }

    /// Validation loss at the last logged step.
    #[must_use]
    pub const fn final_val_loss(&self) -> f64 {
        self.final_val_loss
    }

    /// Iterations actually reached (may differ from `max_iters`).
    #[must_use]
    pub const fn actual_iters(&self) -> u64 {
        self.actual_iters
    }

    /// Hyperparameters of the run.
    #[must_use]
    pub const fn hyperparams(&self) -> &HyperparameterSet {
        &self.hyperparams
    }

    /// Write the artifact, refusing to replace an existing file.
    ///
    /// The row is staged in a temporary file next to `path` and linked into
    /// place once complete.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when written, `Ok(false)` when a file already existed.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or serialized.
    pub fn write_new(&self, path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)?;

        let h = self.hyperparams;
        {
            let mut writer = csv::Writer::from_writer(&mut staged);
            writer.serialize(ArtifactRow {
                final_train_loss: self.final_train_loss,
                final_val_loss: self.final_val_loss,
                max_iters: h.max_iters,
                n_layer: h.n_layer,
                n_head: h.n_head,
                n_embd: h.n_embd,
                batch_size: h.batch_size,
                dropout: h.dropout,
                block_size: h.block_size,
                actual_iters: self.actual_iters,
            })?;
            writer.flush()?;
        }
        staged.as_file().sync_all()?;

        match staged.persist_noclobber(path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error.into()),
        }
    }

    /// Read an artifact written by [`write_new`](Self::write_new).
    ///
    /// Only the canonical layout is accepted; legacy layouts go through the
    /// alias-tolerant reader in [`crate::summary`].
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, malformed or has no row.
    pub fn read(experiment: &str, path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let row: ArtifactRow = reader
            .deserialize()
            .next()
            .ok_or_else(|| Error::EmptyMetricsArtifact(experiment.to_string()))??;

        Ok(Self {
            final_train_loss: row.final_train_loss,
            final_val_loss: row.final_val_loss,
            actual_iters: row.actual_iters,
            hyperparams: HyperparameterSet {
                block_size: row.block_size,
                n_layer: row.n_layer,
                n_head: row.n_head,
                n_embd: row.n_embd,
                batch_size: row.batch_size,
                max_iters: row.max_iters,
                dropout: row.dropout,
            },
        })
    }
}
