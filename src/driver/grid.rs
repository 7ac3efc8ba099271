//! Sweep grids
//!
//! A grid is one value list per hyperparameter. The four group-member
//! presets split the 128-run sweep into four 32-run slices by fixing
//! `block_size` and `n_layer`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::experiment::HyperparameterSet;
use crate::{Error, Result};

/// Value lists whose cartesian product is the sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepGrid {
    /// Context lengths
    pub block_size: Vec<u32>,
    /// Layer counts
    pub n_layer: Vec<u32>,
    /// Attention head counts
    pub n_head: Vec<u32>,
    /// Embedding widths
    pub n_embd: Vec<u32>,
    /// Batch sizes
    pub batch_size: Vec<u32>,
    /// Iteration budgets
    pub max_iters: Vec<u64>,
    /// Dropout probabilities
    pub dropout: Vec<f64>,
}

impl SweepGrid {
    /// Preset grid of group member 1-4.
    ///
    /// | member | block_size | n_layer |
    /// |--------|------------|---------|
    /// | 1      | 64         | 4       |
    /// | 2      | 64         | 6       |
    /// | 3      | 128        | 4       |
    /// | 4      | 128        | 6       |
    ///
    /// # Errors
    ///
    /// `InvalidInput` for any other member number.
    pub fn member(member: u8) -> Result<Self> {
        let (block_size, n_layer) = match member {
            1 => (64, 4),
            2 => (64, 6),
            3 => (128, 4),
            4 => (128, 6),
            other => {
                return Err(Error::InvalidInput(format!(
                    "group member must be 1, 2, 3, or 4, got {other}"
                )))
            }
        };
        Ok(Self {
            block_size: vec![block_size],
            n_layer: vec![n_layer],
            n_head: vec![4, 8],
            n_embd: vec![128, 256],
            batch_size: vec![8, 16],
            max_iters: vec![1000, 2000],
            dropout: vec![0.1, 0.2],
        })
    }

    /// Load a grid from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or does not describe a grid.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Size of the full cartesian product, including invalid combinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.block_size.len()
            * self.n_layer.len()
            * self.n_head.len()
            * self.n_embd.len()
            * self.batch_size.len()
            * self.max_iters.len()
            * self.dropout.len()
    }

    /// True when some field has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Valid combinations in field order, last field varying fastest.
    ///
    /// Combinations rejected by [`HyperparameterSet::validate`] are skipped
    /// with a warning.
    #[must_use]
    pub fn combinations(&self) -> Vec<HyperparameterSet> {
        let mut out = Vec::with_capacity(self.len());
        for &block_size in &self.block_size {
            for &n_layer in &self.n_layer {
                for &n_head in &self.n_head {
                    for &n_embd in &self.n_embd {
                        for &batch_size in &self.batch_size {
                            for &max_iters in &self.max_iters {
                                for &dropout in &self.dropout {
                                    let h = HyperparameterSet {
                                        block_size,
                                        n_layer,
                                        n_head,
                                        n_embd,
                                        batch_size,
                                        max_iters,
                                        dropout,
                                    };
                                    match h.validate() {
                                        Ok(()) => out.push(h),
                                        Err(e) => warn!(run = %h, error = %e, "skipping invalid combination"),
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}
