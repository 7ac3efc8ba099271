//! Hyperparameter set and the directory-name codec
//!
//! Every experiment directory is named after the hyperparameters it was
//! trained with:
//!
//! ```text
//! out_bs{block_size}_nl{n_layer}_nh{n_head}_ne{n_embd}_b{batch_size}_mi{max_iters}_do{dropout}
//! ```
//!
//! The name is the only place the hyperparameters are recorded before
//! metrics extraction, so encode and decode must stay inverse of each other.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix shared by every encoded experiment directory name
pub const RUN_PREFIX: &str = "out_bs";

/// Tolerance used when comparing dropout values decoded from names
pub const DROPOUT_TOLERANCE: f64 = 1e-9;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"bs(\d+)_nl(\d+)_nh(\d+)_ne(\d+)_b(\d+)_mi(\d+)_do([0-9.]+)")
            .expect("static pattern is valid")
    })
}

/// Hyperparameters of one training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSet {
    /// Context length in characters
    pub block_size: u32,
    /// Number of transformer layers
    pub n_layer: u32,
    /// Attention heads per layer
    pub n_head: u32,
    /// Embedding width
    pub n_embd: u32,
    /// Sequences per optimizer step
    pub batch_size: u32,
    /// Training iterations requested
    pub max_iters: u64,
    /// Dropout probability
    pub dropout: f64,
}

impl HyperparameterSet {
    /// Encode into the experiment directory name.
    ///
    /// # Example
    ///
    /// ```rust
    /// use nanosweep::experiment::HyperparameterSet;
    ///
    /// let h = HyperparameterSet {
    ///     block_size: 64, n_layer: 4, n_head: 4, n_embd: 128,
    ///     batch_size: 8, max_iters: 1000, dropout: 0.1,
    /// };
    /// assert_eq!(h.encode(), "out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1");
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{RUN_PREFIX}{}_nl{}_nh{}_ne{}_b{}_mi{}_do{}",
            self.block_size,
            self.n_layer,
            self.n_head,
            self.n_embd,
            self.batch_size,
            self.max_iters,
            format_dropout(self.dropout)
        )
    }

    /// Decode a directory name. Returns `None` when the pattern is absent or
    /// a field does not fit its integer type.
    #[must_use]
    pub fn decode(name: &str) -> Option<Self> {
        let caps = name_pattern().captures(name)?;
        Some(Self {
            block_size: caps[1].parse().ok()?,
            n_layer: caps[2].parse().ok()?,
            n_head: caps[3].parse().ok()?,
            n_embd: caps[4].parse().ok()?,
            batch_size: caps[5].parse().ok()?,
            max_iters: caps[6].parse().ok()?,
            dropout: caps[7].parse().ok()?,
        })
    }

    /// Validate the set before handing it to a trainer.
    ///
    /// Downstream stages never call this: whatever the trainer accepted is
    /// what the logs describe.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for zero-valued fields, dropout outside [0, 1],
    /// or `n_embd` not divisible by `n_head`.
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("block_size", u64::from(self.block_size)),
            ("n_layer", u64::from(self.n_layer)),
            ("n_head", u64::from(self.n_head)),
            ("n_embd", u64::from(self.n_embd)),
            ("batch_size", u64::from(self.batch_size)),
            ("max_iters", self.max_iters),
        ];
        if let Some((field, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidInput(format!("{field} must be positive")));
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(Error::InvalidInput(format!(
                "dropout must be in [0, 1], got {}",
                self.dropout
            )));
        }
        if self.n_embd % self.n_head != 0 {
            return Err(Error::InvalidInput(format!(
                "n_embd ({}) must be divisible by n_head ({})",
                self.n_embd, self.n_head
            )));
        }
        Ok(())
    }

    /// Field-wise equality with dropout compared within [`DROPOUT_TOLERANCE`].
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.block_size == other.block_size
            && self.n_layer == other.n_layer
            && self.n_head == other.n_head
            && self.n_embd == other.n_embd
            && self.batch_size == other.batch_size
            && self.max_iters == other.max_iters
            && (self.dropout - other.dropout).abs() <= DROPOUT_TOLERANCE
    }
}

impl fmt::Display for HyperparameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Shortest round-trip decimal, with `.0` appended to integral values so the
/// names match existing sweep directories (`do0.0`, `do1.0`).
#[must_use]
pub fn format_dropout(dropout: f64) -> String {
    let s = dropout.to_string();
    if s.contains('.') || !dropout.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

/// One addressable field of a [`HyperparameterSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HyperparameterField {
    /// `block_size`
    BlockSize,
    /// `n_layer`
    NLayer,
    /// `n_head`
    NHead,
    /// `n_embd`
    NEmbd,
    /// `batch_size`
    BatchSize,
    /// `max_iters`
    MaxIters,
    /// `dropout`
    Dropout,
}

impl HyperparameterField {
    /// All fields in summary column order.
    pub const ALL: [Self; 7] = [
        Self::BlockSize,
        Self::NLayer,
        Self::NHead,
        Self::NEmbd,
        Self::BatchSize,
        Self::MaxIters,
        Self::Dropout,
    ];

    /// Column name used in every CSV artifact.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BlockSize => "block_size",
            Self::NLayer => "n_layer",
            Self::NHead => "n_head",
            Self::NEmbd => "n_embd",
            Self::BatchSize => "batch_size",
            Self::MaxIters => "max_iters",
            Self::Dropout => "dropout",
        }
    }

    /// Look a field up by its column name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Numeric value of this field, for plotting axes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(self, h: &HyperparameterSet) -> f64 {
        match self {
            Self::BlockSize => f64::from(h.block_size),
            Self::NLayer => f64::from(h.n_layer),
            Self::NHead => f64::from(h.n_head),
            Self::NEmbd => f64::from(h.n_embd),
            Self::BatchSize => f64::from(h.batch_size),
            Self::MaxIters => h.max_iters as f64,
            Self::Dropout => h.dropout,
        }
    }

    /// Cell text of this field, as it appears in CSV output.
    #[must_use]
    pub fn label(self, h: &HyperparameterSet) -> String {
        match self {
            Self::BlockSize => h.block_size.to_string(),
            Self::NLayer => h.n_layer.to_string(),
            Self::NHead => h.n_head.to_string(),
            Self::NEmbd => h.n_embd.to_string(),
            Self::BatchSize => h.batch_size.to_string(),
            Self::MaxIters => h.max_iters.to_string(),
            Self::Dropout => format_dropout(h.dropout),
        }
    }
}

impl fmt::Display for HyperparameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
