//! Column aliases accepted when reading metrics artifacts
//!
//! Artifacts produced by older tooling name the loss columns differently.
//! Each canonical column lists the accepted names in priority order.

use crate::experiment::parse_loss;

/// A canonical column and the names it may appear under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAliases {
    /// Name written to the summary table
    pub canonical: &'static str,
    /// Accepted source names, tried in order (canonical first)
    pub aliases: &'static [&'static str],
}

/// Final training loss
pub const TRAIN_LOSS: ColumnAliases = ColumnAliases {
    canonical: "final_train_loss",
    aliases: &[
        "final_train_loss",
        "train_loss",
        "training_loss",
        "final_training_loss",
    ],
};

/// Final validation loss
pub const VAL_LOSS: ColumnAliases = ColumnAliases {
    canonical: "final_val_loss",
    aliases: &[
        "final_val_loss",
        "val_loss",
        "validation_loss",
        "final_validation_loss",
    ],
};

/// Pandas index column left behind by `to_csv(index=True)`
pub const PANDAS_INDEX_COLUMN: &str = "Unnamed: 0";

impl ColumnAliases {
    /// First alias whose cell is present and parses as a loss.
    ///
    /// Returns the matched source column together with the value.
    #[must_use]
    pub fn resolve<'a>(&self, row: &'a [(String, String)]) -> Option<(&'a str, f64)> {
        self.aliases.iter().find_map(|alias| {
            row.iter()
                .find(|(column, _)| column == alias)
                .and_then(|(column, cell)| parse_loss(cell).map(|v| (column.as_str(), v)))
        })
    }

    /// True if `column` is one of this column's names.
    #[must_use]
    pub fn matches(&self, column: &str) -> bool {
        self.aliases.contains(&column)
    }
}
