//! Descriptive statistics over the validation-loss column
//!
//! Everything is computed in f64 so the reported best loss is exactly the
//! value in the table. Non-finite losses (a diverged run) are skipped, the
//! same as rows without a loss.

use rustc_hash::FxHashMap;

use super::SummaryRow;
use crate::experiment::HyperparameterField;

/// Distribution of `final_val_loss` across the summary table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValLossStats {
    /// Rows that had a finite validation loss
    pub count: usize,
    /// Best (lowest) validation loss
    pub min: f64,
    /// Worst (highest) validation loss
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Median (mean of the two middle values for even counts)
    pub median: f64,
    /// Sample standard deviation (n - 1); `None` for a single row
    pub std_dev: Option<f64>,
}

impl ValLossStats {
    /// Compute statistics over the finite entries of `values`.
    ///
    /// Returns `None` when no value is finite.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        let std_dev = (count > 1).then(|| {
            let squares: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        });

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std_dev,
        })
    }

    /// Statistics over every row that has a validation loss.
    #[must_use]
    pub fn from_rows(rows: &[SummaryRow]) -> Option<Self> {
        let values: Vec<f64> = rows.iter().filter_map(SummaryRow::final_val_loss).collect();
        Self::from_values(&values)
    }
}

/// Mean validation loss of the rows sharing one hyperparameter value.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    /// Value as it appears in the summary CSV
    pub value: String,
    /// Mean validation loss of the group
    pub mean_val_loss: f64,
    /// Rows in the group
    pub count: usize,
}

/// Per-value mean validation loss for one hyperparameter.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterBreakdown {
    /// Hyperparameter the rows were grouped by
    pub field: HyperparameterField,
    /// Groups sorted by ascending mean loss
    pub groups: Vec<GroupMean>,
}

/// Group rows by each hyperparameter in turn and average the validation loss.
///
/// Rows without a finite validation loss are ignored. Ties in the mean are ordered
/// by the numeric hyperparameter value.
#[must_use]
pub fn breakdown(rows: &[SummaryRow]) -> Vec<HyperparameterBreakdown> {
    HyperparameterField::ALL
        .into_iter()
        .map(|field| HyperparameterBreakdown {
            field,
            groups: group_means(rows, field),
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn group_means(rows: &[SummaryRow], field: HyperparameterField) -> Vec<GroupMean> {
    // label -> (numeric value, sum, count)
    let mut groups: FxHashMap<String, (f64, f64, usize)> = FxHashMap::default();
    for row in rows {
        let Some(loss) = row.final_val_loss().filter(|v| v.is_finite()) else {
            continue;
        };
        let h = row.hyperparams();
        let entry = groups
            .entry(field.label(h))
            .or_insert((field.value(h), 0.0, 0));
        entry.1 += loss;
        entry.2 += 1;
    }

    let mut means: Vec<(f64, GroupMean)> = groups
        .into_iter()
        .map(|(value, (numeric, sum, count))| {
            (
                numeric,
                GroupMean {
                    value,
                    mean_val_loss: sum / count as f64,
                    count,
                },
            )
        })
        .collect();
    means.sort_by(|(na, a), (nb, b)| {
        a.mean_val_loss
            .total_cmp(&b.mean_val_loss)
            .then(na.total_cmp(nb))
    });
    means.into_iter().map(|(_, group)| group).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::HyperparameterSet;

    fn row(name: &str, val: Option<f64>) -> SummaryRow {
        SummaryRow::new(
            name,
            HyperparameterSet::decode(name).unwrap(),
            val.map(|v| v + 0.1),
            val,
        )
    }

    #[test]
    fn test_stats_basic() {
        let stats = ValLossStats::from_values(&[0.5, 0.3, 0.4, 0.6]).unwrap();
        assert_eq!(stats.count, 4);
        assert!((stats.mean - 0.45).abs() < 1e-12);
        assert!((stats.median - 0.45).abs() < 1e-12);
        // sample std of [0.3, 0.4, 0.5, 0.6]
        assert!((stats.std_dev.unwrap() - 0.129_099_444_9).abs() < 1e-6);
    }

    #[test]
    fn test_stats_single_and_empty() {
        let stats = ValLossStats::from_values(&[1.5]).unwrap();
        assert!((stats.median - 1.5).abs() < 1e-12);
        assert!(stats.std_dev.is_none());
        assert!(ValLossStats::from_values(&[]).is_none());
        assert!(ValLossStats::from_values(&[f64::NAN, f64::INFINITY]).is_none());
    }

    #[test]
    fn test_stats_min_max_exact() {
        let stats = ValLossStats::from_values(&[1.2345, 0.9876]).unwrap();
        assert_eq!(stats.min, 0.9876);
        assert_eq!(stats.max, 1.2345);
        assert_eq!(stats.mean, (0.9876 + 1.2345) / 2.0);
    }

    #[test]
    fn test_stats_skip_non_finite() {
        let stats = ValLossStats::from_values(&[1.3, f64::NAN, 1.1, f64::NEG_INFINITY]).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 1.1);
        assert!(stats.mean.is_finite());
        assert!((stats.median - 1.2).abs() < 1e-12);
        assert!(stats.std_dev.unwrap().is_finite());
    }

    #[test]
    fn test_breakdown_groups_and_sorts() {
        let rows = vec![
            row("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1", Some(2.0)),
            row("out_bs64_nl4_nh8_ne128_b8_mi1000_do0.1", Some(1.0)),
            row("out_bs64_nl4_nh8_ne256_b8_mi1000_do0.2", Some(1.4)),
            row("out_bs64_nl4_nh4_ne256_b8_mi1000_do0.2", None),
        ];
        let all = breakdown(&rows);
        assert_eq!(all.len(), 7);

        let heads = all.iter().find(|b| b.field == HyperparameterField::NHead).unwrap();
        assert_eq!(heads.groups.len(), 2);
        assert_eq!(heads.groups[0].value, "8");
        assert!((heads.groups[0].mean_val_loss - 1.2).abs() < 1e-12);
        assert_eq!(heads.groups[0].count, 2);
        assert_eq!(heads.groups[1].value, "4");

        let dropout = all.iter().find(|b| b.field == HyperparameterField::Dropout).unwrap();
        assert_eq!(dropout.groups[0].value, "0.2");
        assert_eq!(dropout.groups[0].count, 1);

        let block = all.iter().find(|b| b.field == HyperparameterField::BlockSize).unwrap();
        assert_eq!(block.groups.len(), 1);
    }
}
