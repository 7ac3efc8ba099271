//! Summary statistics benchmarks
//!
//! Validation-loss statistics (f64, sort-based median) and the
//! per-hyperparameter breakdown, at sweep sizes from one member slice to
//! many merged sweeps.
//!
//! Run with: cargo bench --bench summary_stats

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nanosweep::driver::SweepGrid;
use nanosweep::summary::{breakdown, SummaryRow, ValLossStats};

const SIZES: [usize; 3] = [32, 1_000, 100_000];

#[allow(clippy::cast_precision_loss)]
fn synthetic_rows(n: usize) -> Vec<SummaryRow> {
    let combos: Vec<_> = (1..=4)
        .filter_map(|member| SweepGrid::member(member).ok())
        .flat_map(|grid| grid.combinations())
        .collect();
    (0..n)
        .map(|i| {
            let h = combos[i % combos.len()];
            let val = 1.0 + ((i * 7919) % 1000) as f64 / 1000.0;
            SummaryRow::new(format!("{}_{i}", h.encode()), h, Some(val - 0.1), Some(val))
        })
        .collect()
}

fn bench_val_loss_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("val_loss_stats");
    for size in SIZES {
        let values: Vec<f64> = synthetic_rows(size)
            .iter()
            .filter_map(SummaryRow::final_val_loss)
            .collect();
        group.bench_with_input(BenchmarkId::new("f64_sorted", size), &values, |b, data| {
            b.iter(|| ValLossStats::from_values(black_box(data)));
        });
    }
    group.finish();
}

fn bench_breakdown(c: &mut Criterion) {
    let mut group = c.benchmark_group("hyperparameter_breakdown");
    for size in SIZES {
        let rows = synthetic_rows(size);
        group.bench_with_input(BenchmarkId::new("fxhash_group_by", size), &rows, |b, data| {
            b.iter(|| breakdown(black_box(data)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_val_loss_stats, bench_breakdown);
criterion_main!(benches);
