//! End-to-end pipeline tests on a scratch sweep root
//!
//! Covers extraction, aggregation, ranking and the columnar export:
//! 1. Write training logs the way the trainer does
//! 2. Extract `final_metrics.csv` per experiment
//! 3. Aggregate, rank, and persist the summary

use std::fs;
use std::path::Path;

use nanosweep::config::PipelineConfig;
use nanosweep::experiment::ExperimentMetrics;
use nanosweep::extract::{evaluate_all, extract_metrics, ExtractOutcome};
use nanosweep::storage::{write_parquet, SummaryStore};
use nanosweep::summary::{aggregate, SummaryTable};
use nanosweep::Error;
use tempfile::TempDir;

const RUN_A: &str = "out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1";
const RUN_B: &str = "out_bs64_nl4_nh8_ne256_b16_mi2000_do0.2";

fn sweep_root() -> (TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder().root(dir.path()).build();
    (dir, config)
}

fn write_log(root: &Path, run: &str, body: &str) {
    let dir = root.join(run);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("training_log.csv"), body).unwrap();
}

fn write_artifact(root: &Path, run: &str, body: &str) {
    let dir = root.join(run);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("final_metrics.csv"), body).unwrap();
}

#[test]
fn test_extract_parses_tensor_cells() {
    let (dir, config) = sweep_root();
    write_log(
        dir.path(),
        RUN_A,
        "iter,train_loss,val_loss\n0,tensor(4.1),tensor(4.2)\n500,tensor(1.2345),0.9876\n",
    );

    let outcome = extract_metrics(&config, RUN_A).unwrap();
    let ExtractOutcome::Created(metrics) = outcome else {
        panic!("Expected a new artifact, got {outcome:?}");
    };
    assert!((metrics.final_train_loss() - 1.2345).abs() < 1e-12);
    assert!((metrics.final_val_loss() - 0.9876).abs() < 1e-12);
    assert_eq!(metrics.actual_iters(), 500);
    assert_eq!(metrics.hyperparams().n_embd, 128);

    let read = ExperimentMetrics::read(RUN_A, &config.metrics_path(RUN_A)).unwrap();
    assert_eq!(read, metrics);
}

#[test]
fn test_extract_is_idempotent() {
    let (dir, config) = sweep_root();
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n1000,1.5,1.6\n");

    assert!(matches!(
        extract_metrics(&config, RUN_A).unwrap(),
        ExtractOutcome::Created(_)
    ));
    let first = fs::read(config.metrics_path(RUN_A)).unwrap();

    // A newer log does not invalidate the cached artifact.
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n2000,0.1,0.2\n");
    assert_eq!(
        extract_metrics(&config, RUN_A).unwrap(),
        ExtractOutcome::AlreadyPresent
    );
    assert_eq!(fs::read(config.metrics_path(RUN_A)).unwrap(), first);
}

#[test]
fn test_empty_log_writes_no_artifact() {
    let (dir, config) = sweep_root();
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n");

    assert!(matches!(
        extract_metrics(&config, RUN_A),
        Err(Error::EmptyLog { .. })
    ));
    assert!(!config.metrics_path(RUN_A).exists());
}

#[test]
fn test_missing_log_is_reported_not_fatal() {
    let (dir, config) = sweep_root();
    fs::create_dir(dir.path().join(RUN_A)).unwrap();
    write_log(dir.path(), RUN_B, "iter,train_loss,val_loss\n2000,1.1,1.2\n");

    let report = evaluate_all(&config).unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, RUN_A);
    assert!(matches!(report.failures[0].1, Error::MissingLog { .. }));
    assert_eq!(report.total(), 2);
}

#[test]
fn test_ranking_lowest_val_loss_first() {
    let (dir, config) = sweep_root();
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n1000,0.4,0.5\n");
    write_log(dir.path(), RUN_B, "iter,train_loss,val_loss\n2000,0.2,0.3\n");

    evaluate_all(&config).unwrap();
    let report = aggregate(&config).unwrap();
    let table = &report.table;

    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[0].experiment(), RUN_B);
    assert_eq!(table.rows()[0].final_val_loss(), Some(0.3));
    assert_eq!(table.rows()[1].final_val_loss(), Some(0.5));

    // top-N never pads
    assert_eq!(table.top_n(3).len(), 2);
}

#[test]
fn test_diverged_run_ranks_last_and_skips_stats() {
    let (dir, config) = sweep_root();
    let diverged = "out_bs64_nl4_nh4_ne256_b8_mi1000_do0.1";
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n1000,1.2,1.3\n");
    write_log(dir.path(), RUN_B, "iter,train_loss,val_loss\n2000,1.0,1.1\n");
    write_log(dir.path(), diverged, "iter,train_loss,val_loss\n1000,tensor(nan),tensor(nan)\n");

    evaluate_all(&config).unwrap();
    let report = aggregate(&config).unwrap();
    let table = &report.table;
    assert_eq!(table.len(), 3);

    let last = &table.rows()[2];
    assert_eq!(last.experiment(), diverged);
    assert_eq!(last.final_val_loss(), None);
    assert_eq!(last.final_train_loss(), None);

    let stats = table.val_loss_stats().unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.min, 1.1);
    assert_eq!(stats.max, 1.3);
    assert!(stats.mean.is_finite());

    for breakdown in table.breakdown() {
        for group in &breakdown.groups {
            assert!(group.mean_val_loss.is_finite(), "group {}", group.value);
        }
    }

    let top: Vec<&str> = table.top_n(2).iter().map(|r| r.experiment()).collect();
    assert_eq!(top, vec![RUN_B, RUN_A]);
}

#[test]
fn test_artifact_hyperparams_defer_to_name() {
    let (dir, config) = sweep_root();
    write_artifact(dir.path(), RUN_A, "final_train_loss,final_val_loss,n_head\n1.0,1.1,8\n");

    let report = aggregate(&config).unwrap();
    let row = report.table.get(RUN_A).unwrap();
    assert_eq!(row.hyperparams().n_head, 4);
    assert_eq!(row.final_val_loss(), Some(1.1));
    assert!(row.extra("n_head").is_none());
    assert!(report.table.extra_columns().is_empty());
}

#[test]
fn test_legacy_validation_loss_column() {
    let (dir, config) = sweep_root();
    write_artifact(
        dir.path(),
        RUN_A,
        "Unnamed: 0,training_loss,validation_loss,actual_iters\n0,1.1,1.25,1000\n",
    );

    let report = aggregate(&config).unwrap();
    let row = report.table.get(RUN_A).unwrap();
    assert_eq!(row.final_train_loss(), Some(1.1));
    assert_eq!(row.final_val_loss(), Some(1.25));
    assert_eq!(row.extra("actual_iters"), Some("1000"));
    assert!(row.extra("validation_loss").is_none());
    assert!(row.extra("Unnamed: 0").is_none());
    assert!(report.warnings.is_empty());
}

#[test]
fn test_artifact_without_losses_falls_back_to_log() {
    let (dir, config) = sweep_root();
    write_artifact(dir.path(), RUN_A, "actual_iters\n1000\n");
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n1000,tensor(0.7),tensor(0.8)\n");

    let report = aggregate(&config).unwrap();
    let row = report.table.get(RUN_A).unwrap();
    assert_eq!(row.final_train_loss(), Some(0.7));
    assert_eq!(row.final_val_loss(), Some(0.8));
}

#[test]
fn test_unparsable_name_contributes_no_row() {
    let (dir, config) = sweep_root();
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n1000,0.4,0.5\n");
    write_log(dir.path(), "out_bs_broken", "iter,train_loss,val_loss\n1000,0.4,0.5\n");
    write_artifact(dir.path(), "out_bs_manual", "final_val_loss\n0.1\n");

    let evaluation = evaluate_all(&config).unwrap();
    assert!(evaluation
        .failures
        .iter()
        .any(|(run, e)| run == "out_bs_broken" && matches!(e, Error::UnparsableName(_))));
    assert!(!config.metrics_path("out_bs_broken").exists());

    let report = aggregate(&config).unwrap();
    assert_eq!(report.table.len(), 1);
    assert!(report.table.get("out_bs_manual").is_none());
    assert!(report
        .failures
        .iter()
        .any(|(run, e)| run == "out_bs_manual" && matches!(e, Error::UnparsableName(_))));
    assert_eq!(report.missing_metrics, vec!["out_bs_broken".to_string()]);
}

#[test]
fn test_missing_val_column_warns() {
    let (dir, config) = sweep_root();
    write_artifact(dir.path(), RUN_A, "final_train_loss\n1.0\n");

    let report = aggregate(&config).unwrap();
    assert_eq!(report.table.len(), 1);
    assert!(!report.table.has_val_loss());
    assert_eq!(
        report.warnings,
        vec!["missing column in summary: final_val_loss".to_string()]
    );
}

#[test]
fn test_summary_csv_and_parquet_agree() {
    let (dir, config) = sweep_root();
    write_log(dir.path(), RUN_A, "iter,train_loss,val_loss\n1000,0.4,0.5\n");
    write_log(dir.path(), RUN_B, "iter,train_loss,val_loss\n2000,0.2,0.3\n");
    evaluate_all(&config).unwrap();
    let table = aggregate(&config).unwrap().table;

    table.write_csv(&config.summary_path()).unwrap();
    write_parquet(&table, &config.summary_parquet_path()).unwrap();

    let from_csv = SummaryTable::read_csv(&config.summary_path()).unwrap();
    let from_parquet = SummaryStore::load_parquet(config.summary_parquet_path())
        .unwrap()
        .to_summary_table()
        .unwrap();
    assert_eq!(from_csv.len(), 2);
    assert_eq!(from_csv, from_parquet);
    assert_eq!(from_csv.rows()[0].experiment(), RUN_B);
}

#[test]
fn test_unreadable_root_is_fatal() {
    let config = PipelineConfig::builder()
        .root("/definitely/not/a/sweep/root")
        .build();
    assert!(matches!(evaluate_all(&config), Err(Error::Io(_))));
    assert!(matches!(aggregate(&config), Err(Error::Io(_))));
}
