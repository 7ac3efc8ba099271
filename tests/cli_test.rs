//! CLI tests: parse arguments and run commands against a scratch sweep

use std::fs;
use std::path::Path;

use nanosweep::cli::{parse_args, run_command};
use nanosweep::driver::read_manifest;
use nanosweep::Error;

const RUNS: [(&str, &str); 3] = [
    ("out_bs64_nl4_nh4_ne128_b8_mi1000_do0.1", "1000,1.40,1.55"),
    ("out_bs64_nl4_nh8_ne256_b8_mi1000_do0.1", "1000,1.20,1.35"),
    ("out_bs64_nl4_nh4_ne256_b16_mi2000_do0.2", "2000,tensor(1.1),tensor(1.45)"),
];

fn populated_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (run, last_row) in RUNS {
        let run_dir = dir.path().join(run);
        fs::create_dir(&run_dir).unwrap();
        fs::write(
            run_dir.join("training_log.csv"),
            format!("iter,train_loss,val_loss\n0,4.2,4.3\n{last_row}\n"),
        )
        .unwrap();
    }
    dir
}

fn run(root: &Path, args: &[&str]) -> nanosweep::Result<()> {
    let mut argv = vec!["nanosweep", "--root", root.to_str().unwrap()];
    argv.extend_from_slice(args);
    run_command(&parse_args(argv).unwrap())
}

#[test]
fn test_evaluate_then_summary() {
    let dir = populated_root();
    run(dir.path(), &["evaluate"]).unwrap();
    for (name, _) in RUNS {
        assert!(dir.path().join(name).join("final_metrics.csv").is_file());
    }

    run(dir.path(), &["summary", "--parquet"]).unwrap();
    let summary = fs::read_to_string(dir.path().join("all_experiment_summary.csv")).unwrap();
    let mut lines = summary.lines();
    assert!(lines.next().unwrap().starts_with("experiment,final_train_loss,final_val_loss"));
    assert!(lines.next().unwrap().starts_with(RUNS[1].0));
    assert!(dir.path().join("all_experiment_summary.parquet").is_file());
}

#[test]
fn test_top_requires_summary() {
    let dir = populated_root();
    let err = run(dir.path(), &["top", "--no-plots"]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(err.to_string().contains("nanosweep summary"));
}

#[test]
fn test_top_writes_charts() {
    let dir = populated_root();
    run(dir.path(), &["evaluate"]).unwrap();
    run(dir.path(), &["summary"]).unwrap();
    run(dir.path(), &["top", "-n", "2", "--format", "svg"]).unwrap();

    let plots = dir.path().join("plots_top2");
    assert!(plots.join("top2_validation_comparison.svg").is_file());
    assert!(plots.join(format!("{}_loss_curve.svg", RUNS[1].0)).is_file());
}

#[test]
fn test_top_reads_parquet_when_csv_is_gone() {
    let dir = populated_root();
    run(dir.path(), &["evaluate"]).unwrap();
    run(dir.path(), &["summary", "--parquet"]).unwrap();
    fs::remove_file(dir.path().join("all_experiment_summary.csv")).unwrap();

    run(dir.path(), &["top", "-n", "2", "--no-plots"]).unwrap();
    assert!(!dir.path().join("plots_top2").exists());
}

#[test]
fn test_plot_skips_experiment_without_log() {
    let dir = populated_root();
    run(dir.path(), &["evaluate"]).unwrap();

    let orphan = "out_bs64_nl4_nh8_ne128_b8_mi1000_do0.2";
    let orphan_dir = dir.path().join(orphan);
    fs::create_dir(&orphan_dir).unwrap();
    fs::write(
        orphan_dir.join("final_metrics.csv"),
        "final_train_loss,final_val_loss\n1.3,1.5\n",
    )
    .unwrap();

    run(dir.path(), &["plot", "--format", "svg"]).unwrap();

    let plots = dir.path().join("plots");
    for (name, _) in RUNS {
        assert!(plots.join(format!("{name}_loss_curve.svg")).is_file());
    }
    for stem in ["val_loss_vs_embd", "val_loss_vs_dropout", "val_loss_vs_batch"] {
        assert!(plots.join(format!("{stem}.svg")).is_file());
    }
    assert!(!plots.join(format!("{orphan}_loss_curve.svg")).exists());
}

#[test]
fn test_compare_persists_summary() {
    let dir = populated_root();
    run(dir.path(), &["evaluate"]).unwrap();
    run(dir.path(), &["compare"]).unwrap();
    assert!(dir.path().join("all_experiment_summary.csv").is_file());
}

#[test]
fn test_summary_on_empty_root() {
    let dir = tempfile::tempdir().unwrap();
    run(dir.path(), &["summary"]).unwrap();
    assert!(!dir.path().join("all_experiment_summary.csv").exists());
}

#[test]
fn test_sweep_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    run(dir.path(), &["sweep", "--member", "2", "--dry-run"]).unwrap();
    assert!(!dir.path().join("sweep_manifest.json").exists());
}

#[test]
fn test_sweep_records_failed_trainer() {
    let dir = tempfile::tempdir().unwrap();
    let grid = dir.path().join("grid.yaml");
    fs::write(
        &grid,
        "block_size: [32]\nn_layer: [2]\nn_head: [2]\nn_embd: [64]\nbatch_size: [4]\nmax_iters: [10, 20]\ndropout: [0.0]\n",
    )
    .unwrap();

    run(
        dir.path(),
        &[
            "sweep",
            "--grid",
            grid.to_str().unwrap(),
            "--trainer",
            "definitely-not-a-real-program-xyz",
        ],
    )
    .unwrap();

    let manifest = read_manifest(&dir.path().join("sweep_manifest.json")).unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest[0].run_id(), "out_bs32_nl2_nh2_ne64_b4_mi10_do0.0");
}

#[test]
fn test_sample_rejects_non_positive_temperature() {
    let dir = populated_root();
    let err = run(dir.path(), &["sample", "--temperature", "0", "--dry-run"]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
