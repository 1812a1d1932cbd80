//! Integration tests for the CLI interface
//!
//! Tests argument parsing, config loading and report output of the binary

use assert_cmd::Command;
use predicates::prelude::*;
use tallygrid::testing::{post, Corpus};

fn storm_corpus() -> Corpus {
    Corpus::write(&[
        post(1, &["storm", "apache"], Some("2014-07-02T08:00:00.000")),
        post(2, &["apache-storm"], Some("2014-02-14T12:30:00.000")),
        post(3, &["java"], Some("2014-07-20T23:00:00.000")),
        String::new(),
        post(4, &["apache-storm"], Some("2014-02-01T00:00:00.000")),
    ])
    .unwrap()
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn test_run_help_lists_engine_flags() {
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--granularity"))
        .stdout(predicate::str::contains("--failure-policy"));
}

#[test]
fn test_presets_lists_all_queries() {
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("storm-posts"))
        .stdout(predicate::str::contains("july-2014-posts"))
        .stdout(predicate::str::contains("storm-popular-month"));
}

#[test]
fn test_run_default_query() {
    let corpus = storm_corpus();
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.arg("run")
        .arg(&corpus.path)
        .args(["--batch-size", "2", "--workers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            ">>> Total number of posts that were tagged with Apache Storm is '3'.",
        ));
}

#[test]
fn test_run_popular_month_coarse_broadcast() {
    let corpus = storm_corpus();
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.arg("run")
        .arg(&corpus.path)
        .args([
            "--query",
            "storm-popular-month",
            "--granularity",
            "coarse",
            "--delivery",
            "broadcast",
            "--pre-combine",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("'February' (2 posts)"));
}

#[test]
fn test_run_reads_stdin() {
    let input = [
        post(1, &["java"], Some("2014-07-15T00:00:00")),
        post(2, &["java"], Some("2014-06-30T23:59:59")),
    ]
    .join("\n");
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.args(["run", "-", "--query", "july-2014-posts"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("is '1'."));
}

#[test]
fn test_run_json_output() {
    let corpus = storm_corpus();
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    let output = cmd
        .arg("run")
        .arg(&corpus.path)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["aggregate"]["value"]["scalar"], 3);
    assert_eq!(json["aggregate"]["records"], 4);
}

#[test]
fn test_run_with_config_file_and_override() {
    let corpus = storm_corpus();
    let config = corpus.dir.path().join("tallygrid.toml");
    std::fs::write(
        &config,
        format!(
            "input = {:?}\n\n[query]\nkind = \"preset\"\nname = \"july-2014-posts\"\n\n[engine]\nbatch_size = 1\n",
            corpus.path.display().to_string()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.args(["run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("posts created in July 2014 is '2'."));

    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.args(["run", "--query", "storm-posts", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("is '3'."));
}

#[test]
fn test_missing_input_exits_with_source_error() {
    let corpus = storm_corpus();
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.arg("run")
        .arg(corpus.dir.path().join("missing.xml"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "Error: [E3001] Input file does not exist. Cannot read",
        ));
}

#[test]
fn test_unknown_preset_exits_with_config_error() {
    let corpus = storm_corpus();
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.arg("run")
        .arg(&corpus.path)
        .args(["--query", "storm"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown query preset"));
}

#[test]
fn test_zero_batch_size_rejected() {
    let corpus = storm_corpus();
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.arg("run")
        .arg(&corpus.path)
        .args(["--batch-size", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Configuration problem in 'engine.batch_size'",
        ));
}

#[test]
fn test_invalid_granularity_rejected_by_parser() {
    let mut cmd = Command::cargo_bin("tallygrid").unwrap();
    cmd.args(["run", "--granularity", "medium"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("medium"));
}
