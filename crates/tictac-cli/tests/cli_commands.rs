use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const SMALL_CONFIG: &str = r#"
{
  "twoJ3Max": 1,
  "j2Max": 0,
  "potential": { "model": "yamaguchi", "strength": 216.0148, "range": 1.4488 },
  "pGrid": { "cells": 12, "cutoff": 10.0, "pointsPerCell": 4 },
  "qGrid": { "cells": 6, "cutoff": 6.0, "pointsPerCell": 4 },
  "permutation": { "anglePoints": 6 },
  "solver": { "method": "direct" },
  "energies": { "frame": "centreOfMass", "values": [1.0] }
}
"#;

fn tictac(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tictac"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("tictac should launch")
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[test]
fn config_command_prints_defaults_as_camel_case_json() {
    let output = tictac(&["config"]);
    assert!(output.status.success());
    let parsed: Value =
        serde_json::from_slice(&output.stdout).expect("default config should be JSON");
    assert_eq!(parsed["twoJ3Max"], Value::from(1));
    assert_eq!(parsed["hbarSquaredOverMass"], Value::from(41.47));
    assert_eq!(parsed["permutation"]["mismatchPolicy"], "recompute");
    assert_eq!(parsed["solver"]["method"], "gmres");
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = tictac(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[INPUT.CLI_USAGE]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 2"), "stderr: {stderr}");
}

#[test]
fn invalid_configuration_fails_before_any_computation() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    write_file(&config, r#"{ "twoJ3Max": 2, "energies": { "values": [3.0] } }"#);
    let output_dir = temp.path().join("out");

    let output = tictac(&[
        "run",
        "--config",
        path_arg(&config),
        "--output",
        path_arg(&output_dir),
    ]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.CHANNELS]"), "stderr: {stderr}");
    assert!(!output_dir.exists(), "nothing should be written");
}

#[test]
fn missing_configuration_file_is_an_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = tictac(&[
        "run",
        "--config",
        path_arg(&temp.path().join("absent.json")),
    ]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[IO.CONFIG]"));
}

#[test]
fn phase_shift_command_lists_every_pair_channel() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    write_file(&config, SMALL_CONFIG);
    let table = temp.path().join("phases.dat");

    let output = tictac(&[
        "phase-shifts",
        "--config",
        path_arg(&config),
        "--energy",
        "1.0",
        "--energy",
        "10.0",
        "--output",
        path_arg(&table),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# bound 1S0"), "stdout: {stdout}");

    let written = fs::read_to_string(&table).expect("table should be written");
    let rows: Vec<&str> = written.lines().filter(|line| !line.starts_with('#')).collect();
    // 1S0 and 3P0 at two energies.
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().any(|row| row.starts_with("1S0")));
}

#[test]
fn run_writes_tables_and_reuses_the_stored_operator() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    write_file(&config, SMALL_CONFIG);
    let store = temp.path().join("p123");
    let output_dir = temp.path().join("out");

    let args = [
        "run",
        "--config",
        path_arg(&config),
        "--store",
        path_arg(&store),
        "--output",
        path_arg(&output_dir),
    ];
    let first = tictac(&args);
    assert!(
        first.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&first.stderr)
    );
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("exchange operator computed"), "stdout: {stdout}");
    assert!(stdout.contains("Run status: 2/2 energies solved"), "stdout: {stdout}");

    for name in [
        "run_parameters.json",
        "run_summary.json",
        "u_matrix_JP_1_1.dat",
        "u_matrix_JP_1_-1.dat",
    ] {
        assert!(output_dir.join(name).is_file(), "{name} should be written");
    }
    let parameters: Value = serde_json::from_str(
        &fs::read_to_string(output_dir.join("run_parameters.json")).expect("readable"),
    )
    .expect("run parameters should be JSON");
    assert_eq!(parameters["j2Max"], Value::from(0));
    assert_eq!(parameters["potential"]["model"], "yamaguchi");

    let table = fs::read_to_string(output_dir.join("u_matrix_JP_1_1.dat")).expect("readable");
    let row = table
        .lines()
        .find(|line| !line.starts_with('#'))
        .expect("one solved row");
    let fields: Vec<f64> = row
        .split_whitespace()
        .map(|field| field.parse().expect("numeric field"))
        .collect();
    assert_eq!(fields.len(), 9);
    assert!((fields[1] - 1.0).abs() <= 1.0e-6);
    assert!(fields[5..].iter().all(|value| value.is_finite()));

    let second = tictac(&args);
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stdout).contains("exchange operator loaded"));
}
