use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cordon() -> Command {
    let mut cmd = Command::cargo_bin("cordon").unwrap();
    cmd.args(["--delay-min-ms", "0", "--delay-max-ms", "0"]);
    cmd
}

#[test]
fn test_adc_prints_one_line_per_worker() {
    cordon()
        .args(["adc", "--workers", "3", "--samples", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Worker 0 took 4 samples (value 0)"))
        .stdout(predicate::str::contains("Worker 2 took 4 samples (value 4)"))
        .stdout(predicate::str::contains("Device acquired"));
}

#[test]
fn test_telemetry_json_report() {
    let output = cordon()
        .args([
            "--json",
            "telemetry",
            "--workers",
            "4",
            "--links",
            "2",
            "--block-size",
            "3",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["links"], 2);
    assert_eq!(report["transmissions"].as_array().unwrap().len(), 4);
    assert_eq!(report["received"]["3"], serde_json::json!([6.0, 6.0, 6.0]));
    assert!(report["peak_links_in_use"].as_u64().unwrap() <= 2);
}

#[test]
fn test_buffer_accounts_for_every_item() {
    let output = cordon()
        .args([
            "--json",
            "buffer",
            "--capacity",
            "2",
            "--producers",
            "3",
            "--consumers",
            "1",
            "--iterations",
            "10",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let completed = |side: &str| -> u64 {
        report[side]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["completed"].as_u64().unwrap())
            .sum()
    };

    assert_eq!(completed("consumers"), 10);
    assert_eq!(
        completed("producers"),
        completed("consumers") + report["final_count"].as_u64().unwrap()
    );
}

#[test]
fn test_settings_file_is_applied() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cordon.toml");
    fs::write(
        &path,
        r#"
workers = 2
input_channels = 2
samples_per_worker = 5
"#,
    )
    .unwrap();

    cordon()
        .arg("--config")
        .arg(&path)
        .arg("adc")
        .assert()
        .success()
        .stdout(predicate::str::contains("Worker 1 took 5 samples (value 2)"))
        .stdout(predicate::str::contains("Worker 2").not());
}

#[test]
fn test_invalid_settings_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cordon.toml");
    fs::write(&path, "[coordinator]\npool_capacity = 0\n").unwrap();

    cordon()
        .arg("--config")
        .arg(&path)
        .arg("telemetry")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pool_capacity must be at least 1"));
}

#[test]
fn test_missing_settings_file_is_reported() {
    cordon()
        .args(["--config", "/nonexistent/cordon.toml", "adc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn test_too_few_input_channels_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cordon.toml");
    fs::write(&path, "workers = 4\ninput_channels = 2\n").unwrap();

    cordon()
        .arg("--config")
        .arg(&path)
        .arg("adc")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input channel"));
}
