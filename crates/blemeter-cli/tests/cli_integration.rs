//! CLI Integration Tests
//!
//! These tests run the built binary. Anything that needs a Bluetooth
//! adapter and live meters is marked with #[ignore].
//!
//! Run hardware tests:
//! ```
//! cargo test --package blemeter-cli --test cli_integration -- --ignored --nocapture
//! ```

use std::fs;
use std::process::{Command, Output};

fn run_blemeter(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_blemeter"))
        .args(args)
        .output()
        .expect("Failed to run blemeter binary")
}

// =============================================================================
// Help and Version Tests (no hardware required)
// =============================================================================

#[test]
fn test_help_command() {
    let output = run_blemeter(&["--help"]);
    assert!(output.status.success(), "Help should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scan"), "Help should list scan command");
    assert!(stdout.contains("models"), "Help should list models command");
    assert!(stdout.contains("log"), "Help should list log command");
    assert!(
        stdout.contains("auto power off"),
        "Help should explain disabling auto power off"
    );
}

#[test]
fn test_version_command() {
    let output = run_blemeter(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("blemeter"));
}

#[test]
fn test_models_command() {
    let output = run_blemeter(&["models"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("TP357"));
    assert!(stdout.contains("ZT300AB"), "Aliases should be listed");
}

// =============================================================================
// Log argument validation (fails before touching Bluetooth)
// =============================================================================

#[test]
fn test_log_rejects_unknown_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("meters.toml");
    fs::write(&config, "[[meter]]\naddress = \"AA:BB\"\nmodel = \"XYZ123\"\n").unwrap();

    let output = run_blemeter(&["log", "--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("XYZ123"));
}

#[test]
fn test_log_rejects_config_without_meters() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("meters.toml");
    fs::write(&config, "mode = \"live\"\n").unwrap();

    let output = run_blemeter(&["log", "--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No meters configured"));
}

#[test]
fn test_log_rejects_keyboard_meter_without_unit() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("meters.toml");
    fs::write(
        &config,
        "mode = \"summary\"\n[[meter]]\nalias = \"room\"\nmodel = \"keyboard\"\n",
    )
    .unwrap();

    let output = run_blemeter(&["log", "--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("needs a unit"));
}

#[test]
fn test_log_needs_a_bluetooth_meter() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("meters.toml");
    fs::write(
        &config,
        "mode = \"summary\"\n[[meter]]\nalias = \"room\"\nmodel = \"keyboard\"\nunit = \"celsius\"\n",
    )
    .unwrap();

    let output = run_blemeter(&["log", "--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No meters configured"));
}

#[test]
fn test_log_refuses_to_overwrite_output() {
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("log.tsv");
    fs::write(&existing, "keep me").unwrap();

    let output = run_blemeter(&["log", "--output", existing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("refusing to overwrite"));
    assert_eq!(fs::read_to_string(&existing).unwrap(), "keep me");
}

#[test]
fn test_log_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let output = run_blemeter(&["log", "--config", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config"));
}

#[test]
fn test_log_rejects_unknown_format() {
    let output = run_blemeter(&["log", "--format", "xml"]);
    assert!(!output.status.success());
}

// =============================================================================
// Hardware tests
// =============================================================================

#[test]
#[ignore = "requires BLE hardware"]
fn test_scan_command() {
    let output = run_blemeter(&["scan", "--timeout", "5"]);
    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}
