/// Configuration loading tests
use indara_cli::{AppConfig, CliError};
use std::time::Duration;
use tempfile::TempDir;

/// Test values from a config file override the defaults
#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("indara.toml");
    std::fs::write(
        &path,
        r#"
[playback]
poll_interval_ms = 250
auto_skip_delay_ms = 2000
initial_volume = 0.5

[session]
file = "/tmp/indara-session.json"

[simulator]
track_secs = 90
"#,
    )
    .unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.playback.poll_interval, Duration::from_millis(250));
    assert_eq!(config.playback.auto_skip_delay, Duration::from_secs(2));
    assert_eq!(config.playback.initial_volume, 0.5);
    assert_eq!(config.playback.persist_interval, Duration::from_secs(5));
    assert_eq!(config.simulator.track_secs, 90);
    assert_eq!(config.simulator.load_latency_ms, 200);
    assert!(config.validate().is_ok());
}

/// Test a named config file must exist
#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();

    let result = AppConfig::load(Some(&temp_dir.path().join("absent.toml")));

    assert!(matches!(result, Err(CliError::Config(_))));
}

/// Test validation rejects values the engine cannot run with
#[test]
fn test_validation() {
    let mut config = AppConfig::default();
    assert!(config.validate().is_ok());

    config.playback.initial_volume = 1.5;
    assert!(matches!(config.validate(), Err(CliError::Playback(_))));

    let mut config = AppConfig::default();
    config.simulator.track_secs = 0;
    assert!(matches!(config.validate(), Err(CliError::Config(_))));
}
