//! Config File Tests
//!
//! Loads TOML files from a temporary directory and checks defaults,
//! clamping and rejection of unusable values.

use std::path::PathBuf;
use tempfile::TempDir;

use linescope::acquisition::EmulationMode;
use linescope::config::{AppConfig, ConfigError, FftWindowSize};

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("linescope.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn partial_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[pipeline]
fft_window = 512
"#,
    );

    let config = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(config.pipeline.fft_window.get(), 512);
    assert_eq!(config.pipeline.buffer_size, 525);
    assert!(config.pipeline.fft_enabled);
    assert_eq!(config.source.emulation, EmulationMode::SquareWave);
}

#[test]
fn buffer_size_is_clamped_on_load() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[pipeline]
buffer_size = 100000
"#,
    );

    let config = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(config.pipeline.buffer_size, 5_000);
}

#[test]
fn unsupported_fft_window_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[pipeline]
fft_window = 500
"#,
    );

    let err = AppConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)), "got {err}");
}

#[test]
fn source_section_is_read() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[source]
emulation = "multi-series-independent-x"
polling_hz = 100.0
seed = 7
"#,
    );

    let config = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(config.source.emulation, EmulationMode::MultiSeriesIndependentX);
    assert!((config.source.polling_hz - 100.0).abs() < f64::EPSILON);
    assert_eq!(config.source.seed, Some(7));
}

#[test]
fn invalid_values_are_listed_together() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[source]
polling_hz = -1.0

[pipeline]
log_capacity = 0
peak_count = 0
"#,
    );

    match AppConfig::load_from_file(&path).unwrap_err() {
        ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = AppConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io(ref p, _) if p == &path));
}

#[test]
fn saved_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("saved.toml");

    let mut config = AppConfig::default();
    config.pipeline.fft_window = FftWindowSize::new(64).unwrap();
    config.pipeline.fft_enabled = false;
    config.save_to_file(&path).unwrap();

    assert_eq!(AppConfig::load_from_file(&path).unwrap(), config);
}

#[test]
fn peak_count_above_five_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[pipeline]
peak_count = 20
"#,
    );

    match AppConfig::load_from_file(&path).unwrap_err() {
        ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
        other => panic!("unexpected error: {other}"),
    }
}
