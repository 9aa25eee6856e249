//! Application Configuration - source and pipeline settings as TOML values
//!
//! Every tunable is a field in this module. Each struct implements `Default`
//! with the built-in constants from [`defaults`](super::defaults), so a
//! missing or partial file behaves exactly like no file at all.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::defaults::{
    DEFAULT_BUFFER_SIZE, DEFAULT_PEAK_COUNT, EMULATION_CUTOFF_HZ, EMULATION_POLLING_HZ,
    FFT_SAMPLE_INTERVAL_MS, MAX_EMULATION_RATE_HZ, MIN_EMULATION_RATE_HZ, LOG_CAPACITY, PUBLISH_INTERVAL_MS, RESIZE_DEBOUNCE_MS,
    STATS_INTERVAL_MS,
};
use super::{clamp_buffer_size, FftWindowSize};
use crate::acquisition::EmulationMode;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "LINESCOPE_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "linescope.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with [`AppConfig::load()`] which searches:
/// 1. `$LINESCOPE_CONFIG`
/// 2. `./linescope.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl AppConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that fails to load is logged and skipped.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        config.normalize();
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }

    /// Reject values that cannot be clamped into something meaningful.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let rates = MIN_EMULATION_RATE_HZ..=MAX_EMULATION_RATE_HZ;
        for (name, value) in [
            ("source.polling_hz", self.source.polling_hz),
            ("source.cutoff_hz", self.source.cutoff_hz),
        ] {
            if !rates.contains(&value) {
                errors.push(format!(
                    "{name} must be within {MIN_EMULATION_RATE_HZ}..={MAX_EMULATION_RATE_HZ} Hz (got {value})"
                ));
            }
        }

        let p = &self.pipeline;
        for (name, value) in [
            ("pipeline.resize_debounce_ms", p.resize_debounce_ms),
            ("pipeline.fft_sample_interval_ms", p.fft_sample_interval_ms),
            ("pipeline.stats_interval_ms", p.stats_interval_ms),
            ("pipeline.publish_interval_ms", p.publish_interval_ms),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }
        if p.log_capacity == 0 {
            errors.push("pipeline.log_capacity must be > 0".to_string());
        }
        if !(1..=DEFAULT_PEAK_COUNT).contains(&p.peak_count) {
            errors.push(format!(
                "pipeline.peak_count must be within 1..={DEFAULT_PEAK_COUNT} (got {})",
                p.peak_count
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Silently bring clampable values into range.
    pub fn normalize(&mut self) {
        let clamped = clamp_buffer_size(i64::try_from(self.pipeline.buffer_size).unwrap_or(i64::MAX));
        if clamped != self.pipeline.buffer_size {
            debug!(
                requested = self.pipeline.buffer_size,
                clamped, "pipeline.buffer_size clamped"
            );
            self.pipeline.buffer_size = clamped;
        }
    }
}

// ============================================================================
// Source Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Waveform of the emulated source
    pub emulation: EmulationMode,
    /// Requested emulated line rate (Hz)
    pub polling_hz: f64,
    /// Highest timer rate (Hz)
    pub cutoff_hz: f64,
    /// Seed for noisy waveforms; random when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            emulation: EmulationMode::default(),
            polling_hz: EMULATION_POLLING_HZ,
            cutoff_hz: EMULATION_CUTOFF_HZ,
            seed: None,
        }
    }
}

// ============================================================================
// Pipeline Settings
// ============================================================================

/// Session-start values and timing of the processing loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub buffer_size: usize,
    pub fft_window: FftWindowSize,
    pub fft_enabled: bool,
    /// Quiet period before a buffer-size edit is applied
    pub resize_debounce_ms: u64,
    /// Cadence of the stream-sampled FFT trigger
    pub fft_sample_interval_ms: u64,
    /// Cadence of the throughput counter
    pub stats_interval_ms: u64,
    /// Cadence of snapshot publication
    pub publish_interval_ms: u64,
    pub log_capacity: usize,
    pub peak_count: usize,
}

impl PipelineSettings {
    pub const fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub const fn fft_sample_interval(&self) -> Duration {
        Duration::from_millis(self.fft_sample_interval_ms)
    }

    pub const fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    pub const fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            fft_window: FftWindowSize::default(),
            fft_enabled: true,
            resize_debounce_ms: RESIZE_DEBOUNCE_MS,
            fft_sample_interval_ms: FFT_SAMPLE_INTERVAL_MS,
            stats_interval_ms: STATS_INTERVAL_MS,
            publish_interval_ms: PUBLISH_INTERVAL_MS,
            log_capacity: LOG_CAPACITY,
            peak_count: DEFAULT_PEAK_COUNT,
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unsupported FFT window size {0} (expected one of 16, 32, 64, 128, 256, 512, 1024)")]
    InvalidFftWindow(usize),
}
