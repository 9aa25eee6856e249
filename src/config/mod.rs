//! Configuration Module
//!
//! Session configuration loaded from TOML, plus the runtime
//! [`PipelineConfig`] the processing loop mutates in response to commands.
//!
//! ## Loading Order
//!
//! 1. `LINESCOPE_CONFIG` environment variable (path to TOML file)
//! 2. `linescope.toml` in the current working directory
//! 3. Built-in defaults from [`defaults`]
//!
//! Command-line flags are applied on top of whichever of these wins.

mod app_config;
pub mod defaults;
mod pipeline_config;

pub use app_config::{
    AppConfig, ConfigError, PipelineSettings, SourceConfig, CONFIG_ENV_VAR, LOCAL_CONFIG_FILE,
};
pub use pipeline_config::{clamp_buffer_size, FftWindowSize, PipelineConfig};
