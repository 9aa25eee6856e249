//! linescope: Streaming Telemetry Plotter Core
//!
//! Reads newline-delimited numeric telemetry, keeps a rolling window per
//! channel and computes magnitude spectra with peak detection, all under a
//! single pipeline task that owns the state.
//!
//! ## Architecture
//!
//! - **Acquisition**: Line sources (emulated, stdin, TCP, replay) and the line parser
//! - **Series**: Fixed-capacity rolling buffers, one per channel
//! - **Processing**: FFT magnitude spectra and peak detection
//! - **Pipeline**: Processing loop, pause/zoom state, debounced resize, sampled FFT trigger
//! - **Config**: TOML configuration with defaults and validation

pub mod acquisition;
pub mod config;
pub mod pipeline;
pub mod processing;
pub mod series;
pub mod types;

// Re-export the source contract and parser
pub use acquisition::{
    parse_line, EmulatedSource, EmulationMode, LineSource, LineStream, ReplaySource, SourceError,
    StdinSource, TcpSource,
};

// Re-export configuration
pub use config::{AppConfig, FftWindowSize, PipelineConfig, PipelineSettings};

// Re-export pipeline control
pub use pipeline::{
    PipelineCommand, PipelineError, PipelineHandle, PipelineSnapshot, PipelineState, PipelineStats,
    ProcessingLoop,
};

pub use processing::SpectralAnalyzer;
pub use series::SeriesBufferManager;
pub use types::{Point, Sample, SelectionRect, SpectrumResult};
