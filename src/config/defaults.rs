//! System-wide default constants.
//!
//! Centralises magic numbers used across the pipeline.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Series Buffers
// ============================================================================

/// Smallest accepted per-channel buffer size (points).
pub const MIN_BUFFER_SIZE: usize = 64;

/// Largest accepted per-channel buffer size (points).
pub const MAX_BUFFER_SIZE: usize = 5_000;

/// Buffer size at session start (points).
pub const DEFAULT_BUFFER_SIZE: usize = 525;

/// Quiet period before a buffer-size edit is applied (ms).
pub const RESIZE_DEBOUNCE_MS: u64 = 1_000;

// ============================================================================
// Spectral Analysis
// ============================================================================

/// FFT window sizes offered to the user.
pub const FFT_WINDOW_SIZES: [usize; 7] = [16, 32, 64, 128, 256, 512, 1024];

/// FFT window size at session start.
pub const DEFAULT_FFT_WINDOW: usize = 256;

/// Buffers with this many points or fewer are not analysed.
pub const MIN_POINTS_FOR_SPECTRUM: usize = 4;

/// Sample interval used when the X span of a buffer collapses (seconds).
pub const FALLBACK_SAMPLE_INTERVAL: f64 = 0.01;

/// Maximum number of spectral peaks reported per channel.
pub const DEFAULT_PEAK_COUNT: usize = 5;

/// Cadence of the stream-sampled FFT trigger (ms).
pub const FFT_SAMPLE_INTERVAL_MS: u64 = 1_000;

// ============================================================================
// Pipeline
// ============================================================================

/// Cadence of the throughput counter (ms).
pub const STATS_INTERVAL_MS: u64 = 500;

/// Cadence at which buffer contents are published to readers (ms).
pub const PUBLISH_INTERVAL_MS: u64 = 50;

/// Diagnostic log entries retained in memory.
pub const LOG_CAPACITY: usize = 10_000;

/// Capacity of the command channel between handles and the loop.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Emulated Source
// ============================================================================

/// Requested line rate of the emulated source (Hz).
pub const EMULATION_POLLING_HZ: f64 = 200.0;

/// Highest timer rate; faster polling emits several lines per tick (Hz).
pub const EMULATION_CUTOFF_HZ: f64 = 50.0;

/// Accepted range for the emulated polling rate and the timer cutoff (Hz).
pub const MIN_EMULATION_RATE_HZ: f64 = 0.1;
pub const MAX_EMULATION_RATE_HZ: f64 = 100_000.0;

/// Frequency of the emulated square, sine and pulse waves (Hz).
pub const WAVE_FREQUENCY_HZ: f64 = 1.0;

/// Frequency of the emulated sawtooth (Hz).
pub const RAMP_FREQUENCY_HZ: f64 = 0.5;

/// Fraction of each period the emulated pulse is high.
pub const PULSE_DUTY_CYCLE: f64 = 0.1;

/// Standard deviation of the noise added to the emulated ramp.
pub const NOISE_STD_DEV: f64 = 0.05;

// ============================================================================
// Network Source
// ============================================================================

/// TCP connect timeout (seconds).
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 10;
