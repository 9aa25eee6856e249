//! Runtime pipeline tunables
//!
//! [`PipelineConfig`] is created at session start from [`PipelineSettings`]
//! and then mutated only by the processing loop in response to commands.

use serde::{Deserialize, Serialize};

use super::defaults::{
    DEFAULT_BUFFER_SIZE, DEFAULT_FFT_WINDOW, FFT_WINDOW_SIZES, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE,
};
use super::{ConfigError, PipelineSettings};

// ============================================================================
// Buffer Size
// ============================================================================

/// Clamp a user-entered buffer size to the accepted range.
///
/// Out-of-range values are never rejected.
pub fn clamp_buffer_size(raw: i64) -> usize {
    let clamped = raw.clamp(MIN_BUFFER_SIZE as i64, MAX_BUFFER_SIZE as i64);
    usize::try_from(clamped).unwrap_or(MIN_BUFFER_SIZE)
}

// ============================================================================
// FFT Window Size
// ============================================================================

/// One of the supported FFT window sizes (a power of two, 16..=1024).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct FftWindowSize(usize);

impl FftWindowSize {
    pub fn new(size: usize) -> Option<Self> {
        FFT_WINDOW_SIZES.contains(&size).then_some(Self(size))
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// All selectable sizes, ascending.
    pub fn options() -> impl Iterator<Item = Self> {
        FFT_WINDOW_SIZES.into_iter().map(Self)
    }
}

impl Default for FftWindowSize {
    fn default() -> Self {
        Self(DEFAULT_FFT_WINDOW)
    }
}

impl TryFrom<usize> for FftWindowSize {
    type Error = ConfigError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size).ok_or(ConfigError::InvalidFftWindow(size))
    }
}

impl From<FftWindowSize> for usize {
    fn from(size: FftWindowSize) -> Self {
        size.0
    }
}

impl std::fmt::Display for FftWindowSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FftWindowSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let size: usize = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::Validation(vec![format!("'{s}' is not a window size")]))?;
        Self::try_from(size)
    }
}

// ============================================================================
// Pipeline Config
// ============================================================================

/// Process-wide tunables read by the pipeline on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Committed per-channel capacity, always within [64, 5000]
    pub buffer_size: usize,
    pub fft_window: FftWindowSize,
    pub is_paused: bool,
    pub fft_enabled: bool,
    /// A zoom selection is frozen for inspection
    pub zoom_hold: bool,
}

impl PipelineConfig {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            buffer_size: clamp_buffer_size(i64::try_from(settings.buffer_size).unwrap_or(i64::MAX)),
            fft_window: settings.fft_window,
            fft_enabled: settings.fft_enabled,
            ..Self::default()
        }
    }

    /// Paused either explicitly or by a zoom hold.
    pub const fn is_effectively_paused(&self) -> bool {
        self.is_paused || self.zoom_hold
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            fft_window: FftWindowSize::default(),
            is_paused: false,
            fft_enabled: true,
            zoom_hold: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_is_clamped_not_rejected() {
        assert_eq!(clamp_buffer_size(-5), 64);
        assert_eq!(clamp_buffer_size(0), 64);
        assert_eq!(clamp_buffer_size(64), 64);
        assert_eq!(clamp_buffer_size(1000), 1000);
        assert_eq!(clamp_buffer_size(5000), 5000);
        assert_eq!(clamp_buffer_size(1_000_000), 5000);
    }

    #[test]
    fn oversized_settings_clamp_to_the_upper_bound() {
        let settings = PipelineSettings {
            buffer_size: usize::MAX,
            ..PipelineSettings::default()
        };
        assert_eq!(PipelineConfig::from_settings(&settings).buffer_size, 5000);
    }

    #[test]
    fn only_listed_window_sizes_are_accepted() {
        assert_eq!(FftWindowSize::new(512).map(FftWindowSize::get), Some(512));
        assert!(FftWindowSize::new(100).is_none());
        assert!(FftWindowSize::new(2048).is_none());
        assert!(FftWindowSize::try_from(8).is_err());
        assert_eq!(FftWindowSize::options().count(), 7);
        assert!(FftWindowSize::options().all(|w| w.get().is_power_of_two()));
    }

    #[test]
    fn window_size_parses_from_text() {
        assert_eq!("1024".parse::<FftWindowSize>().unwrap().get(), 1024);
        assert!("abc".parse::<FftWindowSize>().is_err());
        assert!("1000".parse::<FftWindowSize>().is_err());
    }

    #[test]
    fn defaults_match_session_start() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_size, 525);
        assert_eq!(config.fft_window.get(), 256);
        assert!(config.fft_enabled);
        assert!(!config.is_effectively_paused());
    }
}
