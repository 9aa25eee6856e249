//! Spectral analysis result

use serde::{Deserialize, Serialize};

use super::Point;

/// Magnitude spectrum of one channel.
///
/// Derived from a buffer snapshot and replaced wholesale on every
/// recompute. `peaks` holds at most the configured peak count, sorted by
/// magnitude descending (`x` = frequency, `y` = magnitude).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumResult {
    /// Frequency of each bin (Hz, non-negative)
    pub frequencies: Vec<f64>,
    /// Magnitude of each bin (one-sided scaling)
    pub magnitudes: Vec<f64>,
    /// Local maxima, strongest first
    pub peaks: Vec<Point>,
    /// Sample interval used to build the frequency axis (seconds per sample)
    pub sample_interval: f64,
    /// FFT length (power of two); 0 for an empty result
    pub fft_size: usize,
}

impl SpectrumResult {
    /// Result for a buffer too short to analyse.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Spectrum as plottable `(frequency, magnitude)` points.
    pub fn points(&self) -> Vec<Point> {
        self.frequencies
            .iter()
            .zip(&self.magnitudes)
            .map(|(&f, &m)| Point::new(f, m))
            .collect()
    }

    /// Strongest peak, if any.
    pub fn dominant(&self) -> Option<Point> {
        self.peaks.first().copied()
    }
}
