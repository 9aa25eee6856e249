//! FFT computation using rustfft
//!
//! Windowed magnitude spectrum and peak extraction for one channel buffer.
//!
//! # Padding rule
//!
//! The FFT length is always the configured window size `N` (a power of two).
//! With `n` buffered points, `effective = min(n, N)` and the `effective - 1`
//! most recent Y values fill the front of the input; the remainder is zero.
//! The oldest point of a full window is left out of the transform.
//!
//! # Scaling
//!
//! One-sided magnitudes: `|X[k]| / N` for DC and Nyquist, `2 |X[k]| / N`
//! otherwise. Bins `0..=N/2` are returned; bin `k` sits at
//! `k / (N * sample_interval)` Hz.

use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use super::ProcessingError;
use crate::config::defaults::{DEFAULT_PEAK_COUNT, FALLBACK_SAMPLE_INTERVAL, MIN_POINTS_FOR_SPECTRUM};
use crate::config::FftWindowSize;
use crate::types::{Point, SpectrumResult};

// ============================================================================
// Helpers
// ============================================================================

/// Seconds per sample across the whole buffer span.
///
/// Falls back to [`FALLBACK_SAMPLE_INTERVAL`] when the X range collapses.
pub fn sample_interval(points: &[Point]) -> f64 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return FALLBACK_SAMPLE_INTERVAL;
    };
    let interval = (last.x - first.x) / points.len() as f64;
    if interval.is_finite() && interval > 0.0 {
        interval
    } else {
        FALLBACK_SAMPLE_INTERVAL
    }
}

/// Local maxima over the interior bins, strongest first, at most `n_peaks`.
pub fn find_peaks(frequencies: &[f64], magnitudes: &[f64], n_peaks: usize) -> Vec<Point> {
    if magnitudes.len() < 3 {
        return Vec::new();
    }

    let mut peaks: Vec<Point> = magnitudes
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2])
        .map(|(i, w)| Point::new(frequencies[i + 1], w[1]))
        .collect();

    // Stable sort keeps equal peaks in frequency order.
    peaks.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));
    peaks.truncate(n_peaks);
    peaks
}

// ============================================================================
// FFT Processor (pre-planned for repeated use)
// ============================================================================

/// Forward FFT planned once for a fixed length.
pub struct FftProcessor {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftProcessor {
    /// Plan a transform of `size` points; `size` must be a power of two.
    pub fn new(size: usize) -> Result<Self, ProcessingError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(ProcessingError::InvalidWindowSize(size));
        }
        let mut planner = FftPlanner::new();
        Ok(Self {
            fft: planner.plan_fft_forward(size),
            size,
        })
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    /// Magnitude spectrum of `values`, zero-padded (or truncated) to the
    /// planned size. Returns `(frequencies, magnitudes)` for bins `0..=N/2`.
    pub fn magnitude_spectrum(&self, values: &[f64], sample_interval: f64) -> (Vec<f64>, Vec<f64>) {
        let n = self.size;
        let mut buffer: Vec<Complex<f64>> = values
            .iter()
            .take(n)
            .map(|&v| Complex::new(v, 0.0))
            .collect();
        buffer.resize(n, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        let n_positive = n / 2 + 1;
        let resolution = 1.0 / (n as f64 * sample_interval);
        let frequencies = (0..n_positive).map(|k| k as f64 * resolution).collect();
        let magnitudes = buffer
            .iter()
            .take(n_positive)
            .enumerate()
            .map(|(k, c)| {
                let scale = if k == 0 || k == n_positive - 1 {
                    1.0 / n as f64
                } else {
                    2.0 / n as f64
                };
                c.norm() * scale
            })
            .collect();

        (frequencies, magnitudes)
    }
}

// ============================================================================
// Spectral Analyzer
// ============================================================================

/// Computes [`SpectrumResult`]s with one pre-planned FFT per window size.
///
/// Plans are immutable and shared, so channels are analysed in parallel.
pub struct SpectralAnalyzer {
    processors: Vec<FftProcessor>,
    peak_count: usize,
}

impl SpectralAnalyzer {
    /// `peak_count` is capped at [`DEFAULT_PEAK_COUNT`].
    pub fn new(peak_count: usize) -> Self {
        let processors = FftWindowSize::options()
            .filter_map(|w| FftProcessor::new(w.get()).ok())
            .collect();
        Self {
            processors,
            peak_count: peak_count.min(DEFAULT_PEAK_COUNT),
        }
    }

    pub const fn peak_count(&self) -> usize {
        self.peak_count
    }

    fn processor(&self, window: FftWindowSize) -> Option<&FftProcessor> {
        self.processors.iter().find(|p| p.size() == window.get())
    }

    /// Spectrum of one channel buffer (oldest point first).
    ///
    /// Buffers of [`MIN_POINTS_FOR_SPECTRUM`] points or fewer give an empty
    /// result. Output depends only on the inputs.
    pub fn analyze(&self, points: &[Point], window: FftWindowSize) -> SpectrumResult {
        if points.len() <= MIN_POINTS_FOR_SPECTRUM {
            return SpectrumResult::empty();
        }
        let Some(processor) = self.processor(window) else {
            tracing::warn!("[SpectralAnalyzer] No FFT plan for window {}", window);
            return SpectrumResult::empty();
        };

        let effective = points.len().min(window.get());
        let start = points.len() - (effective - 1);
        let values: Vec<f64> = points[start..].iter().map(|p| p.y).collect();

        let interval = sample_interval(points);
        let (frequencies, magnitudes) = processor.magnitude_spectrum(&values, interval);
        let peaks = find_peaks(&frequencies, &magnitudes, self.peak_count);

        SpectrumResult {
            frequencies,
            magnitudes,
            peaks,
            sample_interval: interval,
            fft_size: processor.size(),
        }
    }

    /// Analyse every channel in parallel; output order matches input order.
    pub fn analyze_all(&self, channels: &[Vec<Point>], window: FftWindowSize) -> Vec<SpectrumResult> {
        channels
            .par_iter()
            .map(|points| self.analyze(points, window))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn window(n: usize) -> FftWindowSize {
        FftWindowSize::new(n).unwrap()
    }

    fn sine(n: usize, freq: f64, dt: f64) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let t = i as f64 * dt;
                Point::new(t, (2.0 * PI * freq * t).sin())
            })
            .collect()
    }

    #[test]
    fn short_buffers_give_empty_results() {
        let analyzer = SpectralAnalyzer::new(5);
        for n in 0..=4 {
            let result = analyzer.analyze(&sine(n, 1.0, 0.01), window(256));
            assert!(result.is_empty());
            assert!(result.magnitudes.is_empty());
            assert!(result.peaks.is_empty());
        }
        assert!(!analyzer.analyze(&sine(5, 1.0, 0.01), window(16)).is_empty());
    }

    #[test]
    fn fft_length_is_the_window_size() {
        let analyzer = SpectralAnalyzer::new(5);
        let result = analyzer.analyze(&sine(40, 1.0, 0.01), window(64));
        assert_eq!(result.fft_size, 64);
        assert_eq!(result.frequencies.len(), 33);
        assert_eq!(result.magnitudes.len(), 33);
        assert_eq!(result.frequencies[0], 0.0);
    }

    #[test]
    fn sample_interval_spans_whole_buffer() {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(2.0, 0.0), Point::new(4.0, 0.0)];
        assert_eq!(sample_interval(&points), 1.0);

        let collapsed = vec![Point::new(3.0, 1.0); 10];
        assert_eq!(sample_interval(&collapsed), FALLBACK_SAMPLE_INTERVAL);
        assert_eq!(sample_interval(&[]), FALLBACK_SAMPLE_INTERVAL);
    }

    #[test]
    fn sine_peak_lands_near_its_frequency() {
        let analyzer = SpectralAnalyzer::new(5);
        // 10 Hz tone sampled at 200 Hz.
        let points = sine(1024, 10.0, 0.005);
        let result = analyzer.analyze(&points, window(1024));
        let dominant = result.dominant().unwrap();
        let resolution = result.frequencies[1];
        assert!(
            (dominant.x - 10.0).abs() <= 2.0 * resolution,
            "peak at {} Hz",
            dominant.x
        );
    }

    #[test]
    fn peaks_are_sorted_and_bounded() {
        let analyzer = SpectralAnalyzer::new(5);
        let points: Vec<Point> = (0..512)
            .map(|i| {
                let t = i as f64 * 0.01;
                let y = (2.0 * PI * 3.0 * t).sin()
                    + 0.5 * (2.0 * PI * 11.0 * t).sin()
                    + 0.25 * (2.0 * PI * 23.0 * t).sin()
                    + 0.1 * ((i * 7919) % 13) as f64;
                Point::new(t, y)
            })
            .collect();
        let result = analyzer.analyze(&points, window(512));
        assert!(!result.peaks.is_empty());
        assert!(result.peaks.len() <= 5);
        assert!(result.peaks.windows(2).all(|w| w[0].y >= w[1].y));
    }

    #[test]
    fn requested_peak_count_is_capped() {
        let analyzer = SpectralAnalyzer::new(20);
        assert_eq!(analyzer.peak_count(), DEFAULT_PEAK_COUNT);

        let points: Vec<Point> = (0..1024)
            .map(|i| {
                let t = i as f64 * 0.005;
                Point::new(t, (2.0 * PI * 7.0 * t).sin() + 0.2 * ((i * 7919) % 17) as f64)
            })
            .collect();
        let result = analyzer.analyze(&points, window(1024));
        assert!(!result.peaks.is_empty());
        assert!(result.peaks.len() <= DEFAULT_PEAK_COUNT);
    }

    #[test]
    fn analysis_is_idempotent() {
        let analyzer = SpectralAnalyzer::new(5);
        let points = sine(300, 4.0, 0.01);
        let first = analyzer.analyze(&points, window(256));
        let second = analyzer.analyze(&points, window(256));
        assert_eq!(first, second);
    }

    #[test]
    fn parallel_analysis_matches_sequential() {
        let analyzer = SpectralAnalyzer::new(5);
        let channels = vec![sine(100, 2.0, 0.01), sine(3, 1.0, 0.01), sine(200, 5.0, 0.01)];
        let all = analyzer.analyze_all(&channels, window(128));
        assert_eq!(all.len(), 3);
        assert!(all[1].is_empty());
        assert_eq!(all[2], analyzer.analyze(&channels[2], window(128)));
    }

    #[test]
    fn find_peaks_only_reports_interior_local_maxima() {
        let freqs: Vec<f64> = (0..8).map(f64::from).collect();
        let mags = vec![9.0, 1.0, 3.0, 2.0, 2.0, 5.0, 4.0, 8.0];
        let peaks = find_peaks(&freqs, &mags, 5);
        assert_eq!(peaks, vec![Point::new(5.0, 5.0), Point::new(2.0, 3.0)]);
    }

    #[test]
    fn processor_rejects_non_power_of_two() {
        assert!(matches!(
            FftProcessor::new(100),
            Err(ProcessingError::InvalidWindowSize(100))
        ));
        assert_eq!(FftProcessor::new(64).unwrap().size(), 64);
    }
}
