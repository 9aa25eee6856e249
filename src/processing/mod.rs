//! Signal processing module - windowed FFT spectra and peak extraction

mod fft;

pub use fft::*;

use thiserror::Error;

/// Errors in signal processing
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Invalid FFT window size: {0} (must be a power of two >= 2)")]
    InvalidWindowSize(usize),
}
