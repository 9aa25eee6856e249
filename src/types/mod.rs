//! Shared data structures for the streaming sample pipeline
//!
//! This module defines the values that flow between components:
//! - Acquisition: raw text lines from a [`LineSource`](crate::acquisition::LineSource)
//! - Parsing: [`Sample`] (one decoded reading, optional explicit X)
//! - Buffering: [`Point`] (one committed `(x, y)` pair in a rolling buffer)
//! - Analysis: [`SpectrumResult`] (magnitude spectrum + peaks for one channel)
//! - Control: [`SelectionRect`] (zoom selection in data space)

mod sample;
mod spectrum;
mod selection;

pub use sample::*;
pub use spectrum::*;
pub use selection::*;
