//! Processing Pipeline Module
//!
//! ```text
//! LineSource ──lines──► ProcessingLoop ──► PipelineCoordinator
//!                           ▲      │          ├─ SeriesBufferManager
//!            PipelineHandle─┘      │          ├─ SpectralAnalyzer
//!              (commands)          │          └─ DiagnosticLog
//!                                  ▼
//!                     ArcSwap<PipelineSnapshot> ──► readers
//! ```
//!
//! One task owns all mutable state. Paused lines are still drained from the
//! source but discarded. FFT recomputes are sampled (shed, never queued);
//! buffer resizes are debounced.

mod command;
mod coordinator;
mod governor;
mod handle;
pub mod processing_loop;
mod state;

pub use command::{CommandParseError, PipelineCommand};
pub use coordinator::{LineOutcome, PipelineCoordinator};
pub use governor::{Debouncer, Sampler};
pub use handle::PipelineHandle;
pub use processing_loop::ProcessingLoop;
pub use state::*;

use thiserror::Error;

use crate::acquisition::SourceError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline is not running")]
    Closed,

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}
