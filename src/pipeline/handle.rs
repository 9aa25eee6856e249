//! Cloneable control handle for a running [`ProcessingLoop`](super::ProcessingLoop).

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::command::PipelineCommand;
use super::state::PipelineSnapshot;
use super::PipelineError;
use crate::config::FftWindowSize;
use crate::types::SelectionRect;

/// Sends commands to the processing loop and reads its published snapshot.
///
/// Commands are queued in order; [`flush`](Self::flush) waits until
/// everything sent before it has been applied and published.
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<PipelineCommand>,
    snapshot: Arc<ArcSwap<PipelineSnapshot>>,
}

impl PipelineHandle {
    pub(super) fn new(commands: mpsc::Sender<PipelineCommand>, snapshot: Arc<ArcSwap<PipelineSnapshot>>) -> Self {
        Self { commands, snapshot }
    }

    /// Latest published snapshot. Never blocks the processing loop.
    pub fn snapshot(&self) -> Arc<PipelineSnapshot> {
        self.snapshot.load_full()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub async fn send(&self, command: PipelineCommand) -> Result<(), PipelineError> {
        self.commands.send(command).await.map_err(|_| PipelineError::Closed)
    }

    pub async fn pause(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::Resume).await
    }

    pub async fn toggle_pause(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::TogglePause).await
    }

    pub async fn set_fft_enabled(&self, enabled: bool) -> Result<(), PipelineError> {
        self.send(PipelineCommand::SetFftEnabled(enabled)).await
    }

    pub async fn set_fft_window(&self, window: FftWindowSize) -> Result<(), PipelineError> {
        self.send(PipelineCommand::SetFftWindow(window)).await
    }

    /// Out-of-range sizes are clamped; the change lands after the debounce.
    pub async fn set_buffer_size(&self, size: i64) -> Result<(), PipelineError> {
        self.send(PipelineCommand::SetBufferSize(size)).await
    }

    pub async fn select_region(&self, rect: SelectionRect) -> Result<(), PipelineError> {
        self.send(PipelineCommand::SelectRegion(rect)).await
    }

    pub async fn reset_selection(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::ResetSelection).await
    }

    pub async fn clear_points(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::ClearPoints).await
    }

    /// Send `text` to the source and wait for the outcome.
    pub async fn post(&self, text: impl Into<String>) -> Result<(), PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.send(PipelineCommand::Post {
            text: text.into(),
            reply: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| PipelineError::Closed)?.map_err(PipelineError::Source)
    }

    /// Wait until all earlier commands and queued lines are processed and
    /// the result is published.
    pub async fn flush(&self) -> Result<Arc<PipelineSnapshot>, PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.send(PipelineCommand::Flush(tx)).await?;
        rx.await.map_err(|_| PipelineError::Closed)?;
        Ok(self.snapshot())
    }

    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::Shutdown).await
    }
}
