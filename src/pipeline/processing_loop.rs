//! Processing loop - the single task that owns the pipeline.
//!
//! Selects over cancellation, the command channel, the resize debounce
//! deadline, the FFT sampling tick, the stats tick, the publish tick, the
//! source's open flag and the line stream. All pipeline data lives in the
//! [`PipelineCoordinator`]; readers see it only through snapshots swapped
//! into an [`ArcSwap`].

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::PipelineCommand;
use super::coordinator::{LineOutcome, PipelineCoordinator};
use super::governor::Sampler;
use super::handle::PipelineHandle;
use super::state::{PipelineSnapshot, PipelineStats};
use crate::acquisition::{LineSource, LineStream, SourceError};
use crate::config::defaults::COMMAND_CHANNEL_CAPACITY;
use crate::config::PipelineSettings;

/// Owns everything needed to run the pipeline.
///
/// Built with [`new()`](ProcessingLoop::new), which also returns the
/// [`PipelineHandle`] used to control it, then consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    coordinator: PipelineCoordinator,
    settings: PipelineSettings,
    commands: mpsc::Receiver<PipelineCommand>,
    published: Arc<ArcSwap<PipelineSnapshot>>,
    cancel_token: CancellationToken,
    exit_on_close: bool,
    sampler: Sampler,
}

enum Flow {
    Continue,
    Stop,
}

impl ProcessingLoop {
    pub fn new(settings: &PipelineSettings, cancel_token: CancellationToken) -> (Self, PipelineHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let mut coordinator = PipelineCoordinator::new(settings);
        let published = Arc::new(ArcSwap::from_pointee(coordinator.snapshot(false)));
        let handle = PipelineHandle::new(tx, Arc::clone(&published));

        let processing_loop = Self {
            coordinator,
            settings: settings.clone(),
            commands: rx,
            published,
            cancel_token,
            exit_on_close: false,
            sampler: Sampler::default(),
        };
        (processing_loop, handle)
    }

    /// Stop once the source reports itself closed (end of stdin, replay
    /// finished, peer hung up), after draining lines already queued.
    #[must_use]
    pub const fn with_exit_on_close(mut self, exit_on_close: bool) -> Self {
        self.exit_on_close = exit_on_close;
        self
    }

    /// Open `source` and process its lines until shutdown or cancellation.
    ///
    /// Only a failure to open the source is returned as an error. The
    /// source is closed on the way out. Returns final statistics.
    pub async fn run<S: LineSource + ?Sized>(mut self, source: &mut S) -> Result<PipelineStats, SourceError> {
        let mut stream = source.subscribe();
        let mut open_rx = source.watch_open();
        source.open().await?;

        info!(
            "[ProcessingLoop] Processing lines from {} (buffer {}, FFT window {})",
            source.source_name(),
            self.coordinator.config().buffer_size,
            self.coordinator.config().fft_window
        );
        self.publish(source.is_open());

        let mut fft_tick = ticker(self.settings.fft_sample_interval(), MissedTickBehavior::Skip);
        let mut stats_tick = ticker(self.settings.stats_interval(), MissedTickBehavior::Skip);
        let mut publish_tick = ticker(self.settings.publish_interval(), MissedTickBehavior::Skip);
        let mut commands_open = true;
        let mut open_alive = true;

        loop {
            let resize_deadline = self.coordinator.resize_deadline();

            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }

                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        self.drain_queued(&mut stream);
                        if let Flow::Stop = self.apply_command(command, source).await {
                            break;
                        }
                        self.publish(source.is_open());
                    }
                    None => {
                        debug!("[ProcessingLoop] All handles dropped");
                        commands_open = false;
                    }
                },

                () = sleep_until(resize_deadline.unwrap_or_else(Instant::now)), if resize_deadline.is_some() => {
                    self.coordinator.apply_pending_resize(Instant::now());
                }

                _ = fft_tick.tick() => {
                    // Disabling FFT after the line arrived still wins.
                    if self.sampler.take() && self.coordinator.config().fft_enabled {
                        self.coordinator.recompute_spectra();
                    }
                }

                _ = stats_tick.tick() => {
                    self.coordinator.tick_stats(self.settings.stats_interval());
                }

                _ = publish_tick.tick() => {
                    if self.coordinator.take_dirty() {
                        self.publish(source.is_open());
                    }
                }

                changed = open_rx.changed(), if open_alive => {
                    if changed.is_err() {
                        open_alive = false;
                        continue;
                    }
                    let is_open = *open_rx.borrow_and_update();
                    info!(
                        "[ProcessingLoop] Source {} is now {}",
                        source.source_name(),
                        if is_open { "open" } else { "closed" }
                    );
                    self.publish(is_open);
                    if !is_open && self.exit_on_close {
                        self.drain_queued(&mut stream);
                        info!("[ProcessingLoop] Source closed, stopping");
                        break;
                    }
                }

                line = stream.next() => match line {
                    Some(line) => self.on_line(&line),
                    None => {
                        warn!("[ProcessingLoop] Line stream ended");
                        break;
                    }
                },
            }
        }

        if let Err(e) = source.close().await {
            warn!("[ProcessingLoop] Failed to close {}: {}", source.source_name(), e);
        }
        self.publish(source.is_open());

        let stats = *self.coordinator.stats();
        info!("[ProcessingLoop] Stopped: {}", stats);
        Ok(stats)
    }

    fn on_line(&mut self, line: &str) {
        // Eligibility is judged when the line arrives, not at the tick.
        let eligible = self.coordinator.fft_trigger_eligible();
        if let LineOutcome::Applied { new_channels, .. } = self.coordinator.handle_line(line) {
            if new_channels > 0 {
                info!(
                    "[ProcessingLoop] {} channel(s) now active",
                    self.coordinator.buffers().channel_count()
                );
            }
        }
        if eligible {
            self.sampler.mark();
        }
    }

    /// Process lines that were queued before the current command arrived.
    fn drain_queued(&mut self, stream: &mut LineStream) {
        while let Some(line) = stream.try_next() {
            self.on_line(&line);
        }
    }

    async fn apply_command<S: LineSource + ?Sized>(&mut self, command: PipelineCommand, source: &mut S) -> Flow {
        let c = &mut self.coordinator;
        match command {
            PipelineCommand::Pause => c.pause(),
            PipelineCommand::Resume => c.resume(),
            PipelineCommand::TogglePause => c.toggle_pause(),
            PipelineCommand::SetFftEnabled(enabled) => c.set_fft_enabled(enabled),
            PipelineCommand::SetFftWindow(window) => {
                c.set_fft_window(window);
            }
            PipelineCommand::SetBufferSize(raw) => {
                c.request_buffer_size(raw, Instant::now());
            }
            PipelineCommand::SelectRegion(rect) => c.select_region(rect),
            PipelineCommand::ResetSelection => c.reset_selection(),
            PipelineCommand::ClearPoints => c.clear_points(),
            PipelineCommand::Post { text, reply } => {
                let result = source.post_str(&text).await;
                if let Err(e) = &result {
                    warn!("[ProcessingLoop] Post to {} failed: {}", source.source_name(), e);
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            PipelineCommand::Flush(reply) => {
                // Publish before acknowledging so the caller sees the result.
                self.publish(source.is_open());
                let _ = reply.send(());
            }
            PipelineCommand::Shutdown => {
                info!("[ProcessingLoop] Shutdown requested");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn publish(&mut self, source_open: bool) {
        self.coordinator.take_dirty();
        self.published
            .store(Arc::new(self.coordinator.snapshot(source_open)));
    }
}

/// Interval whose first tick is one period from now.
fn ticker(period: std::time::Duration, behavior: MissedTickBehavior) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(behavior);
    interval
}
