//! Pipeline Coordinator - single owner of all mutable pipeline data
//!
//! The coordinator is synchronous: the processing loop feeds it lines,
//! commands and timer edges, and it updates buffers, spectra, flags and the
//! diagnostic log. Nothing else mutates these structures.
//!
//! ```text
//! line ──► gate (Running?) ──► parse ──► Series buffers ──► dirty
//!                │                 └──► diagnostic log
//!                └─ dropped
//!
//! FFT tick / window change / selection change ──► recompute all spectra
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::governor::Debouncer;
use super::state::{DiagnosticLog, LogEntry, LogKind, PipelineSnapshot, PipelineState, PipelineStats};
use crate::acquisition::parse_line_detailed;
use crate::config::{clamp_buffer_size, FftWindowSize, PipelineConfig, PipelineSettings};
use crate::processing::SpectralAnalyzer;
use crate::series::SeriesBufferManager;
use crate::types::{SelectionRect, SpectrumResult};

/// What happened to one incoming line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Samples were appended to the buffers
    Applied { samples: usize, new_channels: usize },
    /// The line held no samples and went to the log
    Text,
    /// Paused or zoom-held; discarded unparsed
    Dropped,
}

pub struct PipelineCoordinator {
    config: PipelineConfig,
    buffers: SeriesBufferManager,
    analyzer: SpectralAnalyzer,
    spectra: Arc<[SpectrumResult]>,
    selection: Option<SelectionRect>,
    axis_epoch: u64,
    resize: Debouncer<usize>,
    log: DiagnosticLog,
    log_view: Option<Arc<[LogEntry]>>,
    stats: PipelineStats,
    applied_since_tick: u64,
    dirty: bool,
}

impl PipelineCoordinator {
    pub fn new(settings: &PipelineSettings) -> Self {
        let config = PipelineConfig::from_settings(settings);
        Self {
            config,
            buffers: SeriesBufferManager::new(config.buffer_size),
            analyzer: SpectralAnalyzer::new(settings.peak_count),
            spectra: Arc::from(Vec::new()),
            selection: None,
            axis_epoch: 0,
            resize: Debouncer::new(settings.resize_debounce(), Some(config.buffer_size)),
            log: DiagnosticLog::new(settings.log_capacity),
            log_view: None,
            stats: PipelineStats::default(),
            applied_since_tick: 0,
            dirty: true,
        }
    }

    // ========================================================================
    // Data Path
    // ========================================================================

    /// Gate, parse and apply one line from the source.
    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        self.stats.lines_received += 1;

        if self.state().discards_samples() {
            self.stats.lines_dropped += 1;
            return LineOutcome::Dropped;
        }

        let parsed = parse_line_detailed(line);
        for diagnostic in &parsed.diagnostics {
            warn!("[LineParser] {} from \"{}\"", diagnostic, line.trim());
            self.stats.parse_errors += 1;
            self.push_log(LogKind::ParseError, format!("{} from \"{}\"", diagnostic, line.trim()));
        }

        if parsed.samples.is_empty() {
            debug!("[Coordinator] Unhandled message: \"{}\"", line.trim());
            self.stats.text_lines += 1;
            self.push_log(LogKind::Text, line.trim());
            return LineOutcome::Text;
        }

        let report = self.buffers.ingest(&parsed.samples);
        self.stats.lines_applied += 1;
        self.stats.channel_count = self.buffers.channel_count();
        self.applied_since_tick += 1;
        self.dirty = true;

        LineOutcome::Applied {
            samples: parsed.samples.len(),
            new_channels: report.created,
        }
    }

    /// Whether a line arriving now should arm the sampled FFT trigger.
    pub const fn fft_trigger_eligible(&self) -> bool {
        self.config.fft_enabled && !self.config.is_effectively_paused()
    }

    /// Replace every channel spectrum, honouring the current selection.
    pub fn recompute_spectra(&mut self) {
        let channels = match self.selection {
            Some(rect) => self.buffers.snapshot_in_range(rect.left(), rect.right()),
            None => self.buffers.snapshot(),
        };
        let spectra = self.analyzer.analyze_all(&channels, self.config.fft_window);
        self.spectra = Arc::from(spectra);
        self.stats.spectrum_recomputes += 1;
        self.dirty = true;
        debug!(
            channels = channels.len(),
            window = self.config.fft_window.get(),
            "[Coordinator] Spectra recomputed"
        );
    }

    fn recompute_if_enabled(&mut self) {
        if self.config.fft_enabled {
            self.recompute_spectra();
        }
    }

    fn push_log(&mut self, kind: LogKind, message: impl Into<String>) {
        self.log.push(kind, message);
        self.log_view = None;
        self.dirty = true;
    }

    // ========================================================================
    // Pause / Zoom State Machine
    // ========================================================================

    pub fn state(&self) -> PipelineState {
        PipelineState::from_config(&self.config)
    }

    pub fn pause(&mut self) {
        if !self.config.is_paused {
            self.config.is_paused = true;
            self.dirty = true;
            info!("[Coordinator] Paused");
        }
    }

    /// Back to Running. Also drops any zoom selection and requests an axis
    /// reset. No-op when already running without a selection.
    pub fn resume(&mut self) {
        if self.state() == PipelineState::Running && self.selection.is_none() {
            return;
        }
        self.leave_hold();
    }

    fn leave_hold(&mut self) {
        let was = self.state();
        self.config.is_paused = false;
        self.config.zoom_hold = false;
        let had_selection = self.selection.take().is_some();
        self.axis_epoch += 1;
        self.dirty = true;
        info!("[Coordinator] {} -> RUNNING (axis reset requested)", was);
        if had_selection {
            self.recompute_if_enabled();
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.state().discards_samples() {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Freeze a data-space region for inspection. Forces a pause.
    pub fn select_region(&mut self, rect: SelectionRect) {
        self.selection = Some(rect);
        self.config.zoom_hold = true;
        self.config.is_paused = true;
        self.dirty = true;
        info!("[Coordinator] Zoom held on {}", rect);
        self.recompute_if_enabled();
    }

    /// Drop the selection, clear axis limits and return to Running.
    ///
    /// Always requests an axis reset, even when already running.
    pub fn reset_selection(&mut self) {
        info!("[Coordinator] Selection reset");
        self.leave_hold();
    }

    // ========================================================================
    // Configuration Surface
    // ========================================================================

    /// Returns whether the size changed (and spectra were recomputed).
    pub fn set_fft_window(&mut self, window: FftWindowSize) -> bool {
        if window == self.config.fft_window {
            return false;
        }
        info!("[Coordinator] FFT window {} -> {}", self.config.fft_window, window);
        self.config.fft_window = window;
        self.dirty = true;
        self.recompute_if_enabled();
        true
    }

    /// Disabling drops the published spectra; enabling recomputes at once.
    pub fn set_fft_enabled(&mut self, enabled: bool) {
        if enabled == self.config.fft_enabled {
            return;
        }
        self.config.fft_enabled = enabled;
        self.dirty = true;
        info!("[Coordinator] FFT {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            self.recompute_spectra();
        } else {
            self.spectra = Arc::from(Vec::new());
        }
    }

    /// Queue a user-entered buffer size; it is clamped now and applied once
    /// the debounce period passes without further edits.
    pub fn request_buffer_size(&mut self, raw: i64, now: Instant) -> usize {
        let size = clamp_buffer_size(raw);
        if i64::try_from(size).ok() != Some(raw) {
            debug!("[Coordinator] Buffer size {} clamped to {}", raw, size);
        }
        self.resize.push(size, now);
        self.dirty = true;
        size
    }

    pub fn resize_deadline(&self) -> Option<Instant> {
        self.resize.deadline()
    }

    /// Commit a debounced resize if one is due. Returns the new capacity.
    pub fn apply_pending_resize(&mut self, now: Instant) -> Option<usize> {
        let had_pending = self.resize.pending().is_some();
        let size = self.resize.poll(now);
        if had_pending && self.resize.pending().is_none() {
            self.dirty = true;
        }
        let size = size?;
        self.buffers.apply_capacity(size);
        self.config.buffer_size = self.buffers.capacity();
        Some(self.config.buffer_size)
    }

    /// Empty every buffer in place. Channels and the sample counter remain.
    pub fn clear_points(&mut self) {
        self.buffers.clear();
        self.dirty = true;
        info!("[Coordinator] Points cleared");
    }

    // ========================================================================
    // Stats & Publication
    // ========================================================================

    /// Close one stats interval and compute the update rate.
    pub fn tick_stats(&mut self, interval: Duration) {
        let secs = interval.as_secs_f64();
        self.stats.updates_per_second = if secs > 0.0 {
            self.applied_since_tick as f64 / secs
        } else {
            0.0
        };
        self.applied_since_tick = 0;
        self.dirty = true;
    }

    /// Whether anything changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn snapshot(&mut self, source_open: bool) -> PipelineSnapshot {
        let log = match &self.log_view {
            Some(view) => Arc::clone(view),
            None => {
                let view: Arc<[LogEntry]> = Arc::from(self.log.to_vec());
                self.log_view = Some(Arc::clone(&view));
                view
            }
        };

        PipelineSnapshot {
            state: self.state(),
            config: self.config,
            pending_buffer_size: self.resize.pending(),
            channels: Arc::from(self.buffers.snapshot()),
            spectra: Arc::clone(&self.spectra),
            selection: self.selection,
            stats: self.stats,
            axis_epoch: self.axis_epoch,
            log,
            source_open,
            published_at: chrono::Utc::now(),
        }
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub const fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub const fn buffers(&self) -> &SeriesBufferManager {
        &self.buffers
    }

    pub fn spectra(&self) -> &[SpectrumResult] {
        &self.spectra
    }

    pub const fn selection(&self) -> Option<SelectionRect> {
        self.selection
    }

    pub const fn axis_epoch(&self) -> u64 {
        self.axis_epoch
    }

    pub const fn log(&self) -> &DiagnosticLog {
        &self.log
    }
}
