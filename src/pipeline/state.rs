//! Pipeline state, statistics and published snapshots
//!
//! Everything here is plain data. The processing loop owns the mutable
//! copies; readers only ever see an immutable [`PipelineSnapshot`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::types::{Point, SelectionRect, SpectrumResult};

// ============================================================================
// Pipeline State
// ============================================================================

/// Top-level state derived from [`PipelineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PipelineState {
    #[default]
    Running,
    Paused,
    /// Paused with a selected sub-range frozen for inspection
    ZoomHeld,
}

impl PipelineState {
    pub const fn from_config(config: &PipelineConfig) -> Self {
        if config.zoom_hold {
            Self::ZoomHeld
        } else if config.is_paused {
            Self::Paused
        } else {
            Self::Running
        }
    }

    /// Incoming lines are drained but not applied.
    pub const fn discards_samples(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::ZoomHeld => write!(f, "ZOOM HELD"),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Lines applied to the buffers per second, over the last stats interval
    pub updates_per_second: f64,
    pub lines_received: u64,
    pub lines_applied: u64,
    /// Lines discarded while paused or zoom-held
    pub lines_dropped: u64,
    /// Lines that yielded no samples
    pub text_lines: u64,
    /// Tokens skipped by the parser
    pub parse_errors: u64,
    pub spectrum_recomputes: u64,
    pub channel_count: usize,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1} ups | {} lines ({} applied, {} dropped, {} text) | {} parse errors | {} channels | {} FFTs",
            self.updates_per_second,
            self.lines_received,
            self.lines_applied,
            self.lines_dropped,
            self.text_lines,
            self.parse_errors,
            self.channel_count,
            self.spectrum_recomputes
        )
    }
}

// ============================================================================
// Diagnostic Log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// A line that was not numeric telemetry
    Text,
    /// A token the parser skipped
    ParseError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
}

/// Append-only ordered log, capped by dropping the oldest entries.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        });
        self.next_seq += 1;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries ever written, including dropped ones.
    pub const fn total(&self) -> u64 {
        self.next_seq
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

// ============================================================================
// Published Snapshot
// ============================================================================

/// Immutable view of the pipeline, swapped in wholesale on every publish.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub config: PipelineConfig,
    /// Buffer size waiting for its debounce to elapse
    pub pending_buffer_size: Option<usize>,
    /// Per-channel points, oldest first
    pub channels: Arc<[Vec<Point>]>,
    /// Per-channel spectra, same order as `channels`
    pub spectra: Arc<[SpectrumResult]>,
    pub selection: Option<SelectionRect>,
    pub stats: PipelineStats,
    /// Bumped whenever the view should fit its axes to the data again
    pub axis_epoch: u64,
    pub log: Arc<[LogEntry]>,
    pub source_open: bool,
    pub published_at: DateTime<Utc>,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            state: PipelineState::Running,
            config: PipelineConfig::default(),
            pending_buffer_size: None,
            channels: Arc::from(Vec::new()),
            spectra: Arc::from(Vec::new()),
            selection: None,
            stats: PipelineStats::default(),
            axis_epoch: 0,
            log: Arc::from(Vec::new()),
            source_open: false,
            published_at: Utc::now(),
        }
    }
}

impl PipelineSnapshot {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Compact serialisable summary for status output.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            state: self.state,
            buffer_size: self.config.buffer_size,
            fft_window: self.config.fft_window.get(),
            fft_enabled: self.config.fft_enabled,
            points: self.channels.iter().map(Vec::len).collect(),
            peaks: self
                .spectra
                .iter()
                .map(|s| s.peaks.clone())
                .collect(),
            selection: self.selection,
            stats: self.stats,
            axis_epoch: self.axis_epoch,
            log_entries: self.log.len(),
            source_open: self.source_open,
            published_at: self.published_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub state: PipelineState,
    pub buffer_size: usize,
    pub fft_window: usize,
    pub fft_enabled: bool,
    pub points: Vec<usize>,
    pub peaks: Vec<Vec<Point>>,
    pub selection: Option<SelectionRect>,
    pub stats: PipelineStats,
    pub axis_epoch: u64,
    pub log_entries: usize,
    pub source_open: bool,
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_config_flags() {
        let mut config = PipelineConfig::default();
        assert_eq!(PipelineState::from_config(&config), PipelineState::Running);
        config.is_paused = true;
        assert_eq!(PipelineState::from_config(&config), PipelineState::Paused);
        config.zoom_hold = true;
        assert_eq!(PipelineState::from_config(&config), PipelineState::ZoomHeld);
        assert!(PipelineState::ZoomHeld.discards_samples());
        assert!(!PipelineState::Running.discards_samples());
    }

    #[test]
    fn log_drops_oldest_past_capacity() {
        let mut log = DiagnosticLog::new(3);
        for i in 0..5 {
            log.push(LogKind::Text, format!("line {i}"));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total(), 5);
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert_eq!(log.to_vec()[0].message, "line 2");
    }

    #[test]
    fn summary_serialises_to_json() {
        let snapshot = PipelineSnapshot::default();
        let json = serde_json::to_string(&snapshot.summary()).unwrap();
        assert!(json.contains("\"state\":\"Running\""));
        assert!(json.contains("\"fft_window\":256"));
    }
}
