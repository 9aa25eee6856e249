//! Series buffer manager
//!
//! One bounded FIFO [`RollingBuffer`] per channel, indexed by the position
//! at which the channel first appeared in a parsed line. Channels are only
//! ever added; [`SeriesBufferManager::clear`] empties them in place.

use std::collections::VecDeque;
use tracing::info;

use crate::config::clamp_buffer_size;
use crate::types::{Point, Sample};

// ============================================================================
// Rolling Buffer
// ============================================================================

/// Bounded insertion-ordered point sequence; oldest points are evicted first.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    points: VecDeque<Point>,
    capacity: usize,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, returning how many old points were evicted.
    pub fn push(&mut self, point: Point) -> usize {
        self.points.push_back(point);
        self.trim()
    }

    /// Change the capacity, trimming from the oldest end. Returns evictions.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity;
        self.trim()
    }

    fn trim(&mut self) -> usize {
        let excess = self.points.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.points.drain(..excess);
        }
        excess
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// Copy of the buffer contents, oldest first.
    pub fn snapshot(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }

    /// Points with `min_x <= x <= max_x`, oldest first.
    pub fn points_in_range(&self, min_x: f64, max_x: f64) -> Vec<Point> {
        self.points
            .iter()
            .filter(|p| p.x >= min_x && p.x <= max_x)
            .copied()
            .collect()
    }
}

// ============================================================================
// Buffer Manager
// ============================================================================

/// Outcome of one [`SeriesBufferManager::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Channels created by this call
    pub created: usize,
    /// Points evicted across all channels
    pub evicted: usize,
}

#[derive(Debug, Clone)]
pub struct SeriesBufferManager {
    channels: Vec<RollingBuffer>,
    capacity: usize,
    sample_counter: u64,
}

impl SeriesBufferManager {
    /// `capacity` is clamped to the accepted buffer size range.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Vec::new(),
            capacity: clamp_buffer_size(i64::try_from(capacity).unwrap_or(i64::MAX)),
            sample_counter: 0,
        }
    }

    /// Append one parsed line.
    ///
    /// Sample `i` goes to channel `i`. Samples without X share the current
    /// counter value; the counter then advances once for the whole line.
    pub fn ingest(&mut self, samples: &[Sample]) -> IngestReport {
        let mut report = IngestReport::default();
        let implicit_x = self.sample_counter as f64;

        for (i, sample) in samples.iter().enumerate() {
            if i >= self.channels.len() {
                self.channels.push(RollingBuffer::new(self.capacity));
                report.created += 1;
                info!(channel = i, "[SeriesBuffers] Created channel {}", i);
            }
            let point = Point::new(sample.x.unwrap_or(implicit_x), sample.y);
            report.evicted += self.channels[i].push(point);
        }

        self.sample_counter += 1;
        report
    }

    /// Apply a new capacity to every channel at once. Returns evictions.
    pub fn apply_capacity(&mut self, capacity: usize) -> usize {
        let capacity = clamp_buffer_size(i64::try_from(capacity).unwrap_or(i64::MAX));
        if capacity == self.capacity {
            return 0;
        }
        let previous = self.capacity;
        self.capacity = capacity;
        let evicted = self
            .channels
            .iter_mut()
            .map(|channel| channel.set_capacity(capacity))
            .sum();
        info!(
            "[SeriesBuffers] Buffer size {} -> {} ({} points evicted)",
            previous, capacity, evicted
        );
        evicted
    }

    /// Empty every buffer, keeping the channels and the sample counter.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&RollingBuffer> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[RollingBuffer] {
        &self.channels
    }

    pub const fn sample_counter(&self) -> u64 {
        self.sample_counter
    }

    /// Snapshot of every channel, oldest point first.
    pub fn snapshot(&self) -> Vec<Vec<Point>> {
        self.channels.iter().map(RollingBuffer::snapshot).collect()
    }

    /// Snapshot of every channel restricted to `min_x..=max_x`.
    pub fn snapshot_in_range(&self, min_x: f64, max_x: f64) -> Vec<Vec<Point>> {
        self.channels
            .iter()
            .map(|c| c.points_in_range(min_x, max_x))
            .collect()
    }
}
