//! Timer governors
//!
//! Explicit replacements for reactive rate operators, driven by the
//! processing loop's own clock so behaviour is reproducible under a paused
//! tokio runtime.
//!
//! - [`Debouncer`]: trailing-edge debounce followed by distinct-until-changed.
//!   Used for buffer resizes.
//! - [`Sampler`]: remembers whether anything arrived since the last sampling
//!   tick. Used to shed FFT triggers rather than queue them.

use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Debouncer
// ============================================================================

/// Emits the latest value once no new value has arrived for `quiet`.
///
/// A value equal to the last emitted one is swallowed.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
    last_emitted: Option<T>,
}

impl<T: Copy + PartialEq> Debouncer<T> {
    /// `initial` counts as already emitted.
    pub const fn new(quiet: Duration, initial: Option<T>) -> Self {
        Self {
            quiet,
            pending: None,
            last_emitted: initial,
        }
    }

    /// Record a new value, restarting the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.quiet));
    }

    /// When the pending value becomes due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, due)| due)
    }

    pub fn pending(&self) -> Option<T> {
        self.pending.map(|(value, _)| value)
    }

    /// Take the pending value if its quiet period has elapsed and it differs
    /// from the last emitted value.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let (value, due) = self.pending?;
        if now < due {
            return None;
        }
        self.pending = None;
        if self.last_emitted == Some(value) {
            return None;
        }
        self.last_emitted = Some(value);
        Some(value)
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Latches arrivals between sampling ticks; bursts collapse to one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler {
    armed: bool,
}

impl Sampler {
    pub fn mark(&mut self) {
        self.armed = true;
    }

    /// Whether anything arrived since the previous call.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.armed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_fires_once_after_quiet_period() {
        let t0 = Instant::now();
        let quiet = Duration::from_secs(1);
        let mut debouncer = Debouncer::new(quiet, Some(525));

        // Typing "1", "10", "100" in quick succession.
        debouncer.push(1, t0);
        debouncer.push(10, t0 + Duration::from_millis(200));
        debouncer.push(100, t0 + Duration::from_millis(400));

        assert_eq!(debouncer.poll(t0 + Duration::from_millis(1300)), None);
        assert_eq!(debouncer.deadline(), Some(t0 + Duration::from_millis(1400)));
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(1400)), Some(100));
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.poll(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn debounce_swallows_repeated_values() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10), Some(525));

        debouncer.push(525, t0);
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(10)), None);
        assert_eq!(debouncer.pending(), None);

        debouncer.push(600, t0);
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(10)), Some(600));
        debouncer.push(600, t0 + Duration::from_millis(20));
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(30)), None);
    }

    #[test]
    fn sampler_collapses_bursts() {
        let mut sampler = Sampler::default();
        assert!(!sampler.take());
        for _ in 0..100 {
            sampler.mark();
        }
        assert!(sampler.take());
        assert!(!sampler.take());
    }
}
