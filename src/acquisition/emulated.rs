//! Emulated line source
//!
//! Generates synthetic telemetry lines for development without hardware.
//! A background task ticks at the polling interval, advances a synthetic
//! clock by the measured elapsed time, evaluates the selected waveform and
//! publishes the formatted line using the same grammar the parser consumes.
//!
//! Requested polling rates above the cutoff are reached by emitting several
//! lines per timer tick: for 200 Hz with a 50 Hz cutoff the timer fires every
//! 20 ms and emits 4 lines, each advancing the clock by a quarter of the
//! measured interval.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{LineHub, LineSource, LineStream, OpenFlag, SourceError};
use crate::config::defaults::{
    EMULATION_CUTOFF_HZ, EMULATION_POLLING_HZ, MAX_EMULATION_RATE_HZ, MIN_EMULATION_RATE_HZ, NOISE_STD_DEV, PULSE_DUTY_CYCLE, RAMP_FREQUENCY_HZ,
    WAVE_FREQUENCY_HZ,
};

// ============================================================================
// Waveforms
// ============================================================================

pub fn sin_wave(frequency: f64, time: f64) -> f64 {
    (2.0 * PI * frequency * time).sin()
}

pub fn sqr_wave(frequency: f64, time: f64) -> f64 {
    if sin_wave(frequency, time) >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// 1 during the first `duty` fraction of every period, 0 otherwise.
pub fn pulse_wave(frequency: f64, duty: f64, time: f64) -> f64 {
    if (frequency * time).rem_euclid(1.0) < duty {
        1.0
    } else {
        0.0
    }
}

/// Sawtooth sweeping -1 to 1 once per period.
pub fn ramp_wave(frequency: f64, time: f64) -> f64 {
    2.0 * (frequency * time).rem_euclid(1.0) - 1.0
}

// ============================================================================
// Emulation Modes
// ============================================================================

/// Waveform emitted by [`EmulatedSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmulationMode {
    /// Source runs but publishes nothing
    NoData,
    /// `1.000000` / `-1.000000`
    #[default]
    SquareWave,
    SineWave,
    /// Sawtooth with gaussian noise
    NoisyRamp,
    /// Short positive pulse once per period
    PeriodicPulse,
    /// `(t,sqr)`
    XySeries,
    /// `sqr, sin`
    MultiSeries,
    /// `(t,sqr,sin)`
    MultiSeriesSharedX,
    /// `(t,sqr) (t,sin)`
    MultiSeriesIndependentX,
}

impl EmulationMode {
    pub const ALL: [Self; 9] = [
        Self::NoData,
        Self::SquareWave,
        Self::SineWave,
        Self::NoisyRamp,
        Self::PeriodicPulse,
        Self::XySeries,
        Self::MultiSeries,
        Self::MultiSeriesSharedX,
        Self::MultiSeriesIndependentX,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::NoData => "no-data",
            Self::SquareWave => "square-wave",
            Self::SineWave => "sine-wave",
            Self::NoisyRamp => "noisy-ramp",
            Self::PeriodicPulse => "periodic-pulse",
            Self::XySeries => "xy-series",
            Self::MultiSeries => "multi-series",
            Self::MultiSeriesSharedX => "multi-series-shared-x",
            Self::MultiSeriesIndependentX => "multi-series-independent-x",
        }
    }

    /// Format the line for synthetic time `t`, or `None` for [`Self::NoData`].
    pub fn render(self, t: f64, rng: &mut impl Rng) -> Option<String> {
        let f = WAVE_FREQUENCY_HZ;
        let line = match self {
            Self::NoData => return None,
            Self::SquareWave => format!("{:.6}", sqr_wave(f, t)),
            Self::SineWave => format!("{:.6}", sin_wave(f, t)),
            Self::NoisyRamp => {
                let noise: f64 = rng.sample(StandardNormal);
                format!("{:.6}", ramp_wave(RAMP_FREQUENCY_HZ, t) + noise * NOISE_STD_DEV)
            }
            Self::PeriodicPulse => format!("{:.6}", pulse_wave(f, PULSE_DUTY_CYCLE, t)),
            Self::XySeries => format!("({t},{:.6})", sqr_wave(f, t)),
            Self::MultiSeries => format!("{:.6}, {:.6}", sqr_wave(f, t), sin_wave(f, t)),
            Self::MultiSeriesSharedX => {
                format!("({t},{:.6},{:.6})", sqr_wave(f, t), sin_wave(f, t))
            }
            Self::MultiSeriesIndependentX => {
                format!("({t},{:.6}) ({t},{:.6})", sqr_wave(f, t), sin_wave(f, t))
            }
        };
        Some(line)
    }
}

impl std::fmt::Display for EmulationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EmulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.name()).collect();
                format!("unknown emulation mode '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

// ============================================================================
// Polling Plan
// ============================================================================

/// Timer cadence derived from the requested polling rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingPlan {
    /// Lines emitted per timer tick
    pub lines_per_tick: u32,
    /// Timer period
    pub interval: Duration,
}

impl PollingPlan {
    /// Smallest divisor that keeps the timer rate at or below `cutoff_hz`.
    ///
    /// Both rates are clamped to
    /// [`MIN_EMULATION_RATE_HZ`]..=[`MAX_EMULATION_RATE_HZ`]; non-finite or
    /// non-positive values fall back to the defaults.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(polling_hz: f64, cutoff_hz: f64) -> Self {
        let polling_hz = clamp_rate(polling_hz, EMULATION_POLLING_HZ);
        let cutoff_hz = clamp_rate(cutoff_hz, EMULATION_CUTOFF_HZ);
        // At most MAX/MIN = 1e6, so the cast cannot truncate.
        let div = (polling_hz / cutoff_hz)
            .ceil()
            .clamp(1.0, MAX_EMULATION_RATE_HZ / MIN_EMULATION_RATE_HZ) as u32;
        let interval = Duration::from_secs_f64(f64::from(div) / polling_hz);
        debug!(
            "To achieve a polling rate of {:.1} Hz, using {:.1} Hz ~= {:.1} ms with a multiplier of {}",
            polling_hz,
            polling_hz / f64::from(div),
            interval.as_secs_f64() * 1000.0,
            div
        );
        Self {
            lines_per_tick: div,
            interval,
        }
    }
}

fn clamp_rate(hz: f64, fallback: f64) -> f64 {
    if hz.is_finite() && hz > 0.0 {
        hz.clamp(MIN_EMULATION_RATE_HZ, MAX_EMULATION_RATE_HZ)
    } else {
        fallback
    }
}

impl Default for PollingPlan {
    fn default() -> Self {
        Self::new(EMULATION_POLLING_HZ, EMULATION_CUTOFF_HZ)
    }
}

// ============================================================================
// Emulated Source
// ============================================================================

/// Generator state carried across close/open restarts.
struct GeneratorState {
    clock: f64,
    rng: StdRng,
}

struct RunningGenerator {
    cancel: CancellationToken,
    handle: JoinHandle<GeneratorState>,
}

/// Synthetic line source.
pub struct EmulatedSource {
    hub: LineHub,
    open: Arc<OpenFlag>,
    mode: watch::Sender<EmulationMode>,
    plan: PollingPlan,
    state: Option<GeneratorState>,
    running: Option<RunningGenerator>,
}

impl EmulatedSource {
    pub fn new(mode: EmulationMode) -> Self {
        let (mode_tx, _mode_rx) = watch::channel(mode);
        Self {
            hub: LineHub::new(),
            open: Arc::new(OpenFlag::new()),
            mode: mode_tx,
            plan: PollingPlan::default(),
            state: Some(GeneratorState {
                clock: 0.0,
                rng: StdRng::from_entropy(),
            }),
            running: None,
        }
    }

    /// Override the polling rate and cutoff (takes effect on next open).
    #[must_use]
    pub fn with_polling(mut self, polling_hz: f64, cutoff_hz: f64) -> Self {
        self.plan = PollingPlan::new(polling_hz, cutoff_hz);
        self
    }

    /// Seed the noise generator for reproducible output.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        if let Some(state) = self.state.as_mut() {
            state.rng = StdRng::seed_from_u64(seed);
        }
        self
    }

    /// Switch waveform; a running generator picks it up on its next tick.
    pub fn set_mode(&self, mode: EmulationMode) {
        let previous = self.mode.send_replace(mode);
        if previous != mode {
            info!("[EmulatedSource] Emulation mode {} -> {}", previous, mode);
        }
    }

    pub fn mode(&self) -> EmulationMode {
        *self.mode.borrow()
    }

    pub const fn plan(&self) -> PollingPlan {
        self.plan
    }

    /// Current synthetic time (seconds), if the generator is not running.
    pub fn clock(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.clock)
    }

    async fn stop_generator(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        match running.handle.await {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                warn!("[EmulatedSource] Generator task ended abnormally: {}", e);
                self.state = Some(GeneratorState {
                    clock: 0.0,
                    rng: StdRng::from_entropy(),
                });
            }
        }
    }
}

#[async_trait]
impl LineSource for EmulatedSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        if self.running.is_some() {
            self.close().await?;
        }

        let state = self.state.take().unwrap_or_else(|| GeneratorState {
            clock: 0.0,
            rng: StdRng::from_entropy(),
        });
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_generator(
            self.hub.clone(),
            self.mode.subscribe(),
            self.plan,
            state,
            cancel.clone(),
        ));
        self.running = Some(RunningGenerator { cancel, handle });
        self.open.set(true);

        info!(
            "[EmulatedSource] Opened ({}, {} lines every {:?})",
            self.mode(),
            self.plan.lines_per_tick,
            self.plan.interval
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        if self.running.is_none() {
            return Ok(());
        }
        self.stop_generator().await;
        self.open.set(false);
        info!("[EmulatedSource] Closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn watch_open(&self) -> watch::Receiver<bool> {
        self.open.watch()
    }

    fn subscribe(&self) -> LineStream {
        self.hub.subscribe()
    }

    async fn post(&mut self, _c: char) -> Result<(), SourceError> {
        Err(SourceError::Unsupported {
            source_name: "emulated",
            operation: "post",
        })
    }

    fn source_name(&self) -> &str {
        "emulated"
    }
}

impl Drop for EmulatedSource {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            self.open.set(false);
        }
    }
}

/// Generator loop; returns its state when cancelled so a restart resumes
/// the synthetic clock.
async fn run_generator(
    hub: LineHub,
    mode: watch::Receiver<EmulationMode>,
    plan: PollingPlan,
    mut state: GeneratorState,
    cancel: CancellationToken,
) -> GeneratorState {
    let mut ticker = tokio::time::interval_at(Instant::now() + plan.interval, plan.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    let div = f64::from(plan.lines_per_tick);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let now = Instant::now();
                let step = now.duration_since(last).as_secs_f64() / div;
                last = now;

                let current = *mode.borrow();
                for _ in 0..plan.lines_per_tick {
                    state.clock += step;
                    if let Some(line) = current.render(state.clock, &mut state.rng) {
                        hub.publish(line);
                    }
                }
            }
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::parse_line;

    #[test]
    fn polling_plan_respects_cutoff() {
        let plan = PollingPlan::new(200.0, 50.0);
        assert_eq!(plan.lines_per_tick, 4);
        assert_eq!(plan.interval, Duration::from_millis(20));

        let plan = PollingPlan::new(30.0, 50.0);
        assert_eq!(plan.lines_per_tick, 1);
    }

    #[test]
    fn polling_plan_clamps_extreme_rates() {
        // Slowest accepted rate: one line every ten seconds.
        let plan = PollingPlan::new(1e-30, 50.0);
        assert_eq!(plan.lines_per_tick, 1);
        assert_eq!(plan.interval, Duration::from_secs(10));

        // Tiny cutoff: divisor computed directly, bounded by the rate range.
        let plan = PollingPlan::new(200.0, 1e-9);
        assert_eq!(plan.lines_per_tick, 2_000);
        assert_eq!(plan.interval, Duration::from_secs(10));

        let plan = PollingPlan::new(f64::INFINITY, f64::NAN);
        assert_eq!(plan, PollingPlan::default());
    }

    #[test]
    fn every_mode_renders_parseable_lines() {
        let mut rng = StdRng::seed_from_u64(7);
        for mode in EmulationMode::ALL {
            let Some(line) = mode.render(0.3, &mut rng) else {
                assert_eq!(mode, EmulationMode::NoData);
                continue;
            };
            let samples = parse_line(&line);
            let expected = match mode {
                EmulationMode::MultiSeries
                | EmulationMode::MultiSeriesSharedX
                | EmulationMode::MultiSeriesIndependentX => 2,
                _ => 1,
            };
            assert_eq!(samples.len(), expected, "mode {mode} line {line:?}");
        }
    }

    #[test]
    fn xy_modes_carry_the_clock_as_x() {
        let mut rng = StdRng::seed_from_u64(1);
        let line = EmulationMode::MultiSeriesIndependentX
            .render(0.125, &mut rng)
            .unwrap();
        assert_eq!(line, "(0.125,1.000000) (0.125,0.707107)");
        let samples = parse_line(&line);
        assert!(samples.iter().all(|s| s.x == Some(0.125)));
    }

    #[test]
    fn mode_names_round_trip_through_from_str() {
        for mode in EmulationMode::ALL {
            assert_eq!(mode.name().parse::<EmulationMode>(), Ok(mode));
        }
        assert_eq!("Square_Wave".parse::<EmulationMode>(), Ok(EmulationMode::SquareWave));
        assert!("triangle".parse::<EmulationMode>().is_err());
    }

    #[test]
    fn waveforms_have_expected_shape() {
        assert_eq!(sqr_wave(1.0, 0.25), 1.0);
        assert_eq!(sqr_wave(1.0, 0.75), -1.0);
        assert_eq!(pulse_wave(1.0, 0.1, 0.05), 1.0);
        assert_eq!(pulse_wave(1.0, 0.1, 0.5), 0.0);
        assert!((ramp_wave(0.5, 1.0) - 0.0).abs() < 1e-12);
    }

    #[tokio::test(start_paused = true)]
    async fn generator_publishes_and_post_is_unsupported() {
        let mut source = EmulatedSource::new(EmulationMode::SineWave).with_seed(3);
        let mut stream = source.subscribe();
        assert!(stream.try_next().is_none());

        source.open().await.unwrap();
        assert!(source.is_open());

        let first = stream.next().await.unwrap();
        assert!(!parse_line(&first).is_empty());

        let err = source.post('a').await.unwrap_err();
        assert!(matches!(err, SourceError::Unsupported { .. }));
        assert!(source.post_str("").await.is_ok());

        source.close().await.unwrap();
        assert!(!source.is_open());
        assert!(source.clock().unwrap() > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reopen_restarts_and_keeps_clock_monotonic() {
        let mut source = EmulatedSource::new(EmulationMode::XySeries).with_seed(3);
        let mut stream = source.subscribe();

        source.open().await.unwrap();
        let first = parse_line(&stream.next().await.unwrap())[0].x.unwrap();

        source.open().await.unwrap();
        let clock_at_restart = source.clock();
        assert!(clock_at_restart.is_none(), "generator should be running again");

        // Drain anything queued before the restart, then take a fresh line.
        while stream.try_next().is_some() {}
        let later = parse_line(&stream.next().await.unwrap())[0].x.unwrap();
        assert!(later > first);

        source.close().await.unwrap();
        // Closing twice is a no-op.
        source.close().await.unwrap();
    }
}
