//! Line Stream Simulation
//!
//! Writes emulated telemetry lines to stdout at a fixed polling rate, for
//! feeding linescope (or any other consumer) without hardware:
//!
//! # Usage
//! ```bash
//! ./simulation --mode multi-series --polling-hz 200 | ./linescope --stdin
//! ./simulation --mode noisy-ramp --duration 30 --seed 42 > ramp.txt
//! ```
//!
//! Unlike the in-process emulated source, the synthetic clock advances by
//! exactly one polling period per line, so output is reproducible for a
//! given seed.

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, Write};
use std::time::Instant;

use linescope::acquisition::{EmulationMode, PollingPlan};
use linescope::config::defaults::{
    EMULATION_CUTOFF_HZ, EMULATION_POLLING_HZ, MAX_EMULATION_RATE_HZ, MIN_EMULATION_RATE_HZ,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "linescope-simulation")]
#[command(about = "Emulated line stream generator for linescope testing")]
#[command(version)]
struct Args {
    /// Waveform to emit (square-wave, sine-wave, noisy-ramp, periodic-pulse,
    /// xy-series, multi-series, multi-series-shared-x, multi-series-independent-x)
    #[arg(short, long, default_value = "square-wave")]
    mode: EmulationMode,

    /// Lines per second
    #[arg(long, default_value_t = EMULATION_POLLING_HZ)]
    polling_hz: f64,

    /// Highest timer rate; faster polling writes several lines per tick
    #[arg(long, default_value_t = EMULATION_CUTOFF_HZ)]
    cutoff_hz: f64,

    /// Stop after this many seconds of synthetic time (runs forever if absent)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Write as fast as possible instead of pacing to the polling rate
    #[arg(long)]
    unpaced: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the banner on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn log_banner(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[simulation] {message}");
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let rates = MIN_EMULATION_RATE_HZ..=MAX_EMULATION_RATE_HZ;
    for (flag, value) in [("--polling-hz", args.polling_hz), ("--cutoff-hz", args.cutoff_hz)] {
        if !rates.contains(&value) {
            return Err(format!(
                "{flag} must be within {MIN_EMULATION_RATE_HZ}..={MAX_EMULATION_RATE_HZ} Hz (got {value})"
            )
            .into());
        }
    }

    let plan = PollingPlan::new(args.polling_hz, args.cutoff_hz);
    let step = 1.0 / args.polling_hz;
    let total_lines = args.duration.map(|d| (d.max(0.0) * args.polling_hz).round() as u64);
    let mut rng = args.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    log_banner(&format!("Mode: {}", args.mode), args.quiet);
    log_banner(
        &format!(
            "Polling: {:.1} Hz ({} line(s) every {:.1} ms)",
            args.polling_hz,
            plan.lines_per_tick,
            plan.interval.as_secs_f64() * 1000.0
        ),
        args.quiet,
    );
    if let Some(total) = total_lines {
        log_banner(&format!("Lines: {total}"), args.quiet);
    }
    if let Some(seed) = args.seed {
        log_banner(&format!("Random seed: {seed}"), args.quiet);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let started = Instant::now();
    let mut written: u64 = 0;
    let mut ticks: u32 = 0;

    'outer: loop {
        for _ in 0..plan.lines_per_tick {
            if total_lines.is_some_and(|total| written >= total) {
                break 'outer;
            }
            written += 1;
            let t = written as f64 * step;
            if let Some(line) = args.mode.render(t, &mut rng) {
                if let Err(e) = writeln!(out, "{line}") {
                    // Downstream consumer went away.
                    if e.kind() == io::ErrorKind::BrokenPipe {
                        break 'outer;
                    }
                    return Err(e.into());
                }
            }
        }
        if let Err(e) = out.flush() {
            if e.kind() == io::ErrorKind::BrokenPipe {
                break;
            }
            return Err(e.into());
        }
        ticks = ticks.saturating_add(1);

        if !args.unpaced {
            let due = started + plan.interval * ticks;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
    }

    log_banner(
        &format!("Wrote {written} line(s) in {:.1}s", started.elapsed().as_secs_f64()),
        args.quiet,
    );
    Ok(())
}
