//! linescope - streaming telemetry plotter core
//!
//! Reads newline-delimited numeric telemetry, keeps a rolling window per
//! channel and reports spectra and peaks while the stream runs.
//!
//! # Usage
//!
//! ```bash
//! # Run with the built-in emulated source
//! cargo run --release -- --emulation multi-series
//!
//! # Pipe the generator binary in
//! ./simulation --mode sine-wave | ./linescope --stdin
//!
//! # Connect to a device bridge and type commands (pause, fft 512, zoom ...)
//! ./linescope --tcp 192.168.1.20:5000 --interactive
//!
//! # Replay a capture as fast as possible and print JSON status lines
//! ./linescope --replay capture.txt --json
//! ```
//!
//! # Environment Variables
//!
//! - `LINESCOPE_CONFIG`: Path to a TOML config file (default: ./linescope.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use linescope::acquisition::{EmulatedSource, EmulationMode, LineSource, ReplaySource, StdinSource, TcpSource};
use linescope::config::{clamp_buffer_size, AppConfig, FftWindowSize, PipelineSettings};
use linescope::pipeline::{PipelineCommand, PipelineHandle, PipelineSnapshot, ProcessingLoop};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "linescope")]
#[command(about = "Streaming telemetry plotter core: rolling buffers, spectra and peaks")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides LINESCOPE_CONFIG and ./linescope.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read lines from stdin instead of the emulated source
    /// Use with the generator: ./simulation | ./linescope --stdin
    #[arg(long, conflicts_with_all = ["tcp", "replay", "interactive"])]
    stdin: bool,

    /// Connect to a line-oriented TCP device
    /// Example: ./linescope --tcp localhost:5000
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "replay")]
    tcp: Option<String>,

    /// Replay a capture file, one line per line
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Delay between replayed lines (0 = no delay)
    #[arg(long, value_name = "MS", default_value = "0")]
    replay_delay_ms: u64,

    /// Emulated waveform (overrides source.emulation)
    #[arg(long, value_name = "MODE")]
    emulation: Option<EmulationMode>,

    /// Emulated line rate in Hz (overrides source.polling_hz)
    #[arg(long, value_name = "HZ")]
    polling_hz: Option<f64>,

    /// Seed for noisy emulated waveforms
    #[arg(long)]
    seed: Option<u64>,

    /// Points kept per channel; clamped to the accepted range
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    buffer_size: Option<i64>,

    /// FFT window size (16, 32, 64, 128, 256, 512 or 1024)
    #[arg(long, value_name = "N")]
    fft_window: Option<FftWindowSize>,

    /// Start with spectral analysis disabled
    #[arg(long)]
    no_fft: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Read pipeline commands from stdin while running
    #[arg(short, long)]
    interactive: bool,

    /// Print status as JSON lines on stdout instead of log lines
    #[arg(long)]
    json: bool,

    /// Emit log records as JSON (for log shippers)
    #[arg(long)]
    log_json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Load the config file and apply command-line overrides.
fn build_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load(),
    };

    if let Some(mode) = args.emulation {
        config.source.emulation = mode;
    }
    if let Some(hz) = args.polling_hz {
        config.source.polling_hz = hz;
    }
    if args.seed.is_some() {
        config.source.seed = args.seed;
    }
    if let Some(size) = args.buffer_size {
        config.pipeline.buffer_size = clamp_buffer_size(size);
    }
    if let Some(window) = args.fft_window {
        config.pipeline.fft_window = window;
    }
    if args.no_fft {
        config.pipeline.fft_enabled = false;
    }

    config.normalize();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    Pipeline,
    StatusReporter,
    CommandDispatcher,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pipeline => write!(f, "Pipeline"),
            Self::StatusReporter => write!(f, "StatusReporter"),
            Self::CommandDispatcher => write!(f, "CommandDispatcher"),
        }
    }
}

/// Monitor tasks; once the pipeline stops, everything else is cancelled.
async fn run_supervisor(task_set: &mut JoinSet<Result<TaskName>>, cancel_token: CancellationToken) -> Result<()> {
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(TaskName::Pipeline)) => {
                info!("[Supervisor] Pipeline finished, stopping remaining tasks");
                cancel_token.cancel();
            }
            Ok(Ok(task_name)) => {
                info!("[Supervisor] Task {} completed normally", task_name);
            }
            Ok(Err(e)) => {
                error!("[Supervisor] Task failed with error: {:#}", e);
                cancel_token.cancel();
                return Err(e);
            }
            Err(e) => {
                error!("[Supervisor] Task panicked: {}", e);
                cancel_token.cancel();
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Status Output
// ============================================================================

fn report_status(snapshot: &PipelineSnapshot, json: bool) {
    if json {
        match serde_json::to_string(&snapshot.summary()) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("[Status] Failed to serialise snapshot: {}", e),
        }
        return;
    }

    info!(
        "[Status] {} | {} | buffer {} | FFT {} ({})",
        snapshot.state,
        snapshot.stats,
        snapshot.config.buffer_size,
        if snapshot.config.fft_enabled { "on" } else { "off" },
        snapshot.config.fft_window
    );
    for (channel, spectrum) in snapshot.spectra.iter().enumerate() {
        if let Some(peak) = spectrum.dominant() {
            info!(
                "[Status]   ch{}: {} points, dominant {:.3} Hz (mag {:.4})",
                channel,
                snapshot.channels.get(channel).map_or(0, Vec::len),
                peak.x,
                peak.y
            );
        }
    }
    if let Some(selection) = snapshot.selection {
        info!("[Status]   selection {}", selection);
    }
}

fn spawn_status_reporter(
    task_set: &mut JoinSet<Result<TaskName>>,
    handle: PipelineHandle,
    json: bool,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => report_status(&handle.snapshot(), json),
            }
        }
        Ok(TaskName::StatusReporter)
    });
}

// ============================================================================
// Interactive Commands
// ============================================================================

/// Read commands from stdin on a dedicated thread; blocking reads would
/// otherwise hold up runtime shutdown.
fn spawn_command_reader(
    task_set: &mut JoinSet<Result<TaskName>>,
    handle: PipelineHandle,
    cancel_token: CancellationToken,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    task_set.spawn(async move {
        loop {
            let line = tokio::select! {
                () = cancel_token.cancelled() => break,
                line = rx.recv() => match line {
                    Some(line) => line,
                    None => break,
                },
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<PipelineCommand>() {
                Ok(PipelineCommand::Post { text, .. }) => match handle.post(text).await {
                    Ok(()) => info!("[Commands] Sent"),
                    Err(e) => warn!("[Commands] Send failed: {}", e),
                },
                Ok(command) => {
                    if handle.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("[Commands] {}", e),
            }
        }
        Ok(TaskName::CommandDispatcher)
    });
}

// ============================================================================
// Unified Pipeline Runner
// ============================================================================

/// Run the pipeline with any line source until it stops.
///
/// `exit_on_close` ends the run when the source closes on its own (end
/// of stdin, replay finished, peer hung up).
async fn run_pipeline<S: LineSource>(
    mut source: S,
    settings: PipelineSettings,
    exit_on_close: bool,
    args: &CliArgs,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!(
        "Starting linescope on {} (buffer {}, FFT window {}, FFT {})",
        source.source_name(),
        settings.buffer_size,
        settings.fft_window,
        if settings.fft_enabled { "on" } else { "off" }
    );

    let (processing_loop, handle) = ProcessingLoop::new(&settings, cancel_token.clone());
    let processing_loop = processing_loop.with_exit_on_close(exit_on_close);

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let final_handle = handle.clone();
    task_set.spawn(async move {
        let stats = processing_loop
            .run(&mut source)
            .await
            .context("Failed to open line source")?;
        info!("[Pipeline] Final: {}", stats);
        Ok(TaskName::Pipeline)
    });

    spawn_status_reporter(&mut task_set, handle.clone(), args.json, cancel_token.clone());
    if args.interactive {
        info!("Interactive mode: pause, resume, fft on|off|SIZE, buffer N, zoom X0 Y0 X1 Y1, reset, clear, send TEXT, quit");
        spawn_command_reader(&mut task_set, handle, cancel_token.clone());
    }

    run_supervisor(&mut task_set, cancel_token).await?;

    if args.json {
        report_status(&final_handle.snapshot(), true);
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Logs go to stderr so --json output on stdout stays machine-readable.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = build_config(&args)?;

    if args.print_config {
        print!("{}", config.to_toml().context("Failed to serialise config")?);
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, shutting down...");
        shutdown_token.cancel();
    });

    if let Some(secs) = args.duration {
        let timer_token = cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = timer_token.cancelled() => {}
                () = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!("Run duration of {}s reached", secs);
                    timer_token.cancel();
                }
            }
        });
    }

    let settings = config.pipeline.clone();

    if let Some(address) = &args.tcp {
        info!("Connecting to {}", address);
        run_pipeline(TcpSource::from_address(address.clone()), settings, true, &args, cancel_token).await?;
    } else if args.stdin {
        info!("Reading lines from stdin");
        run_pipeline(StdinSource::new(), settings, true, &args, cancel_token).await?;
    } else if let Some(path) = &args.replay {
        let source = ReplaySource::from_file(path, Duration::from_millis(args.replay_delay_ms))
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        info!("Replaying {} line(s) from {}", source.len(), path.display());
        run_pipeline(source, settings, true, &args, cancel_token).await?;
    } else {
        let mut source = EmulatedSource::new(config.source.emulation)
            .with_polling(config.source.polling_hz, config.source.cutoff_hz);
        if let Some(seed) = config.source.seed {
            source = source.with_seed(seed);
        }
        run_pipeline(source, settings, false, &args, cancel_token).await?;
    }

    info!("linescope stopped");
    Ok(())
}
