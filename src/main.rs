//! looplat - GPIO loopback latency meter
//!
//! Command-line entry point: parse arguments, run one measurement
//! session, print the report (or JSON summary) and optionally dump the
//! per-sample CSV.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use looplat::config::{BackendSelect, RunConfiguration, SimMode};
use looplat::output::{csv, report};
use looplat::session::{CancelToken, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    /// Seeded deterministic simulator (no hardware needed)
    Sim,
    /// Direct GPIO line access
    Gpio,
    /// GPIO with kernel-captured edge timestamps
    Timestamped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SimModeArg {
    Const,
    Uniform,
    Normal,
    Lognormal,
    Heavy,
}

impl From<SimModeArg> for SimMode {
    fn from(mode: SimModeArg) -> Self {
        match mode {
            SimModeArg::Const => SimMode::Const,
            SimModeArg::Uniform => SimMode::Uniform,
            SimModeArg::Normal => SimMode::Normal,
            SimModeArg::Lognormal => SimMode::LogNormal,
            SimModeArg::Heavy => SimMode::Heavy,
        }
    }
}

/// Measure round-trip latency on a looped-back GPIO line pair.
#[derive(Parser, Debug)]
#[command(name = "looplat", version = looplat::VERSION, about)]
struct Args {
    /// I/O backend
    #[arg(long, value_enum, default_value_t = BackendArg::Sim)]
    backend: BackendArg,

    /// GPIO character device
    #[arg(long, default_value = "gpiochip0")]
    chip: String,

    /// Output line (BCM numbering)
    #[arg(long, default_value_t = 18)]
    out_line: u8,

    /// Input line (BCM numbering)
    #[arg(long, default_value_t = 23)]
    in_line: u8,

    /// Pulse rate in Hz
    #[arg(long, default_value_t = looplat::DEFAULT_RATE_HZ)]
    hz: f64,

    /// Test duration in seconds (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,

    /// Stop after this many samples regardless of duration
    #[arg(long)]
    samples: Option<u64>,

    /// HIGH pulse width in microseconds
    #[arg(long, default_value_t = looplat::DEFAULT_PULSE_WIDTH_US)]
    pulse_us: u64,

    /// Per-sample edge-wait timeout in microseconds
    #[arg(long, default_value_t = looplat::DEFAULT_TIMEOUT_US)]
    timeout_us: u64,

    /// Busy-wait threshold in microseconds
    #[arg(long, default_value_t = looplat::DEFAULT_BUSY_WAIT_US)]
    busy_wait_us: u64,

    /// Write the per-sample CSV to this path
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Request SCHED_FIFO real-time scheduling (needs CAP_SYS_NICE)
    #[arg(long)]
    rt: bool,

    /// Print the summary as JSON instead of the console report
    #[arg(long)]
    json: bool,

    /// Simulator delay distribution
    #[arg(long, value_enum, default_value_t = SimModeArg::Lognormal)]
    sim_mode: SimModeArg,

    /// Simulator base latency in microseconds
    #[arg(long, default_value_t = 400)]
    sim_base_us: u64,

    /// Simulator jitter scale in microseconds
    #[arg(long, default_value_t = 150)]
    sim_jitter_us: u64,

    /// Simulator RNG seed
    #[arg(long, default_value_t = 42)]
    sim_seed: u64,
}

impl Args {
    fn backend_select(&self) -> BackendSelect {
        match self.backend {
            BackendArg::Sim => BackendSelect::Sim {
                mode: self.sim_mode.into(),
                base_us: self.sim_base_us,
                jitter_us: self.sim_jitter_us,
                seed: self.sim_seed,
            },
            BackendArg::Gpio => BackendSelect::Gpio {
                chip: self.chip.clone(),
                out_line: self.out_line,
                in_line: self.in_line,
            },
            BackendArg::Timestamped => BackendSelect::Timestamped {
                chip: self.chip.clone(),
                out_line: self.out_line,
                in_line: self.in_line,
            },
        }
    }

    fn run_configuration(&self) -> RunConfiguration {
        RunConfiguration {
            rate_hz: self.hz,
            duration_secs: self.seconds,
            sample_count: self.samples,
            pulse_width_us: self.pulse_us,
            timeout_us: self.timeout_us,
            busy_wait_us: self.busy_wait_us,
            backend: self.backend_select(),
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("looplat=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = args.run_configuration();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        info!("cancellation requested");
        handler_token.cancel();
    })?;

    let result = Session::new(config)
        .with_rt_request(args.rt)
        .run(&cancel)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
    } else {
        print!("{}", report::render_summary(&result));
        println!();
        print!("{}", report::render_histogram(&result.samples, &result.summary));
    }

    if let Some(path) = &args.csv {
        csv::write_samples_to_path(path, &result.samples)?;
        println!("CSV written to {}", path.display());
    }

    Ok(())
}
