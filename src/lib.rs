//! looplat - GPIO loopback latency meter
//!
//! Measures user-space observed round-trip latency on a digital line pair:
//! an output line is pulsed HIGH and the time until the paired input line
//! reports the rising edge is recorded. Samples are collected at a
//! configured rate, summarized (P50/P95/P99, mean, σ, min/max, miss rate)
//! and optionally dumped to CSV.
//!
//! Backends: a seeded deterministic simulator, direct GPIO line access and
//! kernel-timestamped GPIO events (the latter two behind the `hardware`
//! feature).

pub mod backend;
pub mod clock;
pub mod config;
pub mod driver;
pub mod output;
pub mod rt;
pub mod session;
pub mod stats;

pub use backend::{open_backend, LineBackend};
pub use clock::MonotonicClock;
pub use config::{BackendSelect, RunConfiguration, SimMode};
pub use driver::{MissReason, Outcome, Sample};
pub use session::{CancelToken, Session, SessionError, SessionResult, SessionStatus};
pub use stats::{StatsEngine, SummaryStatistics};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Percentiles reported when the caller does not ask for a specific set
pub const DEFAULT_PERCENTILES: &[f64] = &[50.0, 95.0, 99.0, 99.9];

/// Default pulse rate (Hz)
pub const DEFAULT_RATE_HZ: f64 = 50.0;

/// Default HIGH pulse width (microseconds)
pub const DEFAULT_PULSE_WIDTH_US: u64 = 1_000;

/// Default per-sample edge-wait timeout (microseconds)
pub const DEFAULT_TIMEOUT_US: u64 = 100_000;

/// Default busy-wait threshold (microseconds); waits shorter than this spin
/// instead of sleeping
pub const DEFAULT_BUSY_WAIT_US: u64 = 50;
