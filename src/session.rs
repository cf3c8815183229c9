//! Session controller
//!
//! Ties clock, backend, pulse driver and statistics engine together for
//! one measurement run: `Idle -> Running -> {Completed, Cancelled,
//! Failed}`. Configuration is validated and the backend constructed before
//! the first cycle; after that, per-cycle misses are data and never abort
//! the run. The `Failed` terminal state is the `Err` arm of [`Session::run`]
//! — a failed session has no samples, so no result value exists for it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::backend::{open_backend, BackendOpenError, LineBackend};
use crate::clock::{ClockError, MonotonicClock};
use crate::config::{ConfigError, RunConfiguration};
use crate::driver::{PulseDriver, Sample};
use crate::rt;
use crate::stats::{StatsEngine, SummaryStatistics};
use crate::DEFAULT_PERCENTILES;

/// Why a session could not start
#[derive(Error, Debug)]
pub enum SessionError {
    /// A configuration invariant was violated; rejected before `Running`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// No usable monotonic clock; fatal, no degraded mode.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// Backend construction failed (includes `ResourceBusy` on a line pair
    /// already owned by an active session).
    #[error(transparent)]
    Backend(#[from] BackendOpenError),
}

/// How a session that produced samples ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Duration elapsed or the sample count target was reached
    Completed,
    /// External cancellation observed between cycles; results are partial
    Cancelled,
}

/// Everything a finished session exposes.
///
/// Collaborators (CSV writer, plotter) receive read-only views of the
/// sample sequence and summary; the result owns both.
#[derive(Debug)]
pub struct SessionResult {
    /// Per-sample records in strict `sequence_index` order
    pub samples: Vec<Sample>,
    pub summary: SummaryStatistics,
    pub status: SessionStatus,
    /// Whether the RT-priority request was granted (metadata only;
    /// correctness never depends on it)
    pub rt_elevated: bool,
}

/// Cooperative cancellation flag, checked only at cycle boundaries so an
/// in-flight cycle always completes to its Sample.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread (signal
    /// handlers included).
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One measurement session over one line pair
pub struct Session {
    config: RunConfiguration,
    request_rt: bool,
}

impl Session {
    pub fn new(config: RunConfiguration) -> Self {
        Self {
            config,
            request_rt: false,
        }
    }

    /// Ask for SCHED_FIFO elevation at session start. The grant/deny
    /// outcome is recorded on the result, nothing else changes.
    pub fn with_rt_request(mut self, request_rt: bool) -> Self {
        self.request_rt = request_rt;
        self
    }

    /// Run the full session: validate, acquire clock, elevate (optional),
    /// construct the backend, then measure until duration/count/cancel.
    ///
    /// Ordinary misses never surface here; only pre-loop failures do.
    pub fn run(&self, cancel: &CancelToken) -> Result<SessionResult, SessionError> {
        self.config.validate()?;
        let clock = MonotonicClock::try_new()?;
        let rt_elevated = if self.request_rt {
            rt::request_realtime()
        } else {
            false
        };
        let backend = open_backend(&self.config, clock)?;
        Ok(self.run_loop(backend, clock, cancel, rt_elevated))
    }

    /// Run against an already-constructed backend.
    ///
    /// The seam that lets tests (and embedders) substitute any
    /// [`LineBackend`] without touching driver or session logic. The
    /// backend must share `clock`'s domain.
    pub fn run_with_backend(
        &self,
        backend: Box<dyn LineBackend>,
        clock: MonotonicClock,
        cancel: &CancelToken,
    ) -> Result<SessionResult, SessionError> {
        self.config.validate()?;
        Ok(self.run_loop(backend, clock, cancel, false))
    }

    fn run_loop(
        &self,
        backend: Box<dyn LineBackend>,
        clock: MonotonicClock,
        cancel: &CancelToken,
        rt_elevated: bool,
    ) -> SessionResult {
        let start_ns = clock.now_ns();
        let mut driver = PulseDriver::new(backend, clock, &self.config, start_ns);
        let mut engine = StatsEngine::new();
        let mut samples: Vec<Sample> = Vec::new();

        let unbounded = self.config.duration_secs == 0.0;
        let deadline_ns = start_ns.saturating_add((self.config.duration_secs * 1e9) as u64);

        tracing::info!(
            rate_hz = self.config.rate_hz,
            duration_secs = self.config.duration_secs,
            sample_count = ?self.config.sample_count,
            rt_elevated,
            "session running"
        );

        let mut status = SessionStatus::Completed;
        for sequence_index in 0u64.. {
            if cancel.is_cancelled() {
                status = SessionStatus::Cancelled;
                break;
            }
            if let Some(target) = self.config.sample_count {
                if sequence_index >= target {
                    break;
                }
            }
            if !unbounded && clock.now_ns() >= deadline_ns {
                break;
            }

            let sample = driver.run_cycle(sequence_index);
            engine.record(&sample);
            samples.push(sample);
        }

        let summary = engine.summary(DEFAULT_PERCENTILES);
        tracing::info!(
            status = ?status,
            total = summary.count_total,
            success = summary.count_success,
            miss_rate = summary.miss_rate,
            "session finished"
        );

        SessionResult {
            samples,
            summary,
            status,
            rt_elevated,
        }
    }
}
