//! Pulse cycle driver
//!
//! Orchestrates one measurement cycle: wait for the cycle's fire time,
//! assert the output HIGH, wait for the input edge (or time out), hold the
//! pulse for the configured width, deassert, and emit one immutable
//! [`Sample`].
//!
//! Pacing is best-effort: fire times are `start + seq * period`, an
//! overrun cycle fires immediately, and no drift compensation is applied.
//! Deassertion is guaranteed on every exit path through a drop guard.

use serde::Serialize;

use crate::backend::{BackendFault, EdgeWaitError, Level, LineBackend};
use crate::clock::MonotonicClock;
use crate::config::RunConfiguration;

/// Why a cycle failed to produce a latency value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissReason {
    /// No edge observed within the per-sample timeout
    Timeout,
    /// The backend failed during the cycle (device error, broken pipe)
    BackendError,
}

/// Outcome of one measurement cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    Miss(MissReason),
}

impl Outcome {
    /// Stable label used in CSV output and logs
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Miss(MissReason::Timeout) => "timeout",
            Outcome::Miss(MissReason::BackendError) => "backend-error",
        }
    }
}

/// One measurement attempt. Immutable after emission.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    /// Ordinal position; contiguous ascending from 0
    pub sequence_index: u64,
    /// When the output was asserted (ns, session clock domain)
    pub assert_time_ns: u64,
    /// When the input edge was observed; `None` on a miss
    pub observe_time_ns: Option<u64>,
    /// `observe - assert`; `None` on a miss
    pub latency_ns: Option<u64>,
    pub outcome: Outcome,
}

impl Sample {
    /// Successful cycle with an observed edge
    pub fn success(sequence_index: u64, assert_time_ns: u64, observe_time_ns: u64) -> Self {
        Self {
            sequence_index,
            assert_time_ns,
            observe_time_ns: Some(observe_time_ns),
            latency_ns: Some(observe_time_ns.saturating_sub(assert_time_ns)),
            outcome: Outcome::Success,
        }
    }

    /// Cycle that produced no latency value
    pub fn miss(sequence_index: u64, assert_time_ns: u64, reason: MissReason) -> Self {
        Self {
            sequence_index,
            assert_time_ns,
            observe_time_ns: None,
            latency_ns: None,
            outcome: Outcome::Miss(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Guarantees the output line returns to LOW on every exit path.
///
/// The deassert lives here instead of being scattered across the
/// success/timeout/fault branches; dropping the guard (early return,
/// panic, cancellation unwinding) releases the line.
struct PulseGuard<'a> {
    backend: &'a mut dyn LineBackend,
    released: bool,
}

impl<'a> PulseGuard<'a> {
    fn new(backend: &'a mut dyn LineBackend) -> Self {
        Self {
            backend,
            released: false,
        }
    }

    fn await_edge(&mut self, timeout_ns: u64) -> Result<u64, EdgeWaitError> {
        self.backend.await_edge(timeout_ns)
    }

    fn release(&mut self) -> Result<(), BackendFault> {
        self.released = true;
        self.backend.release()
    }
}

impl Drop for PulseGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.backend.release() {
                tracing::warn!(error = %e, "deassert on drop failed");
            }
        }
    }
}

/// Drives measurement cycles against one backend at a fixed target rate
pub struct PulseDriver {
    backend: Box<dyn LineBackend>,
    clock: MonotonicClock,
    start_ns: u64,
    period_ns: u64,
    pulse_width_ns: u64,
    timeout_ns: u64,
    busy_wait_ns: u64,
}

impl PulseDriver {
    /// Create a driver; `start_ns` anchors the fire-time schedule.
    pub fn new(
        backend: Box<dyn LineBackend>,
        clock: MonotonicClock,
        config: &RunConfiguration,
        start_ns: u64,
    ) -> Self {
        Self {
            backend,
            clock,
            start_ns,
            period_ns: config.period_ns(),
            pulse_width_ns: config.pulse_width_ns(),
            timeout_ns: config.timeout_ns(),
            busy_wait_ns: config.busy_wait_ns(),
        }
    }

    /// Run one full cycle and emit its Sample.
    ///
    /// Never returns an error: per-cycle failures are data (a Miss), not
    /// session failures.
    pub fn run_cycle(&mut self, sequence_index: u64) -> Sample {
        let fire_ns = self
            .start_ns
            .saturating_add(sequence_index.saturating_mul(self.period_ns));
        self.clock.wait_until(fire_ns, self.busy_wait_ns);

        let assert_time_ns = match self.backend.assert_line(Level::High) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(seq = sequence_index, error = %e, "output assert failed");
                return Sample::miss(
                    sequence_index,
                    self.clock.now_ns(),
                    MissReason::BackendError,
                );
            }
        };

        let mut pulse = PulseGuard::new(self.backend.as_mut());

        let sample = match pulse.await_edge(self.timeout_ns) {
            Ok(observe_time_ns) => {
                tracing::trace!(
                    seq = sequence_index,
                    latency_ns = observe_time_ns.saturating_sub(assert_time_ns),
                    "edge observed"
                );
                Sample::success(sequence_index, assert_time_ns, observe_time_ns)
            }
            Err(EdgeWaitError::Timeout) => {
                tracing::debug!(seq = sequence_index, timeout_ns = self.timeout_ns, "miss");
                Sample::miss(sequence_index, assert_time_ns, MissReason::Timeout)
            }
            Err(EdgeWaitError::Fault(e)) => {
                tracing::warn!(seq = sequence_index, error = %e, "backend fault during edge wait");
                Sample::miss(sequence_index, assert_time_ns, MissReason::BackendError)
            }
        };

        // Hold the pulse for the full configured width from the assert
        // instant, independent of the edge-wait outcome, then deassert.
        self.clock.wait_until(
            assert_time_ns.saturating_add(self.pulse_width_ns),
            self.busy_wait_ns,
        );
        if let Err(e) = pulse.release() {
            tracing::warn!(seq = sequence_index, error = %e, "deassert failed");
        }

        sample
    }
}
