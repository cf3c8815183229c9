//! Deterministic loopback simulator
//!
//! Models the propagation delay of a physical loopback wire with a
//! configurable distribution. A LOW→HIGH transition on the simulated
//! output schedules a rising edge `delay` nanoseconds later; `await_edge`
//! synthesizes the observe timestamp instead of sleeping, so simulated
//! sessions run at full speed and are reproducible: same seed + same call
//! sequence ⇒ identical latency stream.
//!
//! Distribution semantics:
//! - `const`: always the base latency
//! - `uniform`: base + uniform draw from `0..=jitter`
//! - `normal`: Gaussian around base, jitter interpreted as a 3σ range
//! - `lognormal`: median ≈ base, spread `max(jitter, 0.1·base)`
//! - `heavy`: the normal case mixed with a low-probability spike component
//!   (rare system stalls an order of magnitude above the base)

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Normal};

use super::{BackendFault, EdgeWaitError, Level, LineBackend};
use crate::clock::MonotonicClock;
use crate::config::SimMode;

/// Probability of a heavy-tail spike per pulse
const HEAVY_SPIKE_PROB: f64 = 0.05;

/// Spike magnitude relative to the base latency
const HEAVY_SPIKE_SCALE: f64 = 10.0;

enum Delay {
    Const,
    Uniform,
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    Heavy {
        regular: Normal<f64>,
        spike: Normal<f64>,
    },
}

/// Seeded delay model; one draw per simulated pulse.
pub struct LatencyModel {
    delay: Delay,
    base_ns: u64,
    jitter_ns: u64,
    rng: ChaCha8Rng,
}

impl LatencyModel {
    /// Build a model. `base_us`/`jitter_us` follow the CLI surface and are
    /// converted to nanoseconds here.
    pub fn new(mode: SimMode, base_us: u64, jitter_us: u64, seed: u64) -> Self {
        let base_ns = base_us * 1_000;
        let jitter_ns = jitter_us * 1_000;
        let delay = match mode {
            SimMode::Const => Delay::Const,
            SimMode::Uniform => Delay::Uniform,
            SimMode::Normal => {
                // Jitter as a 3σ range: 99.7% of draws within base ± jitter.
                let sigma = jitter_ns as f64 / 3.0;
                Delay::Normal(
                    Normal::new(base_ns as f64, sigma).expect("finite normal parameters"),
                )
            }
            SimMode::LogNormal => {
                // Target median ≈ base with spread from jitter, minimum 10% CV.
                let median = if base_ns == 0 { 1_000.0 } else { base_ns as f64 };
                let target_std = (jitter_ns as f64).max(median * 0.1);
                let ln_sigma = (1.0 + (target_std / median).powi(2)).ln().sqrt();
                let ln_mu = median.ln() - 0.5 * ln_sigma * ln_sigma;
                Delay::LogNormal(
                    LogNormal::new(ln_mu, ln_sigma).expect("finite lognormal parameters"),
                )
            }
            SimMode::Heavy => {
                let regular = Normal::new(base_ns as f64, jitter_ns as f64 / 3.0)
                    .expect("finite normal parameters");
                let spike = Normal::new(
                    base_ns as f64 * HEAVY_SPIKE_SCALE,
                    jitter_ns as f64 * HEAVY_SPIKE_SCALE / 3.0,
                )
                .expect("finite spike parameters");
                Delay::Heavy { regular, spike }
            }
        };
        Self {
            delay,
            base_ns,
            jitter_ns,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draw one propagation delay in nanoseconds (clamped non-negative).
    pub fn sample_ns(&mut self) -> u64 {
        match &self.delay {
            Delay::Const => self.base_ns,
            Delay::Uniform => {
                if self.jitter_ns == 0 {
                    self.base_ns
                } else {
                    self.base_ns + self.rng.gen_range(0..=self.jitter_ns)
                }
            }
            Delay::Normal(dist) => dist.sample(&mut self.rng).max(0.0) as u64,
            Delay::LogNormal(dist) => dist.sample(&mut self.rng).max(0.0) as u64,
            Delay::Heavy { regular, spike } => {
                let dist = if self.rng.gen::<f64>() < HEAVY_SPIKE_PROB {
                    spike
                } else {
                    regular
                };
                dist.sample(&mut self.rng).max(0.0) as u64
            }
        }
    }
}

struct PendingEdge {
    assert_ns: u64,
    observe_ns: u64,
}

/// Simulated line pair.
///
/// Owns no shared resource; any number of simulator sessions may coexist.
pub struct SimBackend {
    clock: MonotonicClock,
    model: LatencyModel,
    level: Level,
    pending: Option<PendingEdge>,
}

impl SimBackend {
    pub fn new(
        clock: MonotonicClock,
        mode: SimMode,
        base_us: u64,
        jitter_us: u64,
        seed: u64,
    ) -> Self {
        Self {
            clock,
            model: LatencyModel::new(mode, base_us, jitter_us, seed),
            level: Level::Low,
            pending: None,
        }
    }
}

impl LineBackend for SimBackend {
    fn assert_line(&mut self, level: Level) -> Result<u64, BackendFault> {
        let now = self.clock.now_ns();
        // A LOW→HIGH transition is what propagates through the loopback
        // wire; re-asserting HIGH schedules nothing new.
        if self.level == Level::Low && level == Level::High {
            let delay = self.model.sample_ns();
            self.pending = Some(PendingEdge {
                assert_ns: now,
                observe_ns: now + delay,
            });
        }
        self.level = level;
        Ok(now)
    }

    fn await_edge(&mut self, timeout_ns: u64) -> Result<u64, EdgeWaitError> {
        match self.pending.take() {
            Some(edge) if edge.observe_ns - edge.assert_ns <= timeout_ns => Ok(edge.observe_ns),
            Some(edge) => {
                // The edge would have arrived after the deadline; it is
                // consumed so it cannot be misattributed to a later pulse.
                tracing::trace!(
                    delay_ns = edge.observe_ns - edge.assert_ns,
                    timeout_ns,
                    "simulated edge beyond timeout"
                );
                Err(EdgeWaitError::Timeout)
            }
            None => Err(EdgeWaitError::Timeout),
        }
    }

    fn release(&mut self) -> Result<(), BackendFault> {
        self.level = Level::Low;
        Ok(())
    }
}
