//! Run configuration and invariant validation
//!
//! A `RunConfiguration` is immutable input to a measurement session. It is
//! validated once, before the session enters its loop; every invariant
//! violation is rejected up front so the measurement loop never has to
//! re-check parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DEFAULT_BUSY_WAIT_US, DEFAULT_PULSE_WIDTH_US, DEFAULT_RATE_HZ, DEFAULT_TIMEOUT_US};

/// Configuration errors raised before a session starts
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("pulse rate must be positive, got {0} Hz")]
    NonPositiveRate(f64),

    #[error("duration must be non-negative, got {0} s")]
    NegativeDuration(f64),

    #[error("pulse width ({pulse_us} µs) must be shorter than the inter-pulse period ({period_us} µs)")]
    PulseWiderThanPeriod { pulse_us: u64, period_us: u64 },

    #[error("timeout ({timeout_us} µs) must exceed the pulse width ({pulse_us} µs)")]
    TimeoutWithinPulse { timeout_us: u64, pulse_us: u64 },
}

/// Simulator delay distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimMode {
    /// Every delay equals the base latency
    Const,
    /// Base plus a uniform draw from `0..=jitter`
    Uniform,
    /// Gaussian around base with σ = jitter/3 (jitter as a 3σ range)
    Normal,
    /// Lognormal with median ≈ base, spread from jitter
    LogNormal,
    /// Normal case mixed with rare high-magnitude spikes (system stalls)
    Heavy,
}

/// Backend selection plus backend-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendSelect {
    /// Deterministic simulator: edges synthesized from a seeded distribution
    Sim {
        mode: SimMode,
        /// Base latency (µs) for the rising edge
        base_us: u64,
        /// Jitter scale (µs)
        jitter_us: u64,
        /// RNG seed; same seed + same call sequence = identical samples
        seed: u64,
    },
    /// Direct GPIO line access (write + edge wait / busy poll)
    Gpio {
        chip: String,
        out_line: u8,
        in_line: u8,
    },
    /// GPIO with kernel-captured edge timestamps
    Timestamped {
        chip: String,
        out_line: u8,
        in_line: u8,
    },
}

impl BackendSelect {
    /// Physical line identifiers claimed by this backend, if any.
    ///
    /// The simulator owns no shared resource and returns `None`.
    pub fn line_pair(&self) -> Option<(&str, u8, u8)> {
        match self {
            BackendSelect::Sim { .. } => None,
            BackendSelect::Gpio {
                chip,
                out_line,
                in_line,
            }
            | BackendSelect::Timestamped {
                chip,
                out_line,
                in_line,
            } => Some((chip.as_str(), *out_line, *in_line)),
        }
    }
}

/// Immutable input to a measurement session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Pulse rate (Hz)
    pub rate_hz: f64,
    /// Test duration in seconds; 0 = run until cancelled
    pub duration_secs: f64,
    /// Stop after this many samples regardless of duration
    pub sample_count: Option<u64>,
    /// HIGH pulse hold width (µs)
    pub pulse_width_us: u64,
    /// Per-sample edge-wait timeout (µs)
    pub timeout_us: u64,
    /// Busy-wait threshold (µs); waits shorter than this spin
    pub busy_wait_us: u64,
    /// Backend and its parameters
    pub backend: BackendSelect,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            rate_hz: DEFAULT_RATE_HZ,
            duration_secs: 10.0,
            sample_count: None,
            pulse_width_us: DEFAULT_PULSE_WIDTH_US,
            timeout_us: DEFAULT_TIMEOUT_US,
            busy_wait_us: DEFAULT_BUSY_WAIT_US,
            backend: BackendSelect::Sim {
                mode: SimMode::LogNormal,
                base_us: 400,
                jitter_us: 150,
                seed: 42,
            },
        }
    }
}

impl RunConfiguration {
    /// Inter-pulse period in nanoseconds
    pub fn period_ns(&self) -> u64 {
        (1e9 / self.rate_hz.max(1e-6)) as u64
    }

    /// Pulse hold width in nanoseconds
    pub fn pulse_width_ns(&self) -> u64 {
        self.pulse_width_us * 1_000
    }

    /// Edge-wait timeout in nanoseconds
    pub fn timeout_ns(&self) -> u64 {
        self.timeout_us * 1_000
    }

    /// Busy-wait threshold in nanoseconds
    pub fn busy_wait_ns(&self) -> u64 {
        self.busy_wait_us * 1_000
    }

    /// Validate all session invariants.
    ///
    /// Called once before the session enters `Running`; a rejected
    /// configuration never produces samples.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_hz <= 0.0 || !self.rate_hz.is_finite() {
            return Err(ConfigError::NonPositiveRate(self.rate_hz));
        }
        if self.duration_secs < 0.0 || !self.duration_secs.is_finite() {
            return Err(ConfigError::NegativeDuration(self.duration_secs));
        }
        let period_us = self.period_ns() / 1_000;
        if self.pulse_width_us >= period_us {
            return Err(ConfigError::PulseWiderThanPeriod {
                pulse_us: self.pulse_width_us,
                period_us,
            });
        }
        if self.timeout_us <= self.pulse_width_us {
            return Err(ConfigError::TimeoutWithinPulse {
                timeout_us: self.timeout_us,
                pulse_us: self.pulse_width_us,
            });
        }
        Ok(())
    }
}
