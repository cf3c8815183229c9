//! I/O backends for the loopback line pair
//!
//! Everything above this module sees one capability set:
//! - `assert_line(level)` — drive the output line, reporting when the edge
//!   actually left
//! - `await_edge(timeout)` — block until the paired input observes a rising
//!   edge, or time out
//! - `release()` — return the output line to LOW
//!
//! Variants:
//! - [`sim`] — deterministic simulator, edges synthesized from a seeded
//!   delay distribution
//! - [`gpio`] (feature `hardware`) — direct line access and
//!   kernel-timestamped edge events on a Raspberry Pi
//!
//! The pulse driver depends only on the [`LineBackend`] trait, never on a
//! concrete variant.

pub mod claim;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

use thiserror::Error;

use crate::clock::MonotonicClock;
use crate::config::{BackendSelect, RunConfiguration};

/// Logical level of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Backend-internal fault (device error, broken pipe).
///
/// Counted as a Miss by the cycle driver, never fatal to the session.
#[derive(Error, Debug)]
pub enum BackendFault {
    #[error("device error: {0}")]
    Device(String),
}

/// Outcome of an edge wait that did not observe an edge in time
#[derive(Error, Debug)]
pub enum EdgeWaitError {
    /// No edge within the timeout. An expected, countable outcome.
    #[error("no edge observed within the timeout")]
    Timeout,

    /// The backend itself failed during the wait.
    #[error(transparent)]
    Fault(#[from] BackendFault),
}

/// Errors raised while constructing a backend, before any cycle runs
#[derive(Error, Debug)]
pub enum BackendOpenError {
    /// The line pair is already owned by an active session.
    #[error("line pair {chip}:{out_line}/{in_line} is already owned by an active session")]
    ResourceBusy {
        chip: String,
        out_line: u8,
        in_line: u8,
    },

    /// Device setup failed (missing permissions, wrong chip, no hardware
    /// support compiled in).
    #[error("backend initialization failed: {0}")]
    Init(String),
}

/// Capability set shared by all backend variants.
///
/// Timestamps are nanoseconds in the session clock domain
/// ([`MonotonicClock`]). `assert_line` returns the instant the edge was
/// driven: the backend is the authority on when the stimulus left, so the
/// driver and the backend never disagree about the assert instant.
pub trait LineBackend: Send {
    /// Drive the output line to `level`, returning the assert timestamp.
    fn assert_line(&mut self, level: Level) -> Result<u64, BackendFault>;

    /// Wait for a rising edge on the input line for at most `timeout_ns`,
    /// returning the observe timestamp.
    fn await_edge(&mut self, timeout_ns: u64) -> Result<u64, EdgeWaitError>;

    /// Return the output line to LOW.
    fn release(&mut self) -> Result<(), BackendFault>;
}

/// Construct the backend selected by `config`.
///
/// Physical backends claim their line pair before touching the device, so
/// a busy pair is reported as [`BackendOpenError::ResourceBusy`] even when
/// device setup itself would have failed.
pub fn open_backend(
    config: &RunConfiguration,
    clock: MonotonicClock,
) -> Result<Box<dyn LineBackend>, BackendOpenError> {
    match &config.backend {
        BackendSelect::Sim {
            mode,
            base_us,
            jitter_us,
            seed,
        } => {
            tracing::info!(
                mode = ?mode,
                base_us,
                jitter_us,
                seed,
                "simulator backend ready"
            );
            Ok(Box::new(sim::SimBackend::new(
                clock, *mode, *base_us, *jitter_us, *seed,
            )))
        }
        BackendSelect::Gpio {
            chip,
            out_line,
            in_line,
        } => open_direct(chip, *out_line, *in_line, config.busy_wait_ns(), clock),
        BackendSelect::Timestamped {
            chip,
            out_line,
            in_line,
        } => open_timestamped(chip, *out_line, *in_line, clock),
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_direct(
    chip: &str,
    out_line: u8,
    in_line: u8,
    busy_wait_ns: u64,
    clock: MonotonicClock,
) -> Result<Box<dyn LineBackend>, BackendOpenError> {
    let claim = claim::claim_pair(chip, out_line, in_line)?;
    let backend = gpio::DirectLineBackend::open(out_line, in_line, busy_wait_ns, clock, claim)
        .map_err(|e| BackendOpenError::Init(e.to_string()))?;
    tracing::info!(out_line, in_line, "direct GPIO backend ready");
    Ok(Box::new(backend))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_timestamped(
    chip: &str,
    out_line: u8,
    in_line: u8,
    clock: MonotonicClock,
) -> Result<Box<dyn LineBackend>, BackendOpenError> {
    let claim = claim::claim_pair(chip, out_line, in_line)?;
    let backend = gpio::TimestampedBackend::open(out_line, in_line, clock, claim)
        .map_err(|e| BackendOpenError::Init(e.to_string()))?;
    tracing::info!(out_line, in_line, "timestamped GPIO backend ready");
    Ok(Box::new(backend))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_direct(
    chip: &str,
    out_line: u8,
    in_line: u8,
    _busy_wait_ns: u64,
    _clock: MonotonicClock,
) -> Result<Box<dyn LineBackend>, BackendOpenError> {
    // The busy check still applies: ownership is decided before asking
    // whether the device could even be opened.
    let _claim = claim::claim_pair(chip, out_line, in_line)?;
    Err(BackendOpenError::Init(
        "GPIO backends require building with the `hardware` feature on Linux".into(),
    ))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_timestamped(
    chip: &str,
    out_line: u8,
    in_line: u8,
    clock: MonotonicClock,
) -> Result<Box<dyn LineBackend>, BackendOpenError> {
    open_direct(chip, out_line, in_line, 0, clock)
}
