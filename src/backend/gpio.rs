//! Raspberry Pi GPIO backends (feature `hardware`)
//!
//! Two variants over the same wiring:
//! - [`DirectLineBackend`]: write the output pin, then busy-poll the input
//!   level for the first `busy_wait_ns` of the wait before falling back to
//!   the kernel's blocking edge wait. Busy-waiting trades CPU for reduced
//!   wake-up jitter on short waits.
//! - [`TimestampedBackend`]: block on the kernel edge event and use its
//!   kernel-captured timestamp instead of the instant control returns to
//!   user space, shrinking the user-space component of the measurement.
//!
//! Note: `rppal` always targets the Pi's primary gpiochip; the configured
//! chip name participates in the ownership registry only.

use std::time::Duration;

use rppal::gpio::{Event, Gpio, InputPin, OutputPin, Trigger};

use super::claim::ClaimGuard;
use super::{BackendFault, EdgeWaitError, Level, LineBackend};
use crate::clock::MonotonicClock;

impl From<rppal::gpio::Error> for BackendFault {
    fn from(e: rppal::gpio::Error) -> Self {
        BackendFault::Device(e.to_string())
    }
}

fn open_pins(out_line: u8, in_line: u8) -> rppal::gpio::Result<(OutputPin, InputPin)> {
    let gpio = Gpio::new()?;
    let out = gpio.get(out_line)?.into_output_low();
    let mut input = gpio.get(in_line)?.into_input_pulldown();
    input.set_interrupt(Trigger::RisingEdge, None)?;
    Ok((out, input))
}

/// Kernel CLOCK_MONOTONIC reading, for mapping kernel event timestamps
/// into the session clock domain.
fn kernel_monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64)
}

/// Direct GPIO line access with hybrid busy/blocking edge wait
pub struct DirectLineBackend {
    out: OutputPin,
    input: InputPin,
    busy_wait_ns: u64,
    clock: MonotonicClock,
    _claim: ClaimGuard,
}

impl DirectLineBackend {
    pub fn open(
        out_line: u8,
        in_line: u8,
        busy_wait_ns: u64,
        clock: MonotonicClock,
        claim: ClaimGuard,
    ) -> rppal::gpio::Result<Self> {
        let (out, input) = open_pins(out_line, in_line)?;
        Ok(Self {
            out,
            input,
            busy_wait_ns,
            clock,
            _claim: claim,
        })
    }
}

impl LineBackend for DirectLineBackend {
    fn assert_line(&mut self, level: Level) -> Result<u64, BackendFault> {
        match level {
            Level::High => self.out.set_high(),
            Level::Low => self.out.set_low(),
        }
        Ok(self.clock.now_ns())
    }

    fn await_edge(&mut self, timeout_ns: u64) -> Result<u64, EdgeWaitError> {
        let start = self.clock.now_ns();
        let spin_deadline = start + self.busy_wait_ns.min(timeout_ns);

        // Busy phase: poll the line level directly. An edge caught here
        // avoids the scheduler wake-up latency of the blocking wait.
        loop {
            if self.input.read() == rppal::gpio::Level::High {
                let observe = self.clock.now_ns();
                // Drain the queued interrupt so it cannot satisfy the next
                // cycle's wait.
                let _ = self.input.poll_interrupt(true, Some(Duration::ZERO));
                return Ok(observe);
            }
            if self.clock.now_ns() >= spin_deadline {
                break;
            }
            std::hint::spin_loop();
        }

        // Blocking fallback for the remaining timeout budget.
        let elapsed = self.clock.now_ns() - start;
        let remaining = timeout_ns.saturating_sub(elapsed);
        if remaining == 0 {
            return Err(EdgeWaitError::Timeout);
        }
        match self
            .input
            .poll_interrupt(true, Some(Duration::from_nanos(remaining)))
        {
            Ok(Some(_event)) => Ok(self.clock.now_ns()),
            Ok(None) => Err(EdgeWaitError::Timeout),
            Err(e) => Err(EdgeWaitError::Fault(e.into())),
        }
    }

    fn release(&mut self) -> Result<(), BackendFault> {
        self.out.set_low();
        Ok(())
    }
}

/// GPIO backend using kernel-captured edge timestamps.
///
/// The kernel stamps the event when the interrupt fires, not when the
/// waiting process is scheduled back in, so the observe timestamp excludes
/// most of the user-space wake-up latency.
pub struct TimestampedBackend {
    out: OutputPin,
    input: InputPin,
    clock: MonotonicClock,
    /// `kernel CLOCK_MONOTONIC - session clock` at construction; maps
    /// kernel event timestamps into the session domain.
    kernel_offset_ns: i64,
    _claim: ClaimGuard,
}

impl TimestampedBackend {
    pub fn open(
        out_line: u8,
        in_line: u8,
        clock: MonotonicClock,
        claim: ClaimGuard,
    ) -> rppal::gpio::Result<Self> {
        let (out, input) = open_pins(out_line, in_line)?;
        let kernel_offset_ns = kernel_monotonic_ns() as i64 - clock.now_ns() as i64;
        Ok(Self {
            out,
            input,
            clock,
            kernel_offset_ns,
            _claim: claim,
        })
    }

    fn event_to_session_ns(&self, event: &Event) -> u64 {
        let kernel_ns = event.timestamp.as_nanos() as i64;
        (kernel_ns - self.kernel_offset_ns).max(0) as u64
    }
}

impl LineBackend for TimestampedBackend {
    fn assert_line(&mut self, level: Level) -> Result<u64, BackendFault> {
        match level {
            Level::High => self.out.set_high(),
            Level::Low => self.out.set_low(),
        }
        Ok(self.clock.now_ns())
    }

    fn await_edge(&mut self, timeout_ns: u64) -> Result<u64, EdgeWaitError> {
        match self
            .input
            .poll_interrupt(true, Some(Duration::from_nanos(timeout_ns)))
        {
            Ok(Some(event)) => Ok(self.event_to_session_ns(&event)),
            Ok(None) => Err(EdgeWaitError::Timeout),
            Err(e) => Err(EdgeWaitError::Fault(e.into())),
        }
    }

    fn release(&mut self) -> Result<(), BackendFault> {
        self.out.set_low();
        Ok(())
    }
}
