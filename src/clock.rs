//! Monotonic nanosecond clock
//!
//! All timestamps in the crate live in one clock domain: nanoseconds since
//! the session clock was created, taken from the host monotonic clock.
//! Wall-clock adjustments never move these values and they never decrease.

use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors raised while acquiring the clock
#[derive(Error, Debug)]
pub enum ClockError {
    /// The host monotonic clock went backward during the startup self-check.
    /// There is no degraded mode; measurement without a monotonic clock is
    /// meaningless.
    #[error("monotonic clock unavailable: {0}")]
    ClockUnavailable(&'static str),
}

/// Monotonic high-resolution clock with a fixed origin.
///
/// Cheap to copy; copies share the origin, so timestamps from clones are
/// directly comparable.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Acquire the monotonic clock, failing fast if the host clock
    /// misbehaves.
    ///
    /// Performs a two-read self-check: the second reading must not precede
    /// the first. `std::time::Instant` guarantees this on supported
    /// platforms, so failure here indicates a broken host.
    pub fn try_new() -> Result<Self, ClockError> {
        let first = Instant::now();
        let second = Instant::now();
        if second < first {
            return Err(ClockError::ClockUnavailable(
                "clock went backward between consecutive reads",
            ));
        }
        Ok(Self { origin: first })
    }

    /// Current timestamp in nanoseconds since the clock origin.
    ///
    /// Saturates at `u64::MAX` (≈ 584 years of session time).
    #[inline]
    pub fn now_ns(&self) -> u64 {
        let elapsed = self.origin.elapsed();
        elapsed
            .as_secs()
            .saturating_mul(1_000_000_000)
            .saturating_add(u64::from(elapsed.subsec_nanos()))
    }

    /// Sleep until `deadline_ns`, spinning for the final `busy_wait_ns`.
    ///
    /// Blocking sleeps carry wake-up scheduling latency that dominates
    /// short waits, so the tail of the wait is a spin loop. A deadline
    /// already in the past returns immediately (no drift compensation).
    pub fn wait_until(&self, deadline_ns: u64, busy_wait_ns: u64) {
        let sleep_until = deadline_ns.saturating_sub(busy_wait_ns);
        let now = self.now_ns();
        if now < sleep_until {
            std::thread::sleep(Duration::from_nanos(sleep_until - now));
        }
        while self.now_ns() < deadline_ns {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_acquisition() {
        let clock = MonotonicClock::try_new().expect("monotonic clock should be available");
        let t = clock.now_ns();
        assert!(t < 1_000_000_000, "fresh clock should be near its origin");
    }

    #[test]
    fn test_clock_never_goes_backward() {
        let clock = MonotonicClock::try_new().unwrap();
        let mut prev = clock.now_ns();
        for _ in 0..10_000 {
            let now = clock.now_ns();
            assert!(now >= prev, "clock went backward: {} < {}", now, prev);
            prev = now;
        }
    }

    #[test]
    fn test_copies_share_origin() {
        let clock = MonotonicClock::try_new().unwrap();
        let copy = clock;
        let a = clock.now_ns();
        let b = copy.now_ns();
        assert!(b >= a);
        // Readings stay in the same domain: a fresh clock would restart
        // near zero, a copy keeps counting.
        std::thread::sleep(Duration::from_millis(5));
        assert!(copy.now_ns() >= a + 4_000_000);
    }

    #[test]
    fn test_wait_until_past_deadline_returns_immediately() {
        let clock = MonotonicClock::try_new().unwrap();
        std::thread::sleep(Duration::from_millis(1));
        let before = clock.now_ns();
        clock.wait_until(0, 0);
        let after = clock.now_ns();
        assert!(after - before < 1_000_000, "past deadline must not block");
    }

    #[test]
    fn test_wait_until_reaches_deadline() {
        let clock = MonotonicClock::try_new().unwrap();
        let deadline = clock.now_ns() + 2_000_000; // 2ms
        clock.wait_until(deadline, 50_000);
        assert!(clock.now_ns() >= deadline);
    }
}
