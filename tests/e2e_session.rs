//! E2E tests for full measurement sessions over the simulator backend
//!
//! Covers clean runs, all-miss runs, line-pair ownership and cooperative
//! cancellation, driving everything through the public session API.

use looplat::backend::claim;
use looplat::backend::{BackendFault, BackendOpenError, EdgeWaitError, Level, LineBackend};
use looplat::clock::MonotonicClock;
use looplat::config::{BackendSelect, RunConfiguration, SimMode};
use looplat::session::{CancelToken, Session, SessionError, SessionStatus};

fn const_sim_config(base_us: u64, samples: u64) -> RunConfiguration {
    RunConfiguration {
        rate_hz: 500.0,
        duration_secs: 0.0,
        sample_count: Some(samples),
        pulse_width_us: 100,
        timeout_us: 1_000,
        busy_wait_us: 0,
        backend: BackendSelect::Sim {
            mode: SimMode::Const,
            base_us,
            jitter_us: 0,
            seed: 42,
        },
    }
}

#[test]
fn test_constant_latency_run_is_exact() {
    let result = Session::new(const_sim_config(400, 10))
        .run(&CancelToken::new())
        .unwrap();

    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.samples.len(), 10);
    for sample in &result.samples {
        assert_eq!(sample.latency_ns, Some(400_000));
    }

    let s = &result.summary;
    assert_eq!(s.count_total, 10);
    assert_eq!(s.count_success, 10);
    assert_eq!(s.miss_rate, 0.0);
    assert_eq!(s.min_ns, Some(400_000));
    assert_eq!(s.max_ns, Some(400_000));
    assert_eq!(s.percentile(50.0), Some(400_000.0));
    assert_eq!(s.percentile(99.0), Some(400_000.0));
    assert_eq!(s.mean_ns, Some(400_000.0));
    assert_eq!(s.stddev_ns, Some(0.0));
}

#[test]
fn test_latency_beyond_timeout_is_all_misses() {
    // 400 µs simulated delay against a 100 µs timeout: every cycle misses,
    // the session still completes and counts them.
    let config = RunConfiguration {
        pulse_width_us: 50,
        timeout_us: 100,
        ..const_sim_config(400, 10)
    };
    let result = Session::new(config).run(&CancelToken::new()).unwrap();

    assert_eq!(result.status, SessionStatus::Completed);
    let s = &result.summary;
    assert_eq!(s.count_total, 10);
    assert_eq!(s.count_success, 0);
    assert_eq!(s.count_miss, 10);
    assert_eq!(s.miss_rate, 1.0);
    assert!(s.percentiles.is_empty());
    assert_eq!(s.mean_ns, None);
    assert_eq!(s.min_ns, None);
    for sample in &result.samples {
        assert!(sample.latency_ns.is_none());
        assert!(sample.observe_time_ns.is_none());
    }
}

#[test]
fn test_busy_line_pair_is_rejected_before_running() {
    let _held = claim::claim_pair("e2e-chip", 18, 23).unwrap();
    let config = RunConfiguration {
        backend: BackendSelect::Gpio {
            chip: "e2e-chip".into(),
            out_line: 18,
            in_line: 23,
        },
        ..RunConfiguration::default()
    };
    let err = Session::new(config).run(&CancelToken::new()).unwrap_err();
    match err {
        SessionError::Backend(BackendOpenError::ResourceBusy {
            chip,
            out_line,
            in_line,
        }) => {
            assert_eq!(chip, "e2e-chip");
            assert_eq!((out_line, in_line), (18, 23));
        }
        other => panic!("expected ResourceBusy, got {}", other),
    }
}

#[test]
fn test_sample_sequence_is_contiguous_ascending() {
    let config = RunConfiguration {
        backend: BackendSelect::Sim {
            mode: SimMode::LogNormal,
            base_us: 400,
            jitter_us: 150,
            seed: 7,
        },
        ..const_sim_config(0, 25)
    };
    let result = Session::new(config).run(&CancelToken::new()).unwrap();
    assert_eq!(result.samples.len(), 25);
    for (i, sample) in result.samples.iter().enumerate() {
        assert_eq!(sample.sequence_index, i as u64);
    }
    // Assert times never go backwards.
    for pair in result.samples.windows(2) {
        assert!(pair[0].assert_time_ns <= pair[1].assert_time_ns);
    }
}

#[test]
fn test_same_seed_reproduces_the_latency_stream() {
    let config = RunConfiguration {
        backend: BackendSelect::Sim {
            mode: SimMode::LogNormal,
            base_us: 400,
            jitter_us: 150,
            seed: 42,
        },
        ..const_sim_config(0, 20)
    };
    let run = |cfg: &RunConfiguration| {
        Session::new(cfg.clone())
            .run(&CancelToken::new())
            .unwrap()
            .samples
            .iter()
            .map(|s| s.latency_ns)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(&config), run(&config));
}

/// Delegating backend that cancels the session token on its nth assert.
struct CancellingBackend<B> {
    inner: B,
    asserts: u64,
    cancel_at: u64,
    cancel: CancelToken,
}

impl<B: LineBackend> LineBackend for CancellingBackend<B> {
    fn assert_line(&mut self, level: Level) -> Result<u64, BackendFault> {
        if level == Level::High {
            self.asserts += 1;
            if self.asserts == self.cancel_at {
                self.cancel.cancel();
            }
        }
        self.inner.assert_line(level)
    }

    fn await_edge(&mut self, timeout_ns: u64) -> Result<u64, EdgeWaitError> {
        self.inner.await_edge(timeout_ns)
    }

    fn release(&mut self) -> Result<(), BackendFault> {
        self.inner.release()
    }
}

#[test]
fn test_cancellation_mid_run_keeps_the_in_flight_cycle() {
    // Cancel during the 5th cycle's assert. That cycle must still complete
    // to a full Sample; the loop stops at the next boundary.
    let run_cancelled_at_five = || {
        let config = const_sim_config(400, 1_000);
        let clock = MonotonicClock::try_new().unwrap();
        let cancel = CancelToken::new();
        let backend = CancellingBackend {
            inner: looplat::backend::sim::SimBackend::new(clock, SimMode::Const, 400, 0, 42),
            asserts: 0,
            cancel_at: 5,
            cancel: cancel.clone(),
        };
        Session::new(config)
            .run_with_backend(Box::new(backend), clock, &cancel)
            .unwrap()
    };

    let result = run_cancelled_at_five();
    assert_eq!(result.status, SessionStatus::Cancelled);
    assert_eq!(result.samples.len(), 5);
    assert_eq!(result.summary.count_total, 5);
    assert!(result.samples[4].is_success(), "in-flight cycle must finish");

    // Deterministic: cancelling at the same cycle yields the same partial
    // result, sample for sample.
    let again = run_cancelled_at_five();
    assert_eq!(again.samples.len(), result.samples.len());
    for (a, b) in result.samples.iter().zip(again.samples.iter()) {
        assert_eq!(a.latency_ns, b.latency_ns);
    }
}

#[test]
fn test_invalid_configuration_never_produces_samples() {
    let config = RunConfiguration {
        timeout_us: 50, // below the 100 µs pulse width
        ..const_sim_config(400, 10)
    };
    let err = Session::new(config).run(&CancelToken::new()).unwrap_err();
    assert!(matches!(err, SessionError::InvalidConfig(_)));
}
