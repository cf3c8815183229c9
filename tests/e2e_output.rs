//! E2E tests for the output surfaces: CSV dump and console report
//!
//! Runs small simulator sessions end to end and checks that what lands in
//! the CSV file and the rendered report matches the session result.

use looplat::config::{BackendSelect, RunConfiguration, SimMode};
use looplat::output::{csv as csv_out, report};
use looplat::session::{CancelToken, Session, SessionResult};

fn run_sim(mode: SimMode, base_us: u64, jitter_us: u64, samples: u64) -> SessionResult {
    let config = RunConfiguration {
        rate_hz: 500.0,
        duration_secs: 0.0,
        sample_count: Some(samples),
        pulse_width_us: 100,
        timeout_us: 1_000,
        busy_wait_us: 0,
        backend: BackendSelect::Sim {
            mode,
            base_us,
            jitter_us,
            seed: 42,
        },
    };
    Session::new(config).run(&CancelToken::new()).unwrap()
}

#[test]
fn test_csv_round_trips_the_sample_sequence() {
    let result = run_sim(SimMode::Const, 400, 0, 8);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");
    csv_out::write_samples_to_path(&path, &result.samples).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(
        reader.headers().unwrap(),
        &csv::StringRecord::from(csv_out::HEADERS.to_vec())
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), result.samples.len());
    for (row, sample) in rows.iter().zip(result.samples.iter()) {
        assert_eq!(row[0].parse::<u64>().unwrap(), sample.sequence_index);
        assert_eq!(row[1].parse::<u64>().unwrap(), sample.assert_time_ns);
        assert_eq!(row[3].parse::<u64>().unwrap(), 400_000);
        assert_eq!(&row[4], "success");
    }
}

#[test]
fn test_csv_keeps_misses_distinguishable() {
    // 400 µs delay against a 100 µs timeout: every row is a miss with
    // empty observe/latency cells.
    let config = RunConfiguration {
        rate_hz: 500.0,
        duration_secs: 0.0,
        sample_count: Some(4),
        pulse_width_us: 50,
        timeout_us: 100,
        busy_wait_us: 0,
        backend: BackendSelect::Sim {
            mode: SimMode::Const,
            base_us: 400,
            jitter_us: 0,
            seed: 42,
        },
    };
    let result = Session::new(config).run(&CancelToken::new()).unwrap();

    let mut buf = Vec::new();
    csv_out::write_samples(&mut buf, &result.samples).unwrap();
    let text = String::from_utf8(buf).unwrap();
    for line in text.lines().skip(1) {
        assert!(line.ends_with(",,,timeout"), "unexpected row: {}", line);
    }
}

#[test]
fn test_report_matches_the_summary() {
    let result = run_sim(SimMode::LogNormal, 400, 150, 50);
    let text = report::render_summary(&result);
    assert!(text.contains("Status: completed"));
    assert!(text.contains("Total samples: 50"));
    assert!(text.contains("P50="));
    assert!(text.contains("Mean±σ"));

    let hist = report::render_histogram(&result.samples, &result.summary);
    assert!(hist.contains("latency histogram"));
    assert!(hist.contains("<- P50"));
}

#[test]
fn test_summary_serializes_to_json() {
    let result = run_sim(SimMode::Const, 400, 0, 5);
    let json = serde_json::to_string(&result.summary).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["count_total"], 5);
    assert_eq!(value["count_success"], 5);
    assert_eq!(value["percentiles"][0]["pct"], 50.0);
    assert_eq!(value["percentiles"][0]["value_ns"], 400_000.0);
}
