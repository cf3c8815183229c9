//! Console report: summary lines and an ASCII latency histogram
//!
//! Latencies are reported in microseconds; at GPIO loopback scale that is
//! the readable unit, with nanosecond precision preserved in the CSV dump.

use crate::driver::Sample;
use crate::session::{SessionResult, SessionStatus};
use crate::stats::SummaryStatistics;

/// Histogram bin count
const HISTOGRAM_BINS: usize = 20;

/// Maximum bar width in characters
const HISTOGRAM_BAR_WIDTH: usize = 50;

fn us(ns: f64) -> f64 {
    ns / 1_000.0
}

fn pct_label(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("P{}", pct as u64)
    } else {
        format!("P{}", pct)
    }
}

/// Render the result summary, mirroring the layout of the CSV-less quick
/// look: counts, miss rate, percentiles, extrema, moments.
pub fn render_summary(result: &SessionResult) -> String {
    let s = &result.summary;
    let mut out = String::new();

    let status = match result.status {
        SessionStatus::Completed => "completed",
        SessionStatus::Cancelled => "cancelled (partial results)",
    };
    out.push_str(&format!("Status: {}\n", status));
    out.push_str(&format!(
        "RT scheduling: {}\n",
        if result.rt_elevated {
            "elevated (SCHED_FIFO)"
        } else {
            "not elevated"
        }
    ));
    out.push_str(&format!("Total samples: {}\n", s.count_total));
    out.push_str(&format!("Successful: {}\n", s.count_success));
    out.push_str(&format!(
        "Missed: {} ({:.1}%)\n",
        s.count_miss,
        s.miss_rate * 100.0
    ));

    if s.count_success == 0 {
        out.push_str("No successful samples; check wiring/backend setup.\n");
        return out;
    }

    let pcts: Vec<String> = s
        .percentiles
        .iter()
        .map(|pv| format!("{}={:.1}", pct_label(pv.pct), us(pv.value_ns)))
        .collect();
    out.push_str(&format!("Latency (µs): {}\n", pcts.join("  ")));
    if let (Some(min), Some(max)) = (s.min_ns, s.max_ns) {
        out.push_str(&format!(
            "Min/Max (µs): {:.1} / {:.1}\n",
            us(min as f64),
            us(max as f64)
        ));
    }
    if let (Some(mean), Some(stddev)) = (s.mean_ns, s.stddev_ns) {
        out.push_str(&format!(
            "Mean±σ (µs): {:.1}±{:.1}\n",
            us(mean),
            us(stddev)
        ));
    }
    out
}

/// Render an ASCII histogram of successful latencies with percentile
/// markers on the bins they fall into.
pub fn render_histogram(samples: &[Sample], summary: &SummaryStatistics) -> String {
    let latencies: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.latency_ns)
        .map(|ns| ns as f64)
        .collect();
    if latencies.is_empty() {
        return "latency histogram: no successful samples\n".to_string();
    }

    let min = latencies.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = latencies.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    // Degenerate range: everything in one bin.
    let bins = if max > min { HISTOGRAM_BINS } else { 1 };
    let bin_width = if max > min {
        (max - min) / bins as f64
    } else {
        1.0
    };

    let bin_of = |v: f64| -> usize { (((v - min) / bin_width) as usize).min(bins - 1) };

    let mut counts = vec![0usize; bins];
    for &v in &latencies {
        counts[bin_of(v)] += 1;
    }

    let mut markers: Vec<Vec<String>> = vec![Vec::new(); bins];
    for pv in &summary.percentiles {
        markers[bin_of(pv.value_ns)].push(pct_label(pv.pct));
    }

    let peak = counts.iter().copied().max().unwrap_or(1).max(1);
    let mut out = String::from("latency histogram (µs)\n");
    for (i, &count) in counts.iter().enumerate() {
        let lo = min + i as f64 * bin_width;
        let hi = lo + bin_width;
        let bar_len = if count == 0 {
            0
        } else {
            (count * HISTOGRAM_BAR_WIDTH).div_ceil(peak)
        };
        let mut line = format!(
            "{:>9.1} - {:>9.1} | {:<width$} {}",
            us(lo),
            us(hi),
            "#".repeat(bar_len),
            count,
            width = HISTOGRAM_BAR_WIDTH
        );
        if !markers[i].is_empty() {
            line.push_str(&format!("  <- {}", markers[i].join(", ")));
        }
        line.push('\n');
        out.push_str(&line);
    }
    out
}
