//! Streaming statistics engine
//!
//! Consumes the sample stream as it is produced and answers summary
//! queries at any point. Moments (mean, σ) use Welford's single-pass
//! update so they stay numerically stable without a second pass;
//! percentiles need the full successful-latency set, which is retained
//! and sorted at query time.
//!
//! Percentile definition: for `n` sorted values and `p` in `[0, 100]`,
//! `rank = p/100 · (n-1)`, linearly interpolating between the two nearest
//! ranks when fractional. `percentile(0)` is the minimum, `percentile(100)`
//! the maximum, and with a single value every percentile is that value.

use serde::Serialize;

use crate::driver::{Outcome, Sample};

/// One requested percentile and its latency value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileValue {
    /// Requested percentile in `[0, 100]`
    pub pct: f64,
    /// Latency at that percentile (ns)
    pub value_ns: f64,
}

/// Final or interim aggregate over a sample stream.
///
/// Moment and extremum fields are absent (not zero) when no successful
/// sample exists; `percentiles` is empty in that case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub count_total: u64,
    pub count_success: u64,
    pub count_miss: u64,
    /// `count_miss / count_total`, with `0/0` defined as 0
    pub miss_rate: f64,
    pub percentiles: Vec<PercentileValue>,
    pub mean_ns: Option<f64>,
    pub stddev_ns: Option<f64>,
    pub min_ns: Option<u64>,
    pub max_ns: Option<u64>,
}

/// Streaming accumulator over the sample stream.
///
/// Aggregation is order-independent; feeding the same immutable sample
/// sequence always yields the same summary.
#[derive(Debug, Default)]
pub struct StatsEngine {
    /// Successful latencies, insertion order (sorted on demand)
    latencies: Vec<u64>,
    count_total: u64,
    count_miss: u64,
    // Welford state over successful latencies
    mean: f64,
    m2: f64,
    min_ns: Option<u64>,
    max_ns: Option<u64>,
}

impl StatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one emitted sample.
    pub fn record(&mut self, sample: &Sample) {
        self.count_total += 1;
        match (sample.outcome, sample.latency_ns) {
            (Outcome::Success, Some(latency_ns)) => self.push_latency(latency_ns),
            _ => self.count_miss += 1,
        }
    }

    fn push_latency(&mut self, latency_ns: u64) {
        self.latencies.push(latency_ns);
        let x = latency_ns as f64;
        let n = self.latencies.len() as f64;
        let delta = x - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (x - self.mean);
        self.min_ns = Some(self.min_ns.map_or(latency_ns, |m| m.min(latency_ns)));
        self.max_ns = Some(self.max_ns.map_or(latency_ns, |m| m.max(latency_ns)));
    }

    /// Number of successful samples recorded so far
    pub fn count_success(&self) -> u64 {
        self.latencies.len() as u64
    }

    /// Compute the aggregate for the requested percentile set.
    ///
    /// Read-only and idempotent; querying twice yields identical results.
    pub fn summary(&self, percentiles: &[f64]) -> SummaryStatistics {
        let count_success = self.latencies.len() as u64;
        let miss_rate = if self.count_total == 0 {
            0.0
        } else {
            self.count_miss as f64 / self.count_total as f64
        };

        let (percentile_values, mean_ns, stddev_ns) = if self.latencies.is_empty() {
            (Vec::new(), None, None)
        } else {
            let mut sorted = self.latencies.clone();
            sorted.sort_unstable();
            let values = percentiles
                .iter()
                .map(|&pct| PercentileValue {
                    pct,
                    value_ns: percentile_of_sorted(&sorted, pct),
                })
                .collect();
            // Population σ: the run is the entire population of interest,
            // not a sample from a larger one.
            let variance = self.m2 / self.latencies.len() as f64;
            (values, Some(self.mean), Some(variance.sqrt()))
        };

        SummaryStatistics {
            count_total: self.count_total,
            count_success,
            count_miss: self.count_miss,
            miss_rate,
            percentiles: percentile_values,
            mean_ns,
            stddev_ns,
            min_ns: self.min_ns,
            max_ns: self.max_ns,
        }
    }
}

/// Interpolated percentile over an ascending-sorted slice.
///
/// `p` is clamped to `[0, 100]`. The slice must be non-empty.
fn percentile_of_sorted(sorted: &[u64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0] as f64;
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lo_val = sorted[lo] as f64;
    if lo == hi {
        return lo_val;
    }
    let hi_val = sorted[hi] as f64;
    lo_val + (hi_val - lo_val) * (rank - lo as f64)
}

impl SummaryStatistics {
    /// Look up a percentile value from the computed set.
    pub fn percentile(&self, pct: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|pv| pv.pct == pct)
            .map(|pv| pv.value_ns)
    }
}
