//! Statistics over the latency sample stream
//!
//! - [`engine`]: streaming accumulator (Welford moments, retained
//!   latencies for order statistics) and the final summary

pub mod engine;

pub use engine::{PercentileValue, StatsEngine, SummaryStatistics};
