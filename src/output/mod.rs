//! Output collaborators: consume the final sample sequence and summary
//!
//! - [`csv`]: one CSV row per sample
//! - [`report`]: console summary and ASCII latency histogram
//!
//! Both receive read-only views; the sequence is final and immutable by
//! the time it arrives here.

pub mod csv;
pub mod report;
