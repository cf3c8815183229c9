//! CSV dump of the sample sequence
//!
//! One row per sample:
//! `sequence_index, assert_time_ns, observe_time_ns, latency_ns, outcome`.
//! Observe/latency cells are empty on a miss, so the file round-trips the
//! success/miss distinction without sentinels.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::driver::Sample;

/// Column headers, in row order
pub const HEADERS: [&str; 5] = [
    "sequence_index",
    "assert_time_ns",
    "observe_time_ns",
    "latency_ns",
    "outcome",
];

/// Write the sample sequence to any writer.
pub fn write_samples<W: Write>(writer: W, samples: &[Sample]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(HEADERS)?;
    for sample in samples {
        w.write_record([
            sample.sequence_index.to_string(),
            sample.assert_time_ns.to_string(),
            sample
                .observe_time_ns
                .map(|v| v.to_string())
                .unwrap_or_default(),
            sample
                .latency_ns
                .map(|v| v.to_string())
                .unwrap_or_default(),
            sample.outcome.label().to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Write the sample sequence to a file, creating parent directories.
pub fn write_samples_to_path<P: AsRef<Path>>(path: P, samples: &[Sample]) -> csv::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    write_samples(file, samples)?;
    tracing::info!(path = %path.display(), count = samples.len(), "CSV written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MissReason;

    fn mixed_samples() -> Vec<Sample> {
        vec![
            Sample::success(0, 1_000_000_000, 1_000_500_000),
            Sample::success(1, 2_000_000_000, 2_000_300_000),
            Sample::miss(2, 3_000_000_000, MissReason::Timeout),
            Sample::miss(3, 4_000_000_000, MissReason::BackendError),
        ]
    }

    #[test]
    fn test_header_and_row_shape() {
        let mut buf = Vec::new();
        write_samples(&mut buf, &mixed_samples()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sequence_index,assert_time_ns,observe_time_ns,latency_ns,outcome"
        );
        assert_eq!(
            lines.next().unwrap(),
            "0,1000000000,1000500000,500000,success"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,2000000000,2000300000,300000,success"
        );
    }

    #[test]
    fn test_miss_rows_have_empty_cells() {
        let mut buf = Vec::new();
        write_samples(&mut buf, &mixed_samples()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "2,3000000000,,,timeout");
        assert_eq!(lines[4], "3,4000000000,,,backend-error");
    }

    #[test]
    fn test_write_to_nested_path_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("run.csv");
        write_samples_to_path(&path, &mixed_samples()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("sequence_index,"));
    }
}
