//! Throughput metrics and the append-only results log.
//!
//! The log is a CSV file with the fixed header
//! `label,elapsed_ms,gflops,throughput_GBps,thread_count,rank_count`.
//! Rows are only ever appended; existing rows are never rewritten.

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    config::Dims,
    error::{MatscaleError, Result},
};

/// Column names of the results log, in order.
pub const HEADER: &str = "label,elapsed_ms,gflops,throughput_GBps,thread_count,rank_count";

/// One completed timed run. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    label: String,
    elapsed_ms: f64,
    gflops: f64,
    throughput_gbps: f64,
    thread_count: usize,
    rank_count: usize,
}

impl MetricRecord {
    /// Derives GFLOPS and memory throughput for one product of size `dims`.
    ///
    /// A multiply-add counts as two floating-point operations; throughput
    /// counts every element of A, B and C once.
    pub fn new(
        label: impl Into<String>,
        dims: Dims,
        elapsed_ms: f64,
        thread_count: usize,
        rank_count: usize,
    ) -> Self {
        let seconds = elapsed_ms / 1000.0;
        Self {
            label: label.into(),
            elapsed_ms,
            gflops: dims.flops() / seconds / 1e9,
            throughput_gbps: dims.bytes() / seconds / 1e9,
            thread_count,
            rank_count,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn gflops(&self) -> f64 {
        self.gflops
    }

    pub fn throughput_gbps(&self) -> f64 {
        self.throughput_gbps
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn rank_count(&self) -> usize {
        self.rank_count
    }

    /// Parses one data row of the log; `line` is only used for error messages.
    fn parse(row: &str, line: usize) -> Result<Self> {
        let bad = |message: String| MatscaleError::MetricsError { line, message };

        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() != 6 {
            return Err(bad(format!("expected 6 fields, found {}", fields.len())));
        }
        let float = |i: usize| {
            fields[i]
                .parse::<f64>()
                .map_err(|e| bad(format!("field {i} ({:?}): {e}", fields[i])))
        };
        let count = |i: usize| {
            fields[i]
                .parse::<usize>()
                .map_err(|e| bad(format!("field {i} ({:?}): {e}", fields[i])))
        };

        Ok(Self {
            label: fields[0].to_owned(),
            elapsed_ms: float(1)?,
            gflops: float(2)?,
            throughput_gbps: float(3)?,
            thread_count: count(4)?,
            rank_count: count(5)?,
        })
    }
}

impl fmt::Display for MetricRecord {
    /// CSV row in [`HEADER`] order, without a trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.label,
            self.elapsed_ms,
            self.gflops,
            self.throughput_gbps,
            self.thread_count,
            self.rank_count
        )
    }
}

/// Appends [`MetricRecord`]s to a CSV log on disk.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    path: PathBuf,
}

impl MetricsRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Builds a record for one timed run and appends it to the log.
    pub fn record(
        &self,
        label: impl Into<String>,
        dims: Dims,
        elapsed_ms: f64,
        thread_count: usize,
        rank_count: usize,
    ) -> Result<MetricRecord> {
        let record = MetricRecord::new(label, dims, elapsed_ms, thread_count, rank_count);
        self.append(&record)?;
        Ok(record)
    }

    /// Appends one row, writing the header first if the log is new or empty.
    pub fn append(&self, record: &MetricRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut row = String::new();
        if file.metadata()?.len() == 0 {
            row.push_str(HEADER);
            row.push('\n');
        }
        row.push_str(&record.to_string());
        row.push('\n');
        file.write_all(row.as_bytes())?;

        debug!(path = %self.path.display(), label = record.label(), "appended metric row");
        Ok(())
    }

    /// Reads every data row of the log. A missing log reads as empty.
    pub fn read_all(&self) -> Result<Vec<MetricRecord>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        text.lines()
            .enumerate()
            .filter(|(_, row)| !row.trim().is_empty() && row.trim() != HEADER)
            .map(|(i, row)| MetricRecord::parse(row, i + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gflops_reference_value() {
        let record = MetricRecord::new("probe", Dims::square(100), 1000.0, 1, 1);
        assert_eq!(record.gflops(), 0.002);
        // (3 * 100 * 100) elements * 8 bytes over one second
        assert_eq!(record.throughput_gbps(), 240_000.0 / 1e9);
    }

    #[test]
    fn test_gflops_scales_inversely_with_time() {
        let fast = MetricRecord::new("fast", Dims::square(100), 500.0, 1, 1);
        assert_eq!(fast.gflops(), 0.004);
    }

    #[test]
    fn test_display_matches_header_order() {
        let record = MetricRecord::new("Hybrid_2R_4T", Dims::square(100), 1000.0, 4, 2);
        assert_eq!(record.to_string(), "Hybrid_2R_4T,1000,0.002,0.00024,4,2");
        assert_eq!(HEADER.split(',').count(), 6);
    }

    #[test]
    fn test_parse_round_trip_of_display() {
        let record = MetricRecord::new("Shared_3T", Dims::new(10, 20, 30), 12.345, 3, 1);
        let parsed = MetricRecord::parse(&record.to_string(), 2).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        let err = MetricRecord::parse("Sequential,1.0,2.0", 7).unwrap_err();
        assert!(matches!(err, MatscaleError::MetricsError { line: 7, .. }));
        assert!(MetricRecord::parse("Sequential,x,1,1,1,1", 1).is_err());
        assert!(MetricRecord::parse("Sequential,1,1,1,-1,1", 1).is_err());
    }
}
