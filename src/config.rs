//! Benchmark configuration.
//!
//! All sizes and knobs are carried explicitly in a [`BenchConfig`] value that
//! the driver passes down to every kernel. Nothing here is global.

use std::path::PathBuf;

use crate::error::{config_error, Result};

/// Default edge length of the reference workload.
pub const DEFAULT_DIM: usize = 2000;

/// Default chunk granularity of the dynamic schedule, in output cells.
pub const DEFAULT_CHUNK: usize = 32;

/// Default seed for operand generation.
pub const DEFAULT_SEED: u64 = 42;

/// Matrix dimensions of the product `C (M×N) = A (M×K) · B (K×N)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    /// Rows of A and C.
    pub m: usize,
    /// Columns of A, rows of B.
    pub k: usize,
    /// Columns of B and C.
    pub n: usize,
}

impl Dims {
    pub fn new(m: usize, k: usize, n: usize) -> Self {
        Self { m, k, n }
    }

    pub fn square(size: usize) -> Self {
        Self::new(size, size, size)
    }

    /// Floating-point operations of one product, counting a multiply-add as two.
    pub fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64
    }

    /// Bytes touched by one product: A, B and C once each.
    pub fn bytes(&self) -> f64 {
        ((self.m * self.k + self.k * self.n + self.m * self.n) * std::mem::size_of::<f64>()) as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.m == 0 || self.k == 0 || self.n == 0 {
            return Err(config_error(format!(
                "dimensions must be positive (M={}, K={}, N={})",
                self.m, self.k, self.n
            )));
        }
        Ok(())
    }
}

impl Default for Dims {
    fn default() -> Self {
        Self::square(DEFAULT_DIM)
    }
}

/// Everything a benchmark run needs to know.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub dims: Dims,
    /// Seed for the operand generator; identical seeds give identical A and B.
    pub seed: u64,
    /// Chunk size of the dynamic parallel-for schedule.
    pub chunk: usize,
    /// Upper end of the thread-count scan (inclusive).
    pub max_threads: usize,
    /// Participant count for the distributed and hybrid strategies.
    pub ranks: usize,
    /// Append-only CSV log.
    pub metrics_path: PathBuf,
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        self.dims.validate()?;
        if self.chunk == 0 {
            return Err(config_error("chunk size must be at least 1"));
        }
        if self.max_threads == 0 {
            return Err(config_error("thread scan needs at least 1 thread"));
        }
        if self.ranks == 0 {
            return Err(config_error("participant count must be at least 1"));
        }
        Ok(())
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            dims: Dims::default(),
            seed: DEFAULT_SEED,
            chunk: DEFAULT_CHUNK,
            max_threads: available_threads(),
            ranks: 1,
            metrics_path: PathBuf::from("metrics.csv"),
        }
    }
}

/// Hardware parallelism reported by the OS, falling back to one thread.
pub fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reference_workload() {
        let config = BenchConfig::default();
        assert_eq!(config.dims, Dims::square(2000));
        assert_eq!(config.chunk, 32);
        assert!(config.max_threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(Dims::new(0, 4, 4).validate().is_err());
        assert!(Dims::new(4, 4, 0).validate().is_err());
    }

    #[test]
    fn test_zero_knobs_rejected() {
        let mut config = BenchConfig {
            chunk: 0,
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
        config.chunk = 1;
        config.ranks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flops_and_bytes() {
        let dims = Dims::square(100);
        assert_eq!(dims.flops(), 2_000_000.0);
        assert_eq!(dims.bytes(), 240_000.0);
    }
}
