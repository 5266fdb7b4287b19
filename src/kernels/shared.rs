//! Shared-memory kernel: parallel-for over the (i, j) output cells.

use std::time::{Duration, Instant};

use rayon::ThreadPool;
use tracing::debug;

use super::{cell, check_lengths, check_shapes};
use crate::{
    error::Result,
    matrix::Matrix,
    parallel::{build_pool, parallel_for, Schedule},
};

/// `C = A · B`, one output cell per work index, on `pool`.
///
/// The k reduction of every cell stays on one worker; only the flattened
/// `i * n + j` index space is split.
pub fn multiply(
    a: &Matrix,
    b: &Matrix,
    c: &mut Matrix,
    pool: &ThreadPool,
    schedule: Schedule,
) -> Result<()> {
    check_shapes(a, b, c)?;
    let (k, n) = (a.cols(), b.cols());
    multiply_rows(a.as_slice(), b.as_slice(), c.as_mut_slice(), k, n, pool, schedule)
}

/// Raw-slice form of [`multiply`]; the row count is implied by `c.len() / n`.
///
/// # Errors
///
/// Returns a shape error if the buffers do not form a whole number of
/// `k`-long rows of A, a `k×n` B and matching rows of C.
pub fn multiply_rows(
    a: &[f64],
    b: &[f64],
    c: &mut [f64],
    k: usize,
    n: usize,
    pool: &ThreadPool,
    schedule: Schedule,
) -> Result<()> {
    let m = c.len().checked_div(n).unwrap_or(0);
    check_lengths(a, b, c, m, k, n)?;
    parallel_for(pool, c, schedule, |idx| cell(a, b, idx / n, idx % n, k, n));
    Ok(())
}

/// One point of a thread-count scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    pub threads: usize,
    pub elapsed: Duration,
}

/// Runs [`multiply`] once per thread count in `1..=max_threads`.
///
/// C is zeroed before every run so a stale result can never pass the
/// caller's check. `on_point` sees C right after each timed run.
pub fn scan<F>(
    a: &Matrix,
    b: &Matrix,
    c: &mut Matrix,
    max_threads: usize,
    schedule: Schedule,
    mut on_point: F,
) -> Result<Vec<ScanPoint>>
where
    F: FnMut(ScanPoint, &Matrix) -> Result<()>,
{
    let mut points = Vec::with_capacity(max_threads);
    for threads in 1..=max_threads {
        let pool = build_pool(threads)?;
        c.fill_zero();

        let start = Instant::now();
        multiply(a, b, c, &pool, schedule)?;
        let elapsed = start.elapsed();

        debug!(threads, elapsed_ms = elapsed.as_secs_f64() * 1e3, "shared-memory scan point");
        let point = ScanPoint { threads, elapsed };
        on_point(point, c)?;
        points.push(point);
    }
    Ok(points)
}
