//! Single-threaded i-j-k product; the correctness oracle for every other kernel.

use super::{cell, check_lengths, check_shapes};
use crate::{error::Result, matrix::Matrix};

/// `C = A · B` with the textbook triple loop: i outer, j middle, k inner.
///
/// C is overwritten, not accumulated into.
pub fn multiply(a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
    check_shapes(a, b, c)?;
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    multiply_rows(a.as_slice(), b.as_slice(), c.as_mut_slice(), m, k, n)
}

/// Raw-slice form of [`multiply`] for `m` rows of A against the full `k × n` B.
///
/// Used directly on a participant's local row partition.
///
/// # Errors
///
/// Returns a shape error unless the buffers hold exactly `m×k`, `k×n` and
/// `m×n` elements.
pub fn multiply_rows(a: &[f64], b: &[f64], c: &mut [f64], m: usize, k: usize, n: usize) -> Result<()> {
    check_lengths(a, b, c, m, k, n)?;
    for i in 0..m {
        for j in 0..n {
            c[i * n + j] = cell(a, b, i, j, k, n);
        }
    }
    Ok(())
}
