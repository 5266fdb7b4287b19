//! Matrix product kernels.
//!
//! Every kernel computes each output cell with [`cell`], the same i-j-k inner
//! product, so the floating-point summation order is identical across
//! strategies. Only the assignment of cells to execution units differs.

pub mod distributed;
pub mod hybrid;
pub mod sequential;
pub mod shared;

use crate::{
    error::{shape_error, Result},
    matrix::Matrix,
};

/// `Σ_p A[i][p] · B[p][j]` over row-major slices, with `p` ascending.
///
/// `a` holds at least `i + 1` rows of length `k`; `b` is `k × n`.
#[inline(always)]
pub fn cell(a: &[f64], b: &[f64], i: usize, j: usize, k: usize, n: usize) -> f64 {
    let row = &a[i * k..(i + 1) * k];
    let mut sum = 0.0;
    for (p, &a_ip) in row.iter().enumerate() {
        sum += a_ip * b[p * n + j];
    }
    sum
}

/// Checks that `c (m×n) = a (m×k) · b (k×n)` is a well-formed product.
pub(crate) fn check_shapes(a: &Matrix, b: &Matrix, c: &Matrix) -> Result<()> {
    if a.cols() != b.rows() || c.rows() != a.rows() || c.cols() != b.cols() {
        return Err(shape_error(format!(
            "cannot store {}x{} · {}x{} into {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols(),
            c.rows(),
            c.cols()
        )));
    }
    Ok(())
}

/// Checks raw row-major buffers for `c (m×n) = a (m×k) · b (k×n)`.
pub(crate) fn check_lengths(a: &[f64], b: &[f64], c: &[f64], m: usize, k: usize, n: usize) -> Result<()> {
    let holds = |len: usize, rows: usize, cols: usize| rows.checked_mul(cols) == Some(len);
    if !holds(a.len(), m, k) || !holds(b.len(), k, n) || !holds(c.len(), m, n) {
        return Err(shape_error(format!(
            "buffers of {}, {} and {} elements do not form {m}x{k} · {k}x{n}",
            a.len(),
            b.len(),
            c.len()
        )));
    }
    Ok(())
}
