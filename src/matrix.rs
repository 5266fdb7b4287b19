//! Owned dense row-major matrix buffers.

use ndarray::ArrayView2;
use rand::{distr::Uniform, rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::Dims,
    error::{allocation_error, config_error, shape_error, Result},
};

/// A dense `rows × cols` matrix of `f64` stored row-major in one contiguous buffer.
///
/// Element `(i, j)` lives at `i * cols + j`. The buffer is exclusively owned;
/// kernels borrow it for exactly the duration of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Allocates a zeroed `rows × cols` matrix.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if `rows * cols` overflows or the
    /// allocator cannot reserve the buffer.
    pub fn allocate(rows: usize, cols: usize) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| allocation_error(usize::MAX, format!("{rows}x{cols} overflows usize")))?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| allocation_error(len, e.to_string()))?;
        data.resize(len, 0.0);

        Ok(Self { rows, cols, data })
    }

    /// Wraps an existing row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(shape_error(format!(
                "buffer of {} elements cannot hold a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// The `size × size` identity matrix.
    pub fn identity(size: usize) -> Result<Self> {
        let mut matrix = Self::allocate(size, size)?;
        for i in 0..size {
            matrix.data[i * size + i] = 1.0;
        }
        Ok(matrix)
    }

    /// Overwrites every element with an independent uniform draw from `[lo, hi)`.
    pub fn fill_random_uniform<R: Rng + ?Sized>(&mut self, rng: &mut R, lo: f64, hi: f64) -> Result<()> {
        let dist = Uniform::new(lo, hi)
            .map_err(|e| config_error(format!("invalid random range [{lo}, {hi}): {e}")))?;
        for x in self.data.iter_mut() {
            *x = rng.sample(&dist);
        }
        Ok(())
    }

    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Read-only `ndarray` view sharing this buffer.
    pub fn view(&self) -> Result<ArrayView2<'_, f64>> {
        ArrayView2::from_shape((self.rows, self.cols), &self.data)
            .map_err(|e| shape_error(e.to_string()))
    }

    /// Number of bytes held by the buffer.
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }
}

/// The global inputs of one product, owned by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Operands {
    /// M×K left operand.
    pub a: Matrix,
    /// K×N right operand.
    pub b: Matrix,
}

impl Operands {
    /// Draws A then B uniformly from `[0, 1)` with a generator seeded by `seed`.
    ///
    /// Generation happens once, before any partitioning, so every strategy
    /// run with the same seed multiplies the same matrices.
    pub fn generate(dims: Dims, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut a = Matrix::allocate(dims.m, dims.k)?;
        let mut b = Matrix::allocate(dims.k, dims.n)?;
        a.fill_random_uniform(&mut rng, 0.0, 1.0)?;
        b.fill_random_uniform(&mut rng, 0.0, 1.0)?;
        Ok(Self { a, b })
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.a.rows(), self.a.cols(), self.b.cols())
    }

    /// Fails unless A is `m × k` and B is `k × n` for `dims`.
    pub fn check(&self, dims: Dims) -> Result<()> {
        if self.a.rows() != dims.m || self.a.cols() != dims.k || self.b.rows() != dims.k || self.b.cols() != dims.n {
            return Err(shape_error(format!(
                "operands are {}x{} and {}x{}, configuration expects {}x{} and {}x{}",
                self.a.rows(),
                self.a.cols(),
                self.b.rows(),
                self.b.cols(),
                dims.m,
                dims.k,
                dims.k,
                dims.n
            )));
        }
        Ok(())
    }
}
