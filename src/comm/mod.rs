//! Collective communication between the participants of an SPMD run.
//!
//! Every method is a collective: it blocks until all participants reached the
//! same call, and every participant must issue the same collectives in the
//! same order with matching element counts. Diverging call sequences are a
//! precondition violation; depending on the backend they surface as an error
//! on the receiving side or as an indefinite hang.

pub mod local;

pub use local::{LocalCommunicator, LocalWorld};

use crate::error::Result;

/// Rank that owns the global operands and receives gathered results.
pub const ROOT: usize = 0;

/// Typed collective capability held by one participant.
pub trait Communicator {
    /// This participant's rank in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of participants.
    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    /// Copies the root's `buf` into every other participant's `buf`.
    fn broadcast(&self, buf: &mut [f64]) -> Result<()>;

    /// Splits the root's `send` into `size()` equal contiguous pieces; piece
    /// `r` lands in `recv` of rank `r`.
    ///
    /// `send` is only read on the root and must hold `recv.len() * size()`
    /// elements there.
    fn scatter_rows(&self, send: Option<&[f64]>, recv: &mut [f64]) -> Result<()>;

    /// Inverse of [`scatter_rows`](Communicator::scatter_rows): rank `r`'s
    /// `send` lands in piece `r` of the root's `recv`.
    fn gather_rows(&self, send: &[f64], recv: Option<&mut [f64]>) -> Result<()>;

    /// Blocks until every participant has called `barrier`.
    fn barrier(&self);
}
