//! Distributed kernel: SPMD row partitioning over a [`Communicator`].
//!
//! Every participant runs the same sequence of collectives:
//!
//! 1. check that M divides evenly across participants;
//! 2. allocate local A rows, a full B and local C rows;
//! 3. broadcast B from the root;
//! 4. scatter A's rows;
//! 5. barrier, start the clock;
//! 6. multiply the local rows with no communication;
//! 7. barrier, stop the clock, gather C's rows back to the root.
//!
//! Only the root gets the assembled C back.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::sequential;
use crate::{
    comm::Communicator,
    config::Dims,
    error::{config_error, Result},
    matrix::{Matrix, Operands},
    partition::RowPartition,
};

/// The root's result of one distributed product.
#[derive(Debug, Clone)]
pub struct DistributedOutput {
    pub c: Matrix,
    /// Compute interval between the two barriers, as seen by the root.
    pub elapsed: Duration,
}

/// One participant's buffers after broadcast and scatter.
pub(crate) struct LocalShare {
    pub(crate) partition: RowPartition,
    pub(crate) a_local: Matrix,
    pub(crate) b: Matrix,
    pub(crate) c_local: Matrix,
    /// Full C; only allocated on the root.
    pub(crate) c_global: Option<Matrix>,
}

impl LocalShare {
    /// Hands the local C rows to the root.
    pub(crate) fn gather<C: Communicator>(&mut self, comm: &C) -> Result<()> {
        comm.gather_rows(
            self.c_local.as_slice(),
            self.c_global.as_mut().map(Matrix::as_mut_slice),
        )
    }
}

/// Steps 1 to 4: precondition, allocation, broadcast of B, scatter of A.
///
/// `operands` is only read on the root, which must supply it.
pub(crate) fn distribute<C: Communicator>(
    comm: &C,
    dims: Dims,
    operands: Option<&Operands>,
) -> Result<LocalShare> {
    dims.validate()?;
    let partition = RowPartition::new(dims.m, comm.size())?;
    let local_rows = partition.local_rows();

    let mut a_local = Matrix::allocate(local_rows, dims.k)?;
    let mut b = Matrix::allocate(dims.k, dims.n)?;
    let c_local = Matrix::allocate(local_rows, dims.n)?;

    let (global_a, c_global) = if comm.is_root() {
        let ops = operands.ok_or_else(|| config_error("root participant needs the global operands"))?;
        ops.check(dims)?;
        b.as_mut_slice().copy_from_slice(ops.b.as_slice());
        (Some(ops.a.as_slice()), Some(Matrix::allocate(dims.m, dims.n)?))
    } else {
        (None, None)
    };

    comm.broadcast(b.as_mut_slice())?;
    comm.scatter_rows(global_a, a_local.as_mut_slice())?;
    debug!(
        rows = ?partition.range(comm.rank()),
        "received row partition"
    );

    Ok(LocalShare {
        partition,
        a_local,
        b,
        c_local,
        c_global,
    })
}

/// Runs the full distributed product on this participant.
///
/// Returns `Some` on the root and `None` everywhere else.
///
/// # Errors
///
/// Every participant returns a configuration error, before any
/// communication, when `dims.m` is not divisible by `comm.size()`.
pub fn multiply<C: Communicator>(
    comm: &C,
    dims: Dims,
    operands: Option<&Operands>,
) -> Result<Option<DistributedOutput>> {
    let mut share = distribute(comm, dims, operands)?;
    let local_rows = share.partition.local_rows();

    comm.barrier();
    let start = Instant::now();

    sequential::multiply_rows(
        share.a_local.as_slice(),
        share.b.as_slice(),
        share.c_local.as_mut_slice(),
        local_rows,
        dims.k,
        dims.n,
    )?;

    comm.barrier();
    let elapsed = start.elapsed();
    share.gather(comm)?;

    if comm.is_root() {
        info!(
            ranks = comm.size(),
            local_rows,
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            "distributed product complete"
        );
    }
    Ok(share.c_global.map(|c| DistributedOutput { c, elapsed }))
}
