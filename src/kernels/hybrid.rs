//! Hybrid kernel: distributed row partition with a worker pool per participant.
//!
//! B is broadcast and A scattered once. Each point of the thread-count scan
//! then zeroes the local C rows, takes a barrier, times the pooled local
//! product, takes another barrier and gathers C on the root.
//!
//! Collectives are issued from the participant's own thread only. The pool
//! closures capture operand slices, never the communicator.

use std::time::Instant;

use tracing::{debug, info};

use super::{distributed::distribute, shared, shared::ScanPoint};
use crate::{
    comm::Communicator,
    config::Dims,
    error::Result,
    matrix::{Matrix, Operands},
    parallel::{build_pool, Schedule},
};

/// Runs the hybrid product once per thread count in `1..=max_threads`.
///
/// `on_gathered` is called on the root only, with the scan point and the
/// fully gathered C. Every participant returns its own timings.
///
/// If `on_gathered` fails, the root stops calling it but still completes the
/// remaining points so its peers are not left waiting on a barrier. The first
/// callback error is returned once the scan is over.
pub fn scan<C, F>(
    comm: &C,
    dims: Dims,
    operands: Option<&Operands>,
    max_threads: usize,
    schedule: Schedule,
    mut on_gathered: F,
) -> Result<Vec<ScanPoint>>
where
    C: Communicator,
    F: FnMut(ScanPoint, &Matrix) -> Result<()>,
{
    let mut share = distribute(comm, dims, operands)?;
    let mut points = Vec::with_capacity(max_threads);
    let mut callback_error = None;

    for threads in 1..=max_threads {
        let pool = build_pool(threads)?;
        share.c_local.fill_zero();

        comm.barrier();
        let start = Instant::now();

        shared::multiply_rows(
            share.a_local.as_slice(),
            share.b.as_slice(),
            share.c_local.as_mut_slice(),
            dims.k,
            dims.n,
            &pool,
            schedule,
        )?;

        comm.barrier();
        let elapsed = start.elapsed();
        share.gather(comm)?;

        let point = ScanPoint { threads, elapsed };
        debug!(threads, elapsed_ms = elapsed.as_secs_f64() * 1e3, "hybrid scan point");
        if let Some(c) = share.c_global.as_ref() {
            info!(
                ranks = comm.size(),
                threads,
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                "hybrid product complete"
            );
            if callback_error.is_none() {
                callback_error = on_gathered(point, c).err();
            }
        }
        points.push(point);
    }

    match callback_error {
        Some(e) => Err(e),
        None => Ok(points),
    }
}
