//! Parallel-for over an output index space on a bounded rayon pool.
//!
//! The scheduling policy lives here and nowhere else; kernels only supply a
//! per-index work callback.

use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
    ThreadPool, ThreadPoolBuilder,
};

use crate::{config::DEFAULT_CHUNK, error::Result};

/// How output indices are handed to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// One contiguous block per worker, sized up front.
    Static,
    /// Fixed-size chunks of contiguous indices, taken by whichever worker is idle.
    Dynamic { chunk: usize },
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Dynamic {
            chunk: DEFAULT_CHUNK,
        }
    }
}

impl Schedule {
    /// Number of indices per work unit for `len` indices on `threads` workers.
    fn chunk_len(&self, len: usize, threads: usize) -> usize {
        match *self {
            Schedule::Static => len.div_ceil(threads.max(1)).max(1),
            Schedule::Dynamic { chunk } => chunk.max(1),
        }
    }
}

/// Builds a pool of exactly `threads` workers.
pub fn build_pool(threads: usize) -> Result<ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("matscale-worker-{i}"))
        .build()?;
    Ok(pool)
}

/// Sets `out[idx] = work(idx)` for every index, in parallel on `pool`.
///
/// Each work unit receives a disjoint `&mut` chunk of `out`, so workers never
/// write the same element. The call returns only after every unit is done,
/// which makes all of `out` visible to the caller.
pub fn parallel_for<T, F>(pool: &ThreadPool, out: &mut [T], schedule: Schedule, work: F)
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if out.is_empty() {
        return;
    }
    let chunk = schedule.chunk_len(out.len(), pool.current_num_threads());

    pool.install(|| {
        out.par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(unit, slots)| {
                let base = unit * chunk;
                for (offset, slot) in slots.iter_mut().enumerate() {
                    *slot = work(base + offset);
                }
            });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn test_every_index_written_once() {
        let pool = build_pool(4).unwrap();
        for schedule in [Schedule::Static, Schedule::Dynamic { chunk: 3 }, Schedule::default()] {
            let mut out = vec![usize::MAX; 1001];
            parallel_for(&pool, &mut out, schedule, |i| i * 2);
            for (i, &v) in out.iter().enumerate() {
                assert_eq!(v, i * 2, "schedule {schedule:?} index {i}");
            }
        }
    }

    #[test]
    fn test_runs_on_pool_workers() {
        let pool = build_pool(3).unwrap();
        let names = Mutex::new(HashSet::new());
        let mut out = vec![0u8; 512];
        parallel_for(&pool, &mut out, Schedule::Dynamic { chunk: 1 }, |_| {
            let name = std::thread::current().name().map(str::to_owned);
            names.lock().unwrap().insert(name);
            1
        });
        let names = names.into_inner().unwrap();
        assert!(!names.is_empty() && names.len() <= 3);
        assert!(names
            .iter()
            .all(|n| n.as_deref().is_some_and(|n| n.starts_with("matscale-worker-"))));
    }

    #[test]
    fn test_static_chunk_len() {
        assert_eq!(Schedule::Static.chunk_len(10, 4), 3);
        assert_eq!(Schedule::Static.chunk_len(2, 8), 1);
        assert_eq!(Schedule::Dynamic { chunk: 0 }.chunk_len(10, 4), 1);
    }

    #[test]
    fn test_empty_output_is_noop() {
        let pool = build_pool(2).unwrap();
        let mut out: Vec<f64> = Vec::new();
        parallel_for(&pool, &mut out, Schedule::default(), |_| unreachable!());
    }
}
