//! Every kernel against the sequential oracle.

use approx::assert_relative_eq;
use matscale::{
    comm::{Communicator, LocalWorld},
    kernels::{distributed, hybrid, sequential, shared},
    parallel::{build_pool, Schedule},
    Dims, Matrix, MatscaleError, Operands,
};

fn oracle(ops: &Operands) -> Matrix {
    let dims = ops.dims();
    let mut c = Matrix::allocate(dims.m, dims.n).unwrap();
    sequential::multiply(&ops.a, &ops.b, &mut c).unwrap();
    c
}

fn assert_matches_oracle(actual: &Matrix, expected: &Matrix, what: &str) {
    assert_eq!(actual.rows(), expected.rows(), "{what}: rows");
    assert_eq!(actual.cols(), expected.cols(), "{what}: cols");
    for (i, (x, y)) in actual.as_slice().iter().zip(expected.as_slice()).enumerate() {
        assert_relative_eq!(*x, *y, max_relative = 1e-9);
        assert!(x.is_finite(), "{what}: C[{i}] is not finite");
    }
}

fn run_distributed(ops: &Operands, ranks: usize) -> Matrix {
    let dims = ops.dims();
    let outputs = LocalWorld::run(ranks, |comm| {
        distributed::multiply(comm, dims, comm.is_root().then_some(ops))
    })
    .unwrap();
    outputs.into_iter().flatten().next().unwrap().c
}

fn run_hybrid(ops: &Operands, ranks: usize, max_threads: usize) -> Vec<(usize, Matrix)> {
    let dims = ops.dims();
    let outputs = LocalWorld::run(ranks, |comm| {
        let mut gathered = Vec::new();
        hybrid::scan(
            comm,
            dims,
            comm.is_root().then_some(ops),
            max_threads,
            Schedule::default(),
            |point, c| {
                gathered.push((point.threads, c.clone()));
                Ok(())
            },
        )?;
        Ok(gathered)
    })
    .unwrap();
    outputs.into_iter().flatten().collect()
}

#[test]
fn test_shared_matches_oracle_for_every_thread_count() {
    let ops = Operands::generate(Dims::new(24, 17, 31), 11).unwrap();
    let expected = oracle(&ops);

    for threads in 1..=4 {
        let pool = build_pool(threads).unwrap();
        let mut c = Matrix::allocate(24, 31).unwrap();
        shared::multiply(&ops.a, &ops.b, &mut c, &pool, Schedule::default()).unwrap();
        assert_matches_oracle(&c, &expected, &format!("shared {threads}T"));
    }
}

#[test]
fn test_shared_scan_zeroes_between_points() {
    let ops = Operands::generate(Dims::square(16), 2).unwrap();
    let expected = oracle(&ops);
    let mut c = Matrix::from_vec(16, 16, vec![f64::NAN; 256]).unwrap();

    let points = shared::scan(&ops.a, &ops.b, &mut c, 3, Schedule::Dynamic { chunk: 5 }, |_, c| {
        assert_matches_oracle(c, &expected, "shared scan");
        Ok(())
    })
    .unwrap();
    assert_eq!(points.len(), 3);
}

#[test]
fn test_distributed_matches_oracle_for_every_divisor() {
    let ops = Operands::generate(Dims::new(12, 9, 7), 5).unwrap();
    let expected = oracle(&ops);

    for ranks in [1, 2, 3, 4, 6, 12] {
        let c = run_distributed(&ops, ranks);
        assert_matches_oracle(&c, &expected, &format!("distributed {ranks}R"));
    }
}

#[test]
fn test_distributed_single_participant_is_bit_identical() {
    let ops = Operands::generate(Dims::new(20, 13, 9), 99).unwrap();
    let expected = oracle(&ops);
    let c = run_distributed(&ops, 1);
    assert_eq!(c, expected);
}

#[test]
fn test_distributed_rejects_indivisible_rows_without_computing() {
    let dims = Dims::new(10, 4, 4);
    let ops = Operands::generate(dims, 1).unwrap();

    let results = LocalWorld::run(3, |comm| {
        Ok(distributed::multiply(comm, dims, comm.is_root().then_some(&ops)))
    })
    .unwrap();
    assert_eq!(results.len(), 3);
    for result in results {
        assert!(matches!(result, Err(MatscaleError::ConfigError { .. })));
    }

    let results = LocalWorld::run(3, |comm| {
        Ok(hybrid::scan(
            comm,
            dims,
            comm.is_root().then_some(&ops),
            2,
            Schedule::default(),
            |_, _| panic!("no product may run for an indivisible partition"),
        ))
    })
    .unwrap();
    for result in results {
        assert!(matches!(result, Err(MatscaleError::ConfigError { .. })));
    }
}

#[test]
fn test_hybrid_matches_oracle_for_every_point() {
    let ops = Operands::generate(Dims::new(12, 10, 14), 21).unwrap();
    let expected = oracle(&ops);

    for ranks in [2, 3] {
        let points = run_hybrid(&ops, ranks, 3);
        let threads: Vec<_> = points.iter().map(|(t, _)| *t).collect();
        assert_eq!(threads, vec![1, 2, 3]);
        for (threads, c) in &points {
            assert_matches_oracle(c, &expected, &format!("hybrid {ranks}R {threads}T"));
        }
    }
}

#[test]
fn test_identity_probe_returns_b_exactly() {
    let size = 12;
    let mut ops = Operands::generate(Dims::new(size, size, 8), 3).unwrap();
    ops.a = Matrix::identity(size).unwrap();

    let mut c = Matrix::allocate(size, 8).unwrap();
    sequential::multiply(&ops.a, &ops.b, &mut c).unwrap();
    assert_eq!(c, ops.b, "sequential");

    let pool = build_pool(3).unwrap();
    let mut c = Matrix::allocate(size, 8).unwrap();
    shared::multiply(&ops.a, &ops.b, &mut c, &pool, Schedule::default()).unwrap();
    assert_eq!(c, ops.b, "shared");

    assert_eq!(run_distributed(&ops, 4), ops.b, "distributed");

    for (threads, c) in run_hybrid(&ops, 2, 2) {
        assert_eq!(c, ops.b, "hybrid {threads}T");
    }
}

#[test]
fn test_participants_only_see_their_rows() {
    let dims = Dims::new(8, 2, 2);
    let data: Vec<f64> = (0..16).map(|x| x as f64).collect();
    let ops = Operands {
        a: Matrix::from_vec(8, 2, data).unwrap(),
        b: Matrix::identity(2).unwrap(),
    };

    // With B = I, each participant's local C rows are its local A rows.
    let firsts = LocalWorld::run(4, |comm| {
        let rank = comm.rank();
        let out = distributed::multiply(comm, dims, comm.is_root().then_some(&ops))?;
        Ok((rank, out.map(|o| o.c)))
    })
    .unwrap();
    let (_, root_c) = &firsts[0];
    assert_eq!(root_c.as_ref(), Some(&ops.a));
}
