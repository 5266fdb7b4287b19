//! Benchmark driver: one measurement methodology for every strategy.
//!
//! For each strategy the driver multiplies the same seeded operands, times
//! only the compute interval, checks C[0][0] against an independent dot
//! product, and appends one [`MetricRecord`] per data point.

use std::{fmt, time::Instant};

use tracing::{info, warn};

use crate::{
    comm::{Communicator, LocalWorld},
    config::BenchConfig,
    error::{config_error, MatscaleError, Result},
    kernels::{distributed, hybrid, sequential, shared},
    matrix::{Matrix, Operands},
    metrics::{MetricRecord, MetricsRecorder},
    parallel::Schedule,
};

/// Relative tolerance of the reference-cell check.
pub const REFERENCE_TOLERANCE: f64 = 1e-9;

/// Execution strategy under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    Shared,
    Distributed,
    Hybrid,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Sequential,
        Strategy::Shared,
        Strategy::Distributed,
        Strategy::Hybrid,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Sequential => "sequential",
            Strategy::Shared => "shared",
            Strategy::Distributed => "distributed",
            Strategy::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Log label of one data point.
pub fn label(strategy: Strategy, threads: usize, ranks: usize) -> String {
    match strategy {
        Strategy::Sequential => "Sequential".to_owned(),
        Strategy::Shared => format!("Shared_{threads}T"),
        Strategy::Distributed => format!("Distributed_{ranks}R"),
        Strategy::Hybrid => format!("Hybrid_{ranks}R_{threads}T"),
    }
}

/// One recorded data point and the verified reference cell behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub record: MetricRecord,
    /// C[0][0] as produced by the kernel.
    pub reference_cell: f64,
}

/// Checks C[0][0] against `A[0, :] · B[:, 0]` computed with `ndarray`.
pub fn verify_reference_cell(operands: &Operands, c: &Matrix) -> Result<f64> {
    let a = operands.a.view()?;
    let b = operands.b.view()?;
    let expected = a.row(0).dot(&b.column(0));
    let actual = c.get(0, 0);

    let scale = expected.abs().max(actual.abs());
    let within = (actual - expected).abs() <= REFERENCE_TOLERANCE * scale;
    if !actual.is_finite() || !within {
        return Err(MatscaleError::VerificationError { expected, actual });
    }
    Ok(actual)
}

/// Owns the operands and the log for a series of runs.
pub struct Driver {
    config: BenchConfig,
    operands: Operands,
    recorder: MetricsRecorder,
}

impl Driver {
    /// Validates `config` and generates the operands from its seed.
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        let operands = Operands::generate(config.dims, config.seed)?;
        Self::with_operands(config, operands)
    }

    /// Uses caller-supplied operands instead of seeded random ones.
    pub fn with_operands(config: BenchConfig, operands: Operands) -> Result<Self> {
        config.validate()?;
        operands.check(config.dims)?;
        let recorder = MetricsRecorder::new(&config.metrics_path);
        Ok(Self {
            config,
            operands,
            recorder,
        })
    }

    pub fn operands(&self) -> &Operands {
        &self.operands
    }

    fn schedule(&self) -> Schedule {
        Schedule::Dynamic {
            chunk: self.config.chunk,
        }
    }

    /// Runs one strategy and returns its data points in scan order.
    pub fn run(&self, strategy: Strategy) -> Result<Vec<RunReport>> {
        let dims = self.config.dims;
        info!(
            %strategy,
            m = dims.m,
            k = dims.k,
            n = dims.n,
            memory_mb = dims.bytes() / 1e6,
            "starting run"
        );
        match strategy {
            Strategy::Sequential => self.run_sequential().map(|r| vec![r]),
            Strategy::Shared => self.run_shared(),
            Strategy::Distributed => self.run_distributed().map(|r| vec![r]),
            Strategy::Hybrid => self.run_hybrid(),
        }
    }

    /// Runs every strategy in [`Strategy::ALL`] order.
    pub fn run_all(&self) -> Result<Vec<RunReport>> {
        let mut reports = Vec::new();
        for strategy in Strategy::ALL {
            reports.extend(self.run(strategy)?);
        }
        Ok(reports)
    }

    fn finish(
        &self,
        strategy: Strategy,
        c: &Matrix,
        elapsed_ms: f64,
        threads: usize,
        ranks: usize,
    ) -> Result<RunReport> {
        let reference_cell = verify_reference_cell(&self.operands, c)?;
        let record = self.recorder.record(
            label(strategy, threads, ranks),
            self.config.dims,
            elapsed_ms,
            threads,
            ranks,
        )?;
        info!(
            label = record.label(),
            elapsed_ms,
            gflops = record.gflops(),
            reference_cell,
            "recorded"
        );
        Ok(RunReport {
            record,
            reference_cell,
        })
    }

    pub fn run_sequential(&self) -> Result<RunReport> {
        let dims = self.config.dims;
        let mut c = Matrix::allocate(dims.m, dims.n)?;

        let start = Instant::now();
        sequential::multiply(&self.operands.a, &self.operands.b, &mut c)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;

        self.finish(Strategy::Sequential, &c, elapsed_ms, 1, 1)
    }

    pub fn run_shared(&self) -> Result<Vec<RunReport>> {
        let dims = self.config.dims;
        let mut c = Matrix::allocate(dims.m, dims.n)?;
        let mut reports = Vec::with_capacity(self.config.max_threads);

        shared::scan(
            &self.operands.a,
            &self.operands.b,
            &mut c,
            self.config.max_threads,
            self.schedule(),
            |point, c| {
                let elapsed_ms = point.elapsed.as_secs_f64() * 1e3;
                reports.push(self.finish(Strategy::Shared, c, elapsed_ms, point.threads, 1)?);
                Ok(())
            },
        )?;
        Ok(reports)
    }

    pub fn run_distributed(&self) -> Result<RunReport> {
        let ranks = self.config.ranks;
        let per_rank = LocalWorld::run(ranks, |comm| {
            let root_operands = comm.is_root().then_some(&self.operands);
            match distributed::multiply(comm, self.config.dims, root_operands)? {
                Some(out) => {
                    let elapsed_ms = out.elapsed.as_secs_f64() * 1e3;
                    self.finish(Strategy::Distributed, &out.c, elapsed_ms, 1, ranks)
                        .map(Some)
                }
                None => Ok(None),
            }
        })?;

        per_rank
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| {
                warn!("distributed run finished without a root result");
                config_error("no participant produced the gathered result")
            })
    }

    pub fn run_hybrid(&self) -> Result<Vec<RunReport>> {
        let ranks = self.config.ranks;
        let per_rank = LocalWorld::run(ranks, |comm| {
            let root_operands = comm.is_root().then_some(&self.operands);
            let mut reports = Vec::new();
            hybrid::scan(
                comm,
                self.config.dims,
                root_operands,
                self.config.max_threads,
                self.schedule(),
                |point, c| {
                    let elapsed_ms = point.elapsed.as_secs_f64() * 1e3;
                    reports.push(self.finish(Strategy::Hybrid, c, elapsed_ms, point.threads, ranks)?);
                    Ok(())
                },
            )?;
            Ok(reports)
        })?;

        Ok(per_rank.into_iter().flatten().collect())
    }
}
