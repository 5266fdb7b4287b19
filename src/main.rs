//! Command-line runner for the matrix multiplication scaling benchmark.
//!
//! # Usage
//!
//! ```bash
//! # Single-threaded baseline on the 2000×2000 reference workload
//! matscale sequential
//!
//! # Thread scan from 1 to 8 threads
//! matscale shared --max-threads 8
//!
//! # Four participants, then four participants × thread scan
//! matscale distributed --ranks 4
//! MATSCALE_RANKS=4 matscale hybrid
//!
//! # Everything, then the summary of the log
//! matscale all --m 1000 --k 1000 --n 1000
//! matscale report
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use matscale::{
    config::{available_threads, DEFAULT_CHUNK, DEFAULT_DIM, DEFAULT_SEED},
    report::Summary,
    BenchConfig, Dims, Driver, MetricsRecorder, RunReport, Strategy,
};

/// Dense matrix multiplication scaling benchmark
#[derive(Parser, Debug)]
#[command(name = "matscale")]
#[command(about = "Benchmark matrix multiplication across threads and participants")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Single-threaded triple loop
    Sequential(RunArgs),
    /// Shared-memory parallel-for, scanned over thread counts
    Shared(RunArgs),
    /// Row-partitioned SPMD run over `--ranks` participants
    Distributed(RunArgs),
    /// Distributed run with a thread scan inside every participant
    Hybrid(RunArgs),
    /// All four strategies in order
    All(RunArgs),
    /// Summarize the metrics log
    Report {
        /// Metrics log to read
        #[arg(long, default_value = "metrics.csv")]
        metrics: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Rows of A and C
    #[arg(long, default_value_t = DEFAULT_DIM)]
    m: usize,

    /// Columns of A, rows of B
    #[arg(long, default_value_t = DEFAULT_DIM)]
    k: usize,

    /// Columns of B and C
    #[arg(long, default_value_t = DEFAULT_DIM)]
    n: usize,

    /// Seed for the operand generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Output cells per dynamic scheduling chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK)]
    chunk: usize,

    /// Upper end of the thread-count scan (defaults to available parallelism)
    #[arg(long)]
    max_threads: Option<usize>,

    /// Number of participants for distributed and hybrid runs
    #[arg(long, env = "MATSCALE_RANKS", default_value_t = 1)]
    ranks: usize,

    /// Append-only metrics log
    #[arg(long, default_value = "metrics.csv")]
    metrics: PathBuf,
}

impl From<RunArgs> for BenchConfig {
    fn from(args: RunArgs) -> Self {
        BenchConfig {
            dims: Dims::new(args.m, args.k, args.n),
            seed: args.seed,
            chunk: args.chunk,
            max_threads: args.max_threads.unwrap_or_else(available_threads),
            ranks: args.ranks,
            metrics_path: args.metrics,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let (strategy, args) = match cli.command {
        Command::Sequential(args) => (Some(Strategy::Sequential), args),
        Command::Shared(args) => (Some(Strategy::Shared), args),
        Command::Distributed(args) => (Some(Strategy::Distributed), args),
        Command::Hybrid(args) => (Some(Strategy::Hybrid), args),
        Command::All(args) => (None, args),
        Command::Report { metrics } => return print_report(metrics),
    };

    let config = prepare(args)?;
    print_banner(&config, strategy);

    let driver = Driver::new(config).context("Failed to prepare benchmark")?;
    let reports = match strategy {
        Some(strategy) => driver
            .run(strategy)
            .with_context(|| format!("{strategy} run failed"))?,
        None => driver.run_all().context("benchmark run failed")?,
    };

    print_results(&reports);
    Ok(())
}

/// Converts the arguments and rejects unusable values before anything runs.
fn prepare(args: RunArgs) -> Result<BenchConfig> {
    let config = BenchConfig::from(args);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_banner(config: &BenchConfig, strategy: Option<Strategy>) {
    let dims = config.dims;
    let title = strategy.map_or("all strategies".to_owned(), |s| s.to_string());
    println!("=== Matrix-Matrix Multiplication ({title}) ===");
    println!("Matrix A: {} x {}", dims.m, dims.k);
    println!("Matrix B: {} x {}", dims.k, dims.n);
    println!("Matrix C: {} x {}", dims.m, dims.n);
    println!("Max threads: {}", config.max_threads);
    if matches!(strategy, None | Some(Strategy::Distributed | Strategy::Hybrid)) {
        println!("Participants: {}", config.ranks);
        if dims.m % config.ranks == 0 {
            println!("Local rows per participant: {}", dims.m / config.ranks);
        }
    }
    println!("Total memory: ~{:.1} MB", dims.bytes() / 1e6);
}

fn print_results(reports: &[RunReport]) {
    println!("\n=== RESULTS ===");
    for report in reports {
        let record = &report.record;
        println!(
            "{:<20} {:>10.2} ms  {:>8.3} GFLOPS  {:>8.3} GB/s  C[0][0] = {}",
            record.label(),
            record.elapsed_ms(),
            record.gflops(),
            record.throughput_gbps(),
            report.reference_cell
        );
    }
}

fn print_report(metrics: PathBuf) -> Result<()> {
    let recorder = MetricsRecorder::new(metrics);
    let records = recorder
        .read_all()
        .with_context(|| format!("Failed to read {}", recorder.path().display()))?;
    if records.is_empty() {
        anyhow::bail!("no results in {}", recorder.path().display());
    }
    println!("{}", Summary::from_records(&records));
    Ok(())
}
