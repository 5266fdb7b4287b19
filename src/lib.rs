//! Scaling benchmark for dense `f64` matrix multiplication.
//!
//! One naive O(M·K·N) product, four ways of running it:
//!
//! - **sequential**: the i-j-k triple loop, used as the correctness oracle;
//! - **shared**: a parallel-for over output cells on a bounded rayon pool;
//! - **distributed**: SPMD row partitioning over collective operations;
//! - **hybrid**: the distributed protocol with a worker pool per participant.
//!
//! Every strategy sums each output cell in the same order, multiplies the
//! same seeded operands, times only the compute interval and appends its
//! result to an append-only CSV log.
//!
//! ## Usage
//!
//! ```
//! use matscale::{kernels::sequential, Dims, Matrix, Operands};
//!
//! let ops = Operands::generate(Dims::square(64), 42).unwrap();
//! let mut c = Matrix::allocate(64, 64).unwrap();
//! sequential::multiply(&ops.a, &ops.b, &mut c).unwrap();
//! ```
//!
//! Running the distributed kernel on an in-process world of four participants:
//!
//! ```
//! use matscale::{comm::{Communicator, LocalWorld}, kernels::distributed, Dims, Operands};
//!
//! let dims = Dims::square(64);
//! let ops = Operands::generate(dims, 42).unwrap();
//! let results = LocalWorld::run(4, |comm| {
//!     distributed::multiply(comm, dims, comm.is_root().then_some(&ops))
//! })
//! .unwrap();
//! assert!(results[0].is_some());
//! ```

pub mod comm;
pub mod config;
pub mod driver;
pub mod error;
pub mod kernels;
pub mod matrix;
pub mod metrics;
pub mod parallel;
pub mod partition;
pub mod report;

pub use config::{BenchConfig, Dims};
pub use driver::{Driver, RunReport, Strategy};
pub use error::{MatscaleError, Result};
pub use matrix::{Matrix, Operands};
pub use metrics::{MetricRecord, MetricsRecorder};
pub use parallel::Schedule;
