//! Error types for matscale operations.
//!
//! Every failure in this crate is fatal for the run that hit it: there is no
//! retry path and no partial result. Errors are still returned rather than
//! panicking so the binary can report them and exit with a non-zero status.

use thiserror::Error;

/// Errors that can occur while preparing, executing or recording a benchmark run.
#[derive(Debug, Error)]
pub enum MatscaleError {
    /// The configuration cannot be executed (e.g. rows not divisible by participants).
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Human-readable error message.
        message: String,
    },
    /// A matrix buffer could not be allocated.
    #[error("Memory allocation failed: {message} (requested {requested_elements} elements)")]
    AllocationError {
        /// Number of `f64` elements that were requested.
        requested_elements: usize,
        /// Human-readable error message.
        message: String,
    },
    /// A collective saw a different element count or call than its peers.
    #[error("Collective mismatch in {collective}: expected {expected} elements, got {actual}")]
    CollectiveMismatchError {
        /// Name of the collective that detected the mismatch.
        collective: &'static str,
        /// Element count this participant expected.
        expected: usize,
        /// Element count that actually arrived.
        actual: usize,
    },
    /// A participant received a message belonging to a different collective.
    #[error("Collective order violated on rank {rank}: expected {expected}, received {actual} from rank {from}")]
    CollectiveOrderError {
        /// Receiving participant.
        rank: usize,
        /// Collective the receiver is executing.
        expected: &'static str,
        /// Collective the message was sent for.
        actual: &'static str,
        /// Sending participant.
        from: usize,
    },
    /// A peer participant is gone; the collective can never complete.
    #[error("Participant {peer} disconnected during {collective}")]
    PeerDisconnected {
        /// Rank of the missing participant.
        peer: usize,
        /// Collective that was in progress.
        collective: &'static str,
    },
    /// Operand shapes do not agree with the requested product.
    #[error("Shape error: {message}")]
    ShapeError {
        /// Human-readable error message.
        message: String,
    },
    /// The reference cell of C does not match an independent dot product.
    #[error("Verification failed: C[0][0] = {actual}, expected {expected}")]
    VerificationError {
        /// Independently computed value.
        expected: f64,
        /// Value found in the kernel output.
        actual: f64,
    },
    /// A row of the metrics log could not be parsed.
    #[error("Malformed metrics row at line {line}: {message}")]
    MetricsError {
        /// One-based line number in the log.
        line: usize,
        /// Human-readable error message.
        message: String,
    },
    /// The worker pool could not be built.
    #[error("Thread pool error: {0}")]
    PoolError(#[from] rayon::ThreadPoolBuildError),
    /// Reading or appending the metrics log failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for matscale operations.
pub type Result<T> = std::result::Result<T, MatscaleError>;

/// Creates a configuration error.
pub fn config_error(message: impl Into<String>) -> MatscaleError {
    MatscaleError::ConfigError {
        message: message.into(),
    }
}

/// Creates an allocation error.
pub fn allocation_error(requested_elements: usize, message: impl Into<String>) -> MatscaleError {
    MatscaleError::AllocationError {
        requested_elements,
        message: message.into(),
    }
}

/// Creates a collective mismatch error.
pub fn collective_mismatch(
    collective: &'static str,
    expected: usize,
    actual: usize,
) -> MatscaleError {
    MatscaleError::CollectiveMismatchError {
        collective,
        expected,
        actual,
    }
}

/// Creates a shape error.
pub fn shape_error(message: impl Into<String>) -> MatscaleError {
    MatscaleError::ShapeError {
        message: message.into(),
    }
}
