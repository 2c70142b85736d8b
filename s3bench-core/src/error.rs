use thiserror::Error;

use crate::driver::Operation;
use crate::storage::StorageError;

/// Errors that can occur while running a sweep.
#[derive(Debug, Error)]
pub enum Error {
    /// The sweep plan cannot produce any meaningful batch.
    #[error("invalid sweep plan: {0}")]
    InvalidPlan(&'static str),

    /// At least one operation of a batch failed.
    #[error("{operation} batch with {workers} workers and size {size} failed")]
    Batch {
        operation: Operation,
        workers: usize,
        size: u64,
        #[source]
        source: StorageError,
    },

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for driver operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
