//! Error types for the bounded worker pool.

use std::io;

use thiserror::Error;

/// Errors surfaced while building or feeding a [`WorkerPool`](super::WorkerPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was configured without worker threads.
    #[error("worker pool '{pool}' needs at least one thread")]
    NoThreads {
        /// Pool name.
        pool: String,
    },
    /// The pool was configured without queue capacity.
    #[error("worker pool '{pool}' needs a queue capacity of at least one")]
    NoCapacity {
        /// Pool name.
        pool: String,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread for pool '{pool}': {source}")]
    Spawn {
        /// Pool name.
        pool: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The queue was full; the task was dropped.
    #[error("task rejected by '{pool}': queue full ({capacity} pending)")]
    Rejected {
        /// Pool name.
        pool: String,
        /// Queue capacity that was exhausted.
        capacity: usize,
    },
    /// The pool no longer accepts tasks.
    #[error("task rejected by '{pool}': pool is shut down")]
    Shutdown {
        /// Pool name.
        pool: String,
    },
}

impl PoolError {
    /// Whether the error is a submission rejection rather than a build failure.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Shutdown { .. })
    }
}
