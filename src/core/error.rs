//! Error types for pool and connection operations.

use thiserror::Error;

/// Fixed reason carried by tasks rejected through `clear_queue`.
pub const QUEUE_CLEARED_REASON: &str = "queue cleared";

/// Failures raised by a [`Connection`](crate::core::Connection) while
/// establishing or holding a session.
///
/// Cloneable so a single failure can fan out to every error subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The access/login sequence was refused.
    #[error("access failed: {0}")]
    Access(String),
    /// The underlying transport failed or was torn down.
    #[error("transport error: {0}")]
    Transport(String),
    /// The session is not open.
    #[error("connection closed")]
    Closed,
}

/// Errors that settle a pending task result or reject a pool operation.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The task's abort signal fired, before or after dispatch.
    #[error("task cancelled")]
    Cancelled,
    /// The task was still queued when the queue was cleared.
    #[error("{}", QUEUE_CLEARED_REASON)]
    QueueCleared,
    /// The pool has been shut down.
    #[error("pool has been shut down")]
    Shutdown,
    /// The result sender went away without settling (the pool was dropped).
    #[error("task abandoned before settlement")]
    Abandoned,
    /// A handshake failed while the caller was awaiting it.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The work function itself failed.
    #[error(transparent)]
    Work(anyhow::Error),
}

impl PoolError {
    /// True when the task was cancelled through its abort signal.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when the task was rejected by `clear_queue`.
    #[must_use]
    pub const fn is_queue_cleared(&self) -> bool {
        matches!(self, Self::QueueCleared)
    }
}

/// Result type returned by work functions.
pub type AppResult<T> = Result<T, anyhow::Error>;
