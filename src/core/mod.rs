//! Connection pooling, task scheduling and session supervision.

pub mod error;
pub mod connection;
pub(crate) mod pool;
pub(crate) mod queue;
pub(crate) mod task;
pub mod cancel;
pub(crate) mod scheduler;
pub(crate) mod supervisor;
pub mod reporter;
pub mod stats;
pub mod spawn;
pub mod master;

pub use cancel::{TaskAbortHandle, TaskHandle};
pub use connection::{
    Connection, ConnectionFactory, HandleId, HandleSnapshot, HandleState, LifecycleEvent,
    HANDSHAKE_TAG,
};
pub use error::{AppResult, ConnectionError, PoolError, QUEUE_CLEARED_REASON};
pub use master::{FtpMaster, DEFAULT_ERROR_BUFFER};
pub use reporter::ReconnectFailure;
pub use spawn::Spawn;
pub use stats::PoolStats;
pub use task::TaskId;
