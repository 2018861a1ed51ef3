//! Per-task abort signals and the caller-facing pending result.
//!
//! A task's abort signal acts in two phases. While the task is queued,
//! aborting removes it from the queue and rejects it with
//! [`PoolError::Cancelled`] without touching any connection. Once dispatched,
//! aborting tears down the connection's active data transfer (never the
//! control session) and the result becomes [`PoolError::Cancelled`] no matter
//! how the work function itself finishes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::connection::Connection;
use crate::core::master::Shared;
use crate::core::stats::PoolCounters;
use crate::core::task::TaskId;
use crate::core::{PoolError, Spawn};

/// Removes a still-queued task on abort.
pub(crate) trait Withdraw: Send + Sync {
    fn withdraw(&self, id: TaskId);
}

impl<C: Connection, S: Spawn> Withdraw for Shared<C, S> {
    fn withdraw(&self, id: TaskId) {
        let Some(task) = self.state.lock().queue.remove(id) else {
            // Already dispatched or settled; the token handles the rest.
            return;
        };
        task.job.reject(PoolError::Cancelled);
        PoolCounters::bump(&self.counters.cancelled, 1);
        tracing::debug!("task {} cancelled before dispatch", id);
    }
}

/// Cloneable trigger for a task's abort signal.
#[derive(Clone)]
pub struct TaskAbortHandle {
    id: TaskId,
    token: CancellationToken,
    queue: Weak<dyn Withdraw>,
}

impl TaskAbortHandle {
    /// Fire the abort signal. Repeated calls, and calls after settlement, do nothing.
    pub fn abort(&self) {
        if self.token.is_cancelled() {
            return;
        }
        // Cancel first so a concurrent dispatch still observes the abort.
        self.token.cancel();
        if let Some(queue) = self.queue.upgrade() {
            queue.withdraw(self.id);
        }
    }

    /// Whether the abort signal has fired.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The task this handle aborts.
    pub const fn id(&self) -> TaskId {
        self.id
    }
}

impl fmt::Debug for TaskAbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskAbortHandle")
            .field("id", &self.id)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Pending result of an enqueued task.
///
/// Resolves exactly once with the work function's value, its error wrapped in
/// [`PoolError::Work`], or the error that superseded it. Dropping the handle
/// does not cancel the task; call [`abort`](Self::abort) for that.
pub struct TaskHandle<T> {
    abort: TaskAbortHandle,
    reply: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(
        id: TaskId,
        token: CancellationToken,
        reply: oneshot::Receiver<Result<T, PoolError>>,
        queue: Weak<dyn Withdraw>,
    ) -> Self {
        Self {
            abort: TaskAbortHandle { id, token, queue },
            reply,
        }
    }

    /// Cancel the task, whether still queued or already running.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Whether [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Task identifier.
    pub const fn id(&self) -> TaskId {
        self.abort.id
    }

    /// A cloneable abort trigger, usable while this handle is being awaited.
    pub fn abort_handle(&self) -> TaskAbortHandle {
        self.abort.clone()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.reply)
            .poll(cx)
            .map(|settled| settled.unwrap_or_else(|_| Err(PoolError::Abandoned)))
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.abort.id)
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}
