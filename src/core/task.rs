//! Type-erased units of work held by the queue.

use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::{AppResult, Connection, PoolError};

/// Unique task identifier.
pub type TaskId = u64;

/// How a dispatched task settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// A job whose result type has been erased so heterogeneous jobs share a queue.
pub(crate) trait Job<C>: Send {
    /// Run against `connection`, settle the caller's result, and report how it settled.
    ///
    /// Cancelling `token` aborts the connection's data transfer; once
    /// cancelled, the result is always [`PoolError::Cancelled`].
    fn run(
        self: Box<Self>,
        connection: Arc<C>,
        token: CancellationToken,
    ) -> BoxFuture<'static, TaskOutcome>;

    /// Settle without running.
    fn reject(self: Box<Self>, error: PoolError);
}

/// Work function plus the sender half of the caller's pending result.
pub(crate) struct WorkJob<C, F, T> {
    work: F,
    reply: oneshot::Sender<Result<T, PoolError>>,
    _connection: PhantomData<fn(Arc<C>)>,
}

impl<C, F, T> WorkJob<C, F, T> {
    pub(crate) fn new(work: F, reply: oneshot::Sender<Result<T, PoolError>>) -> Self {
        Self {
            work,
            reply,
            _connection: PhantomData,
        }
    }
}

impl<C, F, Fut, T> Job<C> for WorkJob<C, F, T>
where
    C: Connection,
    F: FnOnce(Arc<C>) -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    fn run(
        self: Box<Self>,
        connection: Arc<C>,
        token: CancellationToken,
    ) -> BoxFuture<'static, TaskOutcome> {
        let Self { work, reply, .. } = *self;
        Box::pin(async move {
            let transfer = Arc::clone(&connection);
            // A panicking work function fails its task instead of stranding the handle.
            let work = AssertUnwindSafe(async move { work(connection).await }).catch_unwind();
            tokio::pin!(work);

            let result = tokio::select! {
                result = &mut work => result,
                () = token.cancelled() => {
                    // The work future keeps running; it usually fails once its transfer is gone.
                    transfer.abort_transfer();
                    work.await
                }
            };

            let result =
                result.unwrap_or_else(|_| Err(anyhow::anyhow!("work function panicked")));
            let (settled, outcome) = if token.is_cancelled() {
                (Err(PoolError::Cancelled), TaskOutcome::Cancelled)
            } else {
                match result {
                    Ok(value) => (Ok(value), TaskOutcome::Completed),
                    Err(err) => (Err(PoolError::Work(err)), TaskOutcome::Failed),
                }
            };
            // A dropped receiver just means the caller stopped listening.
            let _ = reply.send(settled);
            outcome
        })
    }

    fn reject(self: Box<Self>, error: PoolError) {
        let _ = self.reply.send(Err(error));
    }
}

/// A task waiting in the queue. Never holds a connection.
pub(crate) struct QueuedTask<C> {
    pub(crate) id: TaskId,
    pub(crate) tag: Option<String>,
    pub(crate) token: CancellationToken,
    pub(crate) job: Box<dyn Job<C>>,
}
