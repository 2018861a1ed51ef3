//! Dispatch loop: binds queued tasks to idle connections and drains on settle.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::cancel::{TaskHandle, Withdraw};
use crate::core::connection::{Connection, HandleId, HandleState};
use crate::core::master::Shared;
use crate::core::stats::PoolCounters;
use crate::core::task::{Job, QueuedTask, TaskId, TaskOutcome, WorkJob};
use crate::core::{AppResult, PoolError, Spawn};

impl<C: Connection, S: Spawn> Shared<C, S> {
    /// Queue a task and immediately try to dispatch it.
    pub(crate) fn enqueue<T, F, Fut>(
        self: &Arc<Self>,
        work: F,
        priority: bool,
        tag: Option<String>,
    ) -> TaskHandle<T>
    where
        F: FnOnce(Arc<C>) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let id = self.next_task.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let (reply, receiver) = oneshot::channel();
        let job: Box<dyn Job<C>> = Box::new(WorkJob::new(work, reply));

        let queue: Arc<dyn Withdraw> = Arc::clone(self) as Arc<dyn Withdraw>;
        let handle = TaskHandle::new(id, token.clone(), receiver, Arc::downgrade(&queue));
        PoolCounters::bump(&self.counters.submitted, 1);

        let task = QueuedTask { id, tag, token, job };
        {
            let mut state = self.state.lock();
            if state.shut_down {
                drop(state);
                task.job.reject(PoolError::Shutdown);
                PoolCounters::bump(&self.counters.cleared, 1);
                return handle;
            }
            state.queue.push(task, priority);
        }
        tracing::debug!("task {} enqueued (priority: {})", id, priority);

        self.dispatch();
        handle
    }

    /// Bind queued tasks to idle, open connections until either runs out.
    ///
    /// Safe to call at any time; returns the number of tasks started, which
    /// is zero when there is no idle handle or no queued task.
    pub(crate) fn dispatch(self: &Arc<Self>) -> usize {
        let mut started = 0;
        loop {
            let (binding, task) = {
                let mut guard = self.state.lock();
                let state = &mut *guard;
                let Some(index) = state.pool.first_available() else {
                    break;
                };
                let Some(task) = state.queue.pop_front() else {
                    break;
                };
                if task.token.is_cancelled() {
                    // Aborted while queued, before its withdraw took the lock.
                    (None, task)
                } else {
                    let handle = state.pool.at_mut(index);
                    handle.state = HandleState::Busy(task.tag.clone());
                    (Some((handle.id, Arc::clone(&handle.connection))), task)
                }
            };
            match binding {
                Some((handle, connection)) => {
                    self.spawn_task(handle, connection, task);
                    started += 1;
                }
                None => {
                    tracing::debug!("task {} cancelled before dispatch", task.id);
                    task.job.reject(PoolError::Cancelled);
                    PoolCounters::bump(&self.counters.cancelled, 1);
                }
            }
        }
        started
    }

    fn spawn_task(self: &Arc<Self>, handle: HandleId, connection: Arc<C>, task: QueuedTask<C>) {
        let QueuedTask { id, tag, token, job } = task;
        tracing::debug!(
            "task {} dispatched to handle {} ({})",
            id,
            handle,
            tag.as_deref().unwrap_or("untagged")
        );

        let shared = Arc::clone(self);
        self.spawner.spawn(async move {
            let outcome = job.run(connection, token).await;
            shared.settle(handle, id, outcome);
        });
    }

    /// Free the handle a task ran on and pull the next task.
    fn settle(self: &Arc<Self>, handle: HandleId, task: TaskId, outcome: TaskOutcome) {
        self.counters.record(outcome);
        tracing::debug!("task {} settled on handle {}: {:?}", task, handle, outcome);

        let reconnect = {
            let mut state = self.state.lock();
            let enabled = state.reconnect_enabled();
            state.pool.get_mut(handle).is_some_and(|h| {
                h.state = HandleState::Idle;
                // The session dropped under the task; the watcher skipped it while busy.
                enabled && h.connection.is_closed()
            })
        };
        if reconnect {
            self.spawn_reconnect(handle);
        }
        self.dispatch();
    }

    /// Reject every queued task with [`PoolError::QueueCleared`].
    pub(crate) fn clear_queue(&self) -> usize {
        let tasks = self.state.lock().queue.drain();
        let cleared = tasks.len();
        for task in tasks {
            task.job.reject(PoolError::QueueCleared);
        }
        PoolCounters::bump(&self.counters.cleared, cleared);
        if cleared > 0 {
            tracing::info!("queue cleared, {} tasks rejected", cleared);
        }
        cleared
    }
}
