//! The public pool front-end and the state it shares with background work.

use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use crate::config::AccessOptions;
use crate::core::cancel::TaskHandle;
use crate::core::connection::{Connection, ConnectionFactory, HandleSnapshot};
use crate::core::pool::ConnectionPool;
use crate::core::queue::TaskQueue;
use crate::core::reporter::{ErrorReporter, ReconnectFailure};
use crate::core::stats::{PoolCounters, PoolStats};
use crate::core::{AppResult, PoolError, Spawn};
use crate::runtime::TokioSpawner;

/// Reconnect failures buffered per subscriber when none is configured.
pub const DEFAULT_ERROR_BUFFER: usize = 64;

/// Everything guarded by the pool mutex. Never held across an await.
pub(crate) struct MasterState<C> {
    pub(crate) pool: ConnectionPool<C>,
    pub(crate) queue: TaskQueue<C>,
    pub(crate) max_connections: usize,
    pub(crate) auto_reconnect: bool,
    pub(crate) shut_down: bool,
}

impl<C> MasterState<C> {
    pub(crate) const fn reconnect_enabled(&self) -> bool {
        self.auto_reconnect && !self.shut_down
    }
}

/// State shared by [`FtpMaster`] clones, running tasks and lifecycle watchers.
pub(crate) struct Shared<C, S> {
    pub(crate) access: AccessOptions,
    pub(crate) factory: Box<dyn ConnectionFactory<C>>,
    pub(crate) state: Mutex<MasterState<C>>,
    pub(crate) reporter: ErrorReporter,
    pub(crate) counters: PoolCounters,
    pub(crate) spawner: S,
    pub(crate) next_task: AtomicU64,
    /// Woken whenever a handshake finishes, successfully or not.
    pub(crate) handshakes: Notify,
}

impl<C, S> Drop for Shared<C, S> {
    fn drop(&mut self) {
        for handle in self.state.get_mut().pool.iter() {
            if let Some(watcher) = &handle.watcher {
                watcher.cancel();
            }
        }
    }
}

impl<C: Connection, S: Spawn> Shared<C, S> {
    /// Resize to `target`, retire evicted handles, then reconnect and dispatch.
    pub(crate) fn resize(self: &Arc<Self>, target: usize) {
        let (evicted, reconnect) = {
            let mut state = self.state.lock();
            state.max_connections = target;
            let evicted = state.pool.resize(target, self.factory.as_ref());
            (evicted, state.reconnect_enabled())
        };

        if !evicted.is_empty() {
            tracing::info!("pool shrunk to {} connections, retiring {}", target, evicted.len());
        }
        for handle in evicted {
            tracing::debug!("retiring handle {}", handle.id);
            handle.retire();
        }

        if reconnect {
            self.spawn_connect_all();
        }
        self.dispatch();
    }

    fn shutdown(&self) -> usize {
        let (tasks, retired) = {
            let mut state = self.state.lock();
            if state.shut_down {
                return 0;
            }
            state.shut_down = true;
            state.auto_reconnect = false;
            let retired: Vec<(Option<CancellationToken>, Arc<C>)> = state
                .pool
                .iter_mut()
                .map(|h| (h.watcher.take(), Arc::clone(&h.connection)))
                .collect();
            (state.queue.drain(), retired)
        };

        for (watcher, connection) in retired {
            if let Some(watcher) = watcher {
                watcher.cancel();
            }
            connection.close();
        }

        let rejected = tasks.len();
        for task in tasks {
            task.job.reject(PoolError::Shutdown);
        }
        PoolCounters::bump(&self.counters.cleared, rejected);
        tracing::info!("pool shut down, {} queued tasks rejected", rejected);
        rejected
    }
}

/// Schedules work over a fixed-but-resizable set of shared connections.
///
/// Every enqueued task is bound to exactly one idle, open connection for the
/// duration of its work function and settles exactly once: with its own
/// outcome, with [`PoolError::Cancelled`] after [`TaskHandle::abort`], or with
/// [`PoolError::QueueCleared`] if cleared before dispatch.
///
/// Cloning is cheap; clones drive the same pool.
///
/// # Example
///
/// ```rust,ignore
/// use prometheus_ftp_master::config::AccessOptions;
/// use prometheus_ftp_master::core::FtpMaster;
///
/// let master = FtpMaster::new(AccessOptions::new("ftp.example.com"), 2, true, MyClient::new);
/// let listing = master
///     .enqueue(|client| async move { client.list("/pub").await }, false)
///     .await?;
/// ```
pub struct FtpMaster<C, S = TokioSpawner> {
    pub(crate) shared: Arc<Shared<C, S>>,
}

impl<C, S> Clone for FtpMaster<C, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connection> FtpMaster<C, TokioSpawner> {
    /// Create a pool of `max_connections` connections on the current Tokio runtime.
    ///
    /// With `auto_reconnect` on, every connection starts its handshake in the
    /// background; failures go to [`subscribe_errors`](Self::subscribe_errors).
    pub fn new(
        access: AccessOptions,
        max_connections: usize,
        auto_reconnect: bool,
        factory: impl ConnectionFactory<C>,
    ) -> Self {
        Self::with_spawner(
            access,
            max_connections,
            auto_reconnect,
            factory,
            TokioSpawner::default(),
        )
    }
}

impl<C: Connection, S: Spawn> FtpMaster<C, S> {
    /// Create a pool that spawns its background work through `spawner`.
    pub fn with_spawner(
        access: AccessOptions,
        max_connections: usize,
        auto_reconnect: bool,
        factory: impl ConnectionFactory<C>,
        spawner: S,
    ) -> Self {
        Self::from_parts(
            access,
            max_connections,
            auto_reconnect,
            DEFAULT_ERROR_BUFFER,
            Box::new(factory),
            spawner,
        )
    }

    pub(crate) fn from_parts(
        access: AccessOptions,
        max_connections: usize,
        auto_reconnect: bool,
        error_buffer: usize,
        factory: Box<dyn ConnectionFactory<C>>,
        spawner: S,
    ) -> Self {
        let shared = Arc::new(Shared {
            access,
            factory,
            state: Mutex::new(MasterState {
                pool: ConnectionPool::new(),
                queue: TaskQueue::new(),
                max_connections: 0,
                auto_reconnect,
                shut_down: false,
            }),
            reporter: ErrorReporter::new(error_buffer),
            counters: PoolCounters::default(),
            spawner,
            next_task: AtomicU64::new(0),
            handshakes: Notify::new(),
        });
        shared.resize(max_connections);
        Self { shared }
    }

    /// Number of pooled connections.
    pub fn max_connections(&self) -> usize {
        self.shared.state.lock().max_connections
    }

    /// Grow or shrink the pool to exactly `max_connections` handles.
    ///
    /// Shrinking closes the most disposable handles first: closed, then idle,
    /// then busy. A task running on a closed busy handle still settles normally.
    pub fn set_max_connections(&self, max_connections: usize) {
        self.shared.resize(max_connections);
    }

    /// Whether dropped sessions are re-established automatically.
    pub fn auto_reconnect(&self) -> bool {
        self.shared.state.lock().auto_reconnect
    }

    /// Toggle auto-reconnect. Enabling it starts connecting every closed handle.
    ///
    /// Has no effect after [`shutdown`](Self::shutdown).
    pub fn set_auto_reconnect(&self, enabled: bool) {
        {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                return;
            }
            state.auto_reconnect = enabled;
        }
        if enabled {
            self.shared.spawn_connect_all();
        }
    }

    /// Ensure every handle holds a live session, one handshake at a time.
    ///
    /// Every handle is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first handshake failure, or [`PoolError::Shutdown`].
    pub async fn connect_clients(&self) -> Result<(), PoolError> {
        let shut_down = self.shared.state.lock().shut_down;
        if shut_down {
            return Err(PoolError::Shutdown);
        }
        let failures = self.shared.connect_all().await;
        match failures.into_iter().next() {
            Some((_, error)) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// Queue `work` for the next free connection.
    ///
    /// Priority tasks jump to the head of the queue. The holder tag shown in
    /// [`connections`](Self::connections) is the caller's source location.
    #[track_caller]
    pub fn enqueue<T, F, Fut>(&self, work: F, priority: bool) -> TaskHandle<T>
    where
        F: FnOnce(Arc<C>) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let caller = std::panic::Location::caller();
        let tag = format!("{}:{}", caller.file(), caller.line());
        self.shared.enqueue(work, priority, Some(tag))
    }

    /// Like [`enqueue`](Self::enqueue) with an explicit holder tag.
    pub fn enqueue_tagged<T, F, Fut>(
        &self,
        work: F,
        priority: bool,
        tag: impl Into<String>,
    ) -> TaskHandle<T>
    where
        F: FnOnce(Arc<C>) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.shared.enqueue(work, priority, Some(tag.into()))
    }

    /// Reject every queued task with [`PoolError::QueueCleared`].
    ///
    /// Dispatched tasks are untouched. Returns the number of rejected tasks.
    pub fn clear_queue(&self) -> usize {
        self.shared.clear_queue()
    }

    /// Subscribe to background reconnect failures.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ReconnectFailure> {
        self.shared.reporter.subscribe()
    }

    /// Snapshot of every handle in pool order.
    pub fn connections(&self) -> Vec<HandleSnapshot> {
        self.shared.state.lock().pool.snapshot()
    }

    /// Tasks waiting for a connection.
    pub fn queue_len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Current utilization and lifetime counters.
    pub fn stats(&self) -> PoolStats {
        let mut stats = {
            let state = self.shared.state.lock();
            PoolStats {
                connections: state.pool.len(),
                live_connections: state.pool.iter().filter(|h| !h.connection.is_closed()).count(),
                busy_connections: state.pool.iter().filter(|h| h.state.is_busy()).count(),
                queued_tasks: state.queue.len(),
                ..PoolStats::default()
            }
        };
        self.shared.counters.fill(&mut stats);
        stats
    }

    /// Stop the pool: disable auto-reconnect, reject queued tasks with
    /// [`PoolError::Shutdown`], unsubscribe lifecycle watchers and close every
    /// connection. Running tasks settle with whatever their work produces.
    ///
    /// Returns the number of rejected queued tasks.
    pub fn shutdown(&self) -> usize {
        self.shared.shutdown()
    }
}
