//! In-memory connection that simulates an FTP session.
//!
//! Useful for tests, benchmarks and dry runs: handshakes can be made to fail
//! or stall, sessions can be dropped as if the server hung up, and transfers
//! observe [`Connection::abort_transfer`] the way a real data channel would.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::AccessOptions;
use crate::core::{Connection, ConnectionError, ConnectionFactory, LifecycleEvent};

const LIFECYCLE_CAPACITY: usize = 16;

struct Inner {
    closed: AtomicBool,
    failures_pending: AtomicUsize,
    access_delay: Mutex<Option<Duration>>,
    transfer: Mutex<CancellationToken>,
    accesses: AtomicUsize,
    aborts: AtomicUsize,
    closes: AtomicUsize,
    last_user: Mutex<Option<String>>,
    events: broadcast::Sender<LifecycleEvent>,
}

/// Simulated FTP session. Clones share the same session.
#[derive(Clone)]
pub struct MemoryConnection {
    inner: Arc<Inner>,
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnection {
    /// A fresh, closed connection.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                closed: AtomicBool::new(true),
                failures_pending: AtomicUsize::new(0),
                access_delay: Mutex::new(None),
                transfer: Mutex::new(CancellationToken::new()),
                accesses: AtomicUsize::new(0),
                aborts: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                last_user: Mutex::new(None),
                events,
            }),
        }
    }

    /// Make the next `count` handshakes fail with [`ConnectionError::Access`].
    pub fn fail_next_access(&self, count: usize) {
        self.inner.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Delay every handshake by `delay`.
    pub fn set_access_delay(&self, delay: Option<Duration>) {
        *self.inner.access_delay.lock() = delay;
    }

    /// Mark the session open without a handshake.
    pub fn force_open(&self) {
        self.inner.closed.store(false, Ordering::SeqCst);
    }

    /// Simulate the server hanging up: the session closes and the transport
    /// emits `Close` followed by `End`.
    pub fn drop_session(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.transfer.lock().cancel();
        let _ = self.inner.events.send(LifecycleEvent::Close);
        let _ = self.inner.events.send(LifecycleEvent::End);
    }

    /// Simulate a data transfer lasting `duration`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Closed`] without a session, or
    /// [`ConnectionError::Transport`] when the transfer is aborted or the
    /// session drops mid-transfer.
    pub async fn transfer(&self, duration: Duration) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        let token = {
            let mut current = self.inner.transfer.lock();
            *current = CancellationToken::new();
            current.clone()
        };
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = token.cancelled() => {
                Err(ConnectionError::Transport("data transfer aborted".into()))
            }
        }
    }

    /// Handshakes attempted so far.
    pub fn access_count(&self) -> usize {
        self.inner.accesses.load(Ordering::SeqCst)
    }

    /// Calls to [`Connection::abort_transfer`] so far.
    pub fn abort_count(&self) -> usize {
        self.inner.aborts.load(Ordering::SeqCst)
    }

    /// Calls to [`Connection::close`] so far.
    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// User name presented by the most recent successful handshake.
    pub fn last_user(&self) -> Option<String> {
        self.inner.last_user.lock().clone()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    async fn access(&self, options: &AccessOptions) -> Result<(), ConnectionError> {
        self.inner.accesses.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.access_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .inner
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ConnectionError::Access(format!(
                "530 login incorrect for {}@{}",
                options.user, options.host
            )));
        }

        *self.inner.last_user.lock() = Some(options.user.clone());
        self.inner.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    fn abort_transfer(&self) {
        self.inner.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.transfer.lock().cancel();
    }

    fn close(&self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.transfer.lock().cancel();
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            let _ = self.inner.events.send(LifecycleEvent::Close);
        }
    }
}

/// Factory that hands out [`MemoryConnection`]s and keeps a clone of each,
/// so callers can drive the sessions the pool owns.
#[derive(Clone, Default)]
pub struct MemoryConnectionFactory {
    created: Arc<Mutex<Vec<MemoryConnection>>>,
    failing_accesses: usize,
}

impl MemoryConnectionFactory {
    /// A factory producing healthy connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose connections each fail their first `count` handshakes.
    pub fn failing_first(count: usize) -> Self {
        Self {
            failing_accesses: count,
            ..Self::default()
        }
    }

    /// Number of connections created so far.
    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    /// The `index`-th connection created, in creation order.
    pub fn connection(&self, index: usize) -> Option<MemoryConnection> {
        self.created.lock().get(index).cloned()
    }

    /// Every connection created so far.
    pub fn connections(&self) -> Vec<MemoryConnection> {
        self.created.lock().clone()
    }

    fn make(&self) -> MemoryConnection {
        let connection = MemoryConnection::new();
        if self.failing_accesses > 0 {
            connection.fail_next_access(self.failing_accesses);
        }
        self.created.lock().push(connection.clone());
        connection
    }
}

impl ConnectionFactory<MemoryConnection> for MemoryConnectionFactory {
    fn create(&self) -> MemoryConnection {
        self.make()
    }
}
