//! Session establishment and automatic reconnection.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::core::connection::{Connection, HandleId, HandleState, HANDSHAKE_TAG};
use crate::core::master::Shared;
use crate::core::stats::PoolCounters;
use crate::core::{ConnectionError, Spawn};

impl<C: Connection, S: Spawn> Shared<C, S> {
    /// Make sure handle `id` holds a live session.
    ///
    /// No-op when the handle is gone, already open, or held by a task. If
    /// another handshake is in flight on it, waits for that one and re-checks.
    /// On success the handle becomes idle, its lifecycle watcher is installed
    /// if missing, and dispatch runs.
    pub(crate) fn connect_client(
        self: &Arc<Self>,
        id: HandleId,
    ) -> BoxFuture<'static, Result<(), ConnectionError>> {
        let shared = Arc::clone(self);
        Box::pin(async move {
            let connection = loop {
                let finished = shared.handshakes.notified();
                tokio::pin!(finished);
                finished.as_mut().enable();
                {
                    let mut state = shared.state.lock();
                    if state.shut_down {
                        return Ok(());
                    }
                    let Some(handle) = state.pool.get_mut(id) else {
                        return Ok(());
                    };
                    if !handle.handshaking {
                        if handle.state.is_busy() || !handle.connection.is_closed() {
                            return Ok(());
                        }
                        handle.handshaking = true;
                        handle.state = HandleState::Busy(Some(HANDSHAKE_TAG.to_string()));
                        break Arc::clone(&handle.connection);
                    }
                }
                // Another handshake owns this handle; wait for it, then re-check.
                finished.await;
            };

            tracing::debug!(
                "handle {} connecting to {}:{}",
                id,
                shared.access.host,
                shared.access.port
            );
            let result = connection.access(&shared.access).await;

            let watcher = {
                let mut guard = shared.state.lock();
                let state = &mut *guard;
                let retained = !state.shut_down;
                match state.pool.get_mut(id).filter(|_| retained) {
                    Some(handle) => {
                        handle.handshaking = false;
                        handle.state = HandleState::Idle;
                        if result.is_ok() && handle.watcher.is_none() {
                            let stop = CancellationToken::new();
                            handle.watcher = Some(stop.clone());
                            Some(stop)
                        } else {
                            None
                        }
                    }
                    None => {
                        // Evicted or shut down mid-handshake: the session has no owner.
                        if result.is_ok() {
                            connection.close();
                        }
                        drop(guard);
                        shared.handshakes.notify_waiters();
                        tracing::debug!("handle {} retired during its handshake", id);
                        return Ok(());
                    }
                }
            };
            shared.handshakes.notify_waiters();

            result?;
            if let Some(stop) = watcher {
                shared.watch_lifecycle(id, &connection, stop);
            }
            tracing::info!("handle {} connected", id);
            shared.dispatch();
            Ok::<(), ConnectionError>(())
        })
    }

    /// Connect every handle in pool order, one handshake at a time.
    ///
    /// Returns the failures; a failed handle stays closed.
    pub(crate) fn connect_all(
        self: &Arc<Self>,
    ) -> BoxFuture<'static, Vec<(HandleId, ConnectionError)>> {
        let shared = Arc::clone(self);
        Box::pin(async move {
            let ids = shared.state.lock().pool.ids();
            let mut failures = Vec::new();
            for id in ids {
                if let Err(error) = shared.connect_client(id).await {
                    failures.push((id, error));
                }
            }
            failures
        })
    }

    /// Fire-and-forget [`connect_all`](Self::connect_all); failures go to the reporter.
    pub(crate) fn spawn_connect_all(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        self.spawner.spawn(async move {
            for (id, error) in shared.connect_all().await {
                shared.report_reconnect_failure(id, error);
            }
        });
    }

    /// Fire-and-forget reconnect of a single handle.
    pub(crate) fn spawn_reconnect(self: &Arc<Self>, id: HandleId) {
        let shared = Arc::clone(self);
        self.spawner.spawn(async move {
            if let Err(error) = shared.connect_client(id).await {
                shared.report_reconnect_failure(id, error);
            }
        });
    }

    fn report_reconnect_failure(&self, id: HandleId, error: ConnectionError) {
        PoolCounters::bump(&self.counters.reconnect_failures, 1);
        self.reporter.report(id, error);
    }

    /// Reconnect handle `id` whenever its transport reports `Close` or `End`.
    ///
    /// Runs until `stop` is cancelled, the connection drops its lifecycle
    /// sender, or the pool itself is gone.
    fn watch_lifecycle(self: &Arc<Self>, id: HandleId, connection: &C, stop: CancellationToken) {
        let mut events = connection.lifecycle();
        let pool = Arc::downgrade(self);
        self.spawner.spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = stop.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => {
                        let Some(shared) = pool.upgrade() else {
                            break;
                        };
                        let enabled = shared.state.lock().reconnect_enabled();
                        if !enabled {
                            tracing::debug!("handle {} saw {:?}, auto-reconnect off", id, event);
                            continue;
                        }
                        tracing::info!("handle {} saw {:?}, reconnecting", id, event);
                        if let Err(error) = shared.connect_client(id).await {
                            shared.report_reconnect_failure(id, error);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("handle {} missed {} lifecycle events", id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("lifecycle watcher for handle {} stopped", id);
        });
    }
}
