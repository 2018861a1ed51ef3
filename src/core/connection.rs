//! The external connection contract and the pool's per-connection handle.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::AccessOptions;
use crate::core::ConnectionError;

/// Identifier of a pooled connection handle, unique for the life of a pool.
pub type HandleId = u64;

/// Holder tag shown in snapshots while a handle's session handshake is in flight.
pub const HANDSHAKE_TAG: &str = "handshake";

/// Transport-level lifecycle notification emitted by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The socket was closed.
    Close,
    /// The peer ended the stream.
    End,
}

/// A stateful network session managed by the pool.
///
/// The pool treats implementations as opaque: it only opens sessions with
/// [`access`](Self::access), watches [`lifecycle`](Self::lifecycle), and tears
/// down transfers or sessions on request. Everything else (FTP framing,
/// passive mode, data channels) belongs to the implementation.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// True when no live session exists.
    fn is_closed(&self) -> bool;

    /// Establish a session using opaque access options.
    async fn access(&self, options: &AccessOptions) -> Result<(), ConnectionError>;

    /// Subscribe to transport `Close`/`End` notifications.
    fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent>;

    /// Forcibly abort the active data transfer, leaving the control session open.
    fn abort_transfer(&self);

    /// Gracefully end the session. Must be safe to call on a closed connection.
    fn close(&self);
}

/// Builds fresh, unconnected connections when the pool grows.
pub trait ConnectionFactory<C>: Send + Sync + 'static {
    /// Create a new connection. It is expected to report `is_closed() == true`.
    fn create(&self) -> C;
}

impl<C, F> ConnectionFactory<C> for F
where
    F: Fn() -> C + Send + Sync + 'static,
{
    fn create(&self) -> C {
        self()
    }
}

/// Occupancy of a handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleState {
    /// Free for dispatch if the connection is open.
    #[default]
    Idle,
    /// Held by a task or a handshake; the tag names who holds it.
    Busy(Option<String>),
}

impl HandleState {
    /// True for [`HandleState::Busy`].
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

/// Point-in-time view of a pooled handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleSnapshot {
    /// Handle identifier.
    pub id: HandleId,
    /// Whether the connection currently has no live session.
    pub closed: bool,
    /// Idle or busy (with optional holder tag).
    pub state: HandleState,
}

/// The pool's bookkeeping wrapper around one connection.
pub(crate) struct ConnectionHandle<C> {
    pub(crate) id: HandleId,
    pub(crate) connection: Arc<C>,
    pub(crate) state: HandleState,
    /// A handshake owns the handle. Tracked apart from `state`, whose tag callers choose.
    pub(crate) handshaking: bool,
    /// Stops the lifecycle watcher; `None` until the first successful handshake.
    pub(crate) watcher: Option<CancellationToken>,
}

impl<C: Connection> ConnectionHandle<C> {
    pub(crate) fn new(id: HandleId, connection: C) -> Self {
        Self {
            id,
            connection: Arc::new(connection),
            state: HandleState::Idle,
            handshaking: false,
            watcher: None,
        }
    }

    /// Open and not held by anyone.
    pub(crate) fn is_available(&self) -> bool {
        !self.state.is_busy() && !self.connection.is_closed()
    }

    /// Shrink-time disposability: lower ranks are evicted first.
    pub(crate) fn disposability_rank(&self) -> u8 {
        if self.state.is_busy() {
            2
        } else if self.connection.is_closed() {
            0
        } else {
            1
        }
    }

    /// Unsubscribe from lifecycle notifications, then close the session.
    pub(crate) fn retire(mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.cancel();
        }
        self.connection.close();
    }

    pub(crate) fn snapshot(&self) -> HandleSnapshot {
        HandleSnapshot {
            id: self.id,
            closed: self.connection.is_closed(),
            state: self.state.clone(),
        }
    }
}
