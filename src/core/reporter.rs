//! Subscribe-only channel for failures no caller is waiting on.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::{ConnectionError, HandleId};

/// A background handshake failed.
///
/// Raised by resize-, toggle- or lifecycle-triggered reconnects. The handle
/// stays closed and is skipped by dispatch until a later handshake succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectFailure {
    /// Handle whose handshake failed.
    pub handle: HandleId,
    /// The failure reported by the connection.
    #[serde(serialize_with = "serialize_display")]
    pub error: ConnectionError,
}

fn serialize_display<S: serde::Serializer>(
    error: &ConnectionError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Broadcasts [`ReconnectFailure`]s to every subscriber.
pub(crate) struct ErrorReporter {
    tx: broadcast::Sender<ReconnectFailure>,
}

impl ErrorReporter {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ReconnectFailure> {
        self.tx.subscribe()
    }

    pub(crate) fn report(&self, handle: HandleId, error: ConnectionError) {
        tracing::warn!("reconnect of handle {} failed: {}", handle, error);
        // No subscribers is fine; the failure is already logged.
        let _ = self.tx.send(ReconnectFailure { handle, error });
    }
}
