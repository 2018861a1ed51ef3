//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use crate::core::Spawn;

/// Tokio-based spawner.
///
/// Without an explicit handle, futures go to the runtime the caller is
/// running in via `tokio::spawn`.
#[derive(Clone, Default)]
pub struct TokioSpawner {
    handle: Option<Arc<tokio::runtime::Handle>>,
}

impl TokioSpawner {
    /// Create a spawner bound to a specific runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Some(Arc::new(handle)),
        }
    }

    /// Create a spawner bound to the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.handle {
            Some(handle) => {
                handle.spawn(fut);
            }
            None => {
                tokio::spawn(fut);
            }
        }
    }
}
