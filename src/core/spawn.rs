//! Runtime-agnostic task spawning.

use std::future::Future;

/// Abstraction for spawning pool work onto a runtime.
///
/// The pool spawns one future per dispatched task, per handshake it drives in
/// the background, and per lifecycle watcher.
pub trait Spawn: Send + Sync + 'static {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
