//! Pool utilization counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::task::TaskOutcome;

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Handles in the pool.
    pub connections: usize,
    /// Handles with a live session.
    pub live_connections: usize,
    /// Handles held by a task or handshake.
    pub busy_connections: usize,
    /// Tasks waiting in the queue.
    pub queued_tasks: usize,
    /// Total tasks enqueued.
    pub submitted_tasks: u64,
    /// Tasks whose work function succeeded.
    pub completed_tasks: u64,
    /// Tasks whose work function failed.
    pub failed_tasks: u64,
    /// Tasks settled by their abort signal.
    pub cancelled_tasks: u64,
    /// Tasks rejected by `clear_queue` or shutdown.
    pub cleared_tasks: u64,
    /// Background handshakes that failed.
    pub reconnect_failures: u64,
}

/// Lock-free task counters.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub cleared: AtomicU64,
    pub reconnect_failures: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn record(&self, outcome: TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Completed => &self.completed,
            TaskOutcome::Failed => &self.failed,
            TaskOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump(counter: &AtomicU64, by: usize) {
        counter.fetch_add(by as u64, Ordering::Relaxed);
    }

    /// Fill the counter half of a [`PoolStats`].
    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        stats.submitted_tasks = self.submitted.load(Ordering::Relaxed);
        stats.completed_tasks = self.completed.load(Ordering::Relaxed);
        stats.failed_tasks = self.failed.load(Ordering::Relaxed);
        stats.cancelled_tasks = self.cancelled.load(Ordering::Relaxed);
        stats.cleared_tasks = self.cleared.load(Ordering::Relaxed);
        stats.reconnect_failures = self.reconnect_failures.load(Ordering::Relaxed);
    }
}
