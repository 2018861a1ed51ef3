//! Pending tasks awaiting a free connection.

use std::collections::VecDeque;

use crate::core::task::{QueuedTask, TaskId};

/// Insertion-ordered task queue.
///
/// Priority tasks go to the head, so several priority tasks queued while no
/// connection is free run newest-first relative to each other. Callers that
/// need FIFO among priority tasks must not rely on priority insertion.
pub(crate) struct TaskQueue<C> {
    tasks: VecDeque<QueuedTask<C>>,
}

impl<C> TaskQueue<C> {
    pub(crate) const fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, task: QueuedTask<C>, priority: bool) {
        if priority {
            self.tasks.push_front(task);
        } else {
            self.tasks.push_back(task);
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<QueuedTask<C>> {
        self.tasks.pop_front()
    }

    /// Remove a still-queued task by id.
    pub(crate) fn remove(&mut self, id: TaskId) -> Option<QueuedTask<C>> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        self.tasks.remove(index)
    }

    /// Take every queued task, leaving the queue empty.
    pub(crate) fn drain(&mut self) -> Vec<QueuedTask<C>> {
        self.tasks.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }
}
