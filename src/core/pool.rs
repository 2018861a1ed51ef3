//! Ordered collection of connection handles and its resize reconciliation.

use crate::core::connection::{
    Connection, ConnectionFactory, ConnectionHandle, HandleId, HandleSnapshot,
};

/// Ordered pool of connection handles.
///
/// Order is the dispatch preference: the first available handle wins.
pub(crate) struct ConnectionPool<C> {
    handles: Vec<ConnectionHandle<C>>,
    next_id: HandleId,
}

impl<C> ConnectionPool<C> {
    pub(crate) const fn new() -> Self {
        Self {
            handles: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> &mut ConnectionHandle<C> {
        &mut self.handles[index]
    }

    pub(crate) fn get_mut(&mut self, id: HandleId) -> Option<&mut ConnectionHandle<C>> {
        self.handles.iter_mut().find(|h| h.id == id)
    }

    pub(crate) fn ids(&self) -> Vec<HandleId> {
        self.handles.iter().map(|h| h.id).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ConnectionHandle<C>> {
        self.handles.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConnectionHandle<C>> {
        self.handles.iter_mut()
    }
}

impl<C: Connection> ConnectionPool<C> {
    /// Grow or shrink to exactly `target` handles.
    ///
    /// Growth appends fresh handles at the tail. Shrink evicts the most
    /// disposable handles (closed, then idle, then busy; later positions first
    /// within a class) and keeps survivors in their existing order. Evicted
    /// handles are returned still subscribed and open; the caller retires them.
    pub(crate) fn resize(
        &mut self,
        target: usize,
        factory: &dyn ConnectionFactory<C>,
    ) -> Vec<ConnectionHandle<C>> {
        while self.handles.len() < target {
            let id = self.next_id;
            self.next_id += 1;
            self.handles.push(ConnectionHandle::new(id, factory.create()));
        }

        let excess = self.handles.len() - target;
        if excess == 0 {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..self.handles.len()).collect();
        order.sort_by_key(|&i| (self.handles[i].disposability_rank(), std::cmp::Reverse(i)));
        let mut doomed = vec![false; self.handles.len()];
        for &i in order.iter().take(excess) {
            doomed[i] = true;
        }

        let mut evicted = Vec::with_capacity(excess);
        let mut kept = Vec::with_capacity(target);
        for (handle, evict) in self.handles.drain(..).zip(doomed) {
            if evict {
                evicted.push(handle);
            } else {
                kept.push(handle);
            }
        }
        self.handles = kept;
        evicted
    }

    /// Index of the first open, idle handle in pool order.
    pub(crate) fn first_available(&self) -> Option<usize> {
        self.handles.iter().position(ConnectionHandle::is_available)
    }

    pub(crate) fn snapshot(&self) -> Vec<HandleSnapshot> {
        self.handles.iter().map(ConnectionHandle::snapshot).collect()
    }
}
