//! Lock-free bounded event ring for the frame-path hot path.
//!
//! One producer (the host's per-tick update loop) and one consumer (the
//! flush path) share this ring without blocking each other. Internally it
//! uses `crossbeam::queue::ArrayQueue`, which provides lock-free bounded
//! queue operations without requiring unsafe code in this crate; overwrite
//! semantics come from `force_push`, which displaces the oldest element
//! when the ring is full.
//!
//! Eviction here is deliberate data loss: under sustained pressure the
//! most recent events are favored over the oldest, and producers never
//! observe an error.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

/// Bounded lock-free ring with overwrite-oldest semantics.
pub struct EventRing<T> {
    queue: ArrayQueue<T>,
    total_pushed: AtomicU64,
    total_evicted: AtomicU64,
}

impl<T> EventRing<T> {
    /// Create a ring with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            queue: ArrayQueue::new(capacity),
            total_pushed: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        }
    }

    /// Push an item, silently displacing the oldest when full.
    ///
    /// Returns the displaced item, if any. O(1), never blocks.
    pub fn push_overwrite(&self, item: T) -> Option<T> {
        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        let evicted = self.queue.force_push(item);
        if evicted.is_some() {
            self.total_evicted.fetch_add(1, Ordering::Relaxed);
        }
        evicted
    }

    /// Push an item only if there is room; returns it back when full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        match self.queue.push(item) {
            Ok(()) => {
                self.total_pushed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(item) => Err(item),
        }
    }

    /// Remove and return the oldest item.
    pub fn try_pop(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Dequeue up to `max` items in FIFO order.
    pub fn pop_batch(&self, max: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(max.min(self.queue.len()));
        while out.len() < max {
            match self.queue.pop() {
                Some(item) => out.push(item),
                None => break,
            }
        }
        out
    }

    /// Current queue depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Total items ever pushed.
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed.load(Ordering::Relaxed)
    }

    /// Total items displaced by overwrite.
    #[must_use]
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted.load(Ordering::Relaxed)
    }

    /// Drop all queued items.
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }
}

impl<T> std::fmt::Debug for EventRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("total_pushed", &self.total_pushed())
            .field("total_evicted", &self.total_evicted())
            .finish()
    }
}
