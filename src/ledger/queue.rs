//! Pending Queue
//!
//! Thread-safe holding area for validated events awaiting block assembly.
//! Producers enqueue concurrently; the single ChainBuilder writer drains.
//! Durability comes from the storage layer: every event is persisted as a
//! pending row before it enters this queue, and `recover_pending()` on the
//! service reloads the queue after a restart.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::ledger::event::AuditEvent;

pub struct PendingQueue {
    inner: Mutex<VecDeque<AuditEvent>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Append one event to the back of the queue.
    pub fn enqueue(&self, event: AuditEvent) {
        self.inner
            .lock()
            .expect("pending queue lock poisoned")
            .push_back(event);
    }

    /// Return previously drained events to the front of the queue,
    /// preserving their original order. Used when block persistence fails
    /// so no event is ever lost.
    pub fn requeue_front(&self, events: Vec<AuditEvent>) {
        let mut queue = self.inner.lock().expect("pending queue lock poisoned");
        for event in events.into_iter().rev() {
            queue.push_front(event);
        }
    }

    /// Atomically remove and return up to `max` events in FIFO order.
    pub fn drain(&self, max: usize) -> Vec<AuditEvent> {
        let mut queue = self.inner.lock().expect("pending queue lock poisoned");
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Atomically remove and return every pending event.
    pub fn drain_all(&self) -> Vec<AuditEvent> {
        let mut queue = self.inner.lock().expect("pending queue lock poisoned");
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("pending queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an event with the given id is currently pending.
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("pending queue lock poisoned")
            .iter()
            .any(|e| e.id == id)
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}
