//! Strictly ordered queue of asynchronous operations.
//!
//! Each operation receives a [`Done`] token and is in flight until it
//! completes that token. The next operation starts only afterwards, so the
//! queue orders operations relative to each other while leaving every
//! operation free to fan out concurrent work internally.
//!
//! There is no timeout: an operation that never completes its token stalls
//! everything queued behind it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

pub type OperationId = u64;

type Operation = Box<dyn FnOnce(Done) + 'static>;

#[derive(Default)]
struct QueueInner {
    waiting: RefCell<VecDeque<(OperationId, Operation)>>,
    running: Cell<Option<OperationId>>,
    pumping: Cell<bool>,
    next_id: Cell<OperationId>,
    completed: Cell<u64>,
}

impl QueueInner {
    fn pump(self: &Rc<Self>) {
        // Completions that arrive while an operation body is still on the
        // stack are picked up by the loop below instead of recursing.
        if self.pumping.replace(true) {
            return;
        }
        while self.running.get().is_none() {
            let next = self.waiting.borrow_mut().pop_front();
            let Some((id, operation)) = next else {
                break;
            };
            self.running.set(Some(id));
            log::trace!("operation {id} started");
            operation(Done {
                queue: Rc::downgrade(self),
                id,
                completed: false,
            });
        }
        self.pumping.set(false);
    }

    fn finish(self: &Rc<Self>, id: OperationId) {
        debug_assert_eq!(self.running.get(), Some(id), "completed operation was not in flight");
        self.running.set(None);
        self.completed.set(self.completed.get() + 1);
        log::trace!("operation {id} completed");
        self.pump();
    }
}

/// Completion token of a queued operation.
///
/// Completing consumes the token, so an operation can finish at most once.
#[must_use = "the queue stays blocked until the operation completes its token"]
pub struct Done {
    queue: Weak<QueueInner>,
    id: OperationId,
    completed: bool,
}

impl Done {
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Marks the operation finished and admits the next one.
    pub fn complete(mut self) {
        self.completed = true;
        if let Some(queue) = self.queue.upgrade() {
            queue.finish(self.id);
        }
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if !self.completed && self.queue.strong_count() > 0 {
            log::warn!(
                "operation {} dropped its completion token; the queue is stalled",
                self.id
            );
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").field("id", &self.id).finish()
    }
}

/// Single-consumer queue admitting one operation at a time, in enqueue
/// order. Lives on the UI thread; clones share the same queue.
#[derive(Clone, Default)]
pub struct OperationQueue {
    inner: Rc<QueueInner>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `operation` and returns without waiting for it. If the queue
    /// is idle the operation starts before this call returns; otherwise it
    /// starts once everything ahead of it has completed.
    pub fn enqueue(&self, operation: impl FnOnce(Done) + 'static) -> OperationId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .waiting
            .borrow_mut()
            .push_back((id, Box::new(operation)));
        log::trace!("operation {id} enqueued");
        self.inner.pump();
        id
    }

    /// Operations waiting behind the one in flight.
    pub fn len(&self) -> usize {
        self.inner.waiting.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> Option<OperationId> {
        self.inner.running.get()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight().is_none() && self.is_empty()
    }

    pub fn completed(&self) -> u64 {
        self.inner.completed.get()
    }
}

impl fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationQueue")
            .field("in_flight", &self.in_flight())
            .field("waiting", &self.len())
            .field("completed", &self.completed())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/queue_tests.rs"]
mod tests;
