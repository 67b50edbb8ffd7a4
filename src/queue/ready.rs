//! FIFO queue of contexts ready to run.

use crate::context::Context;
use std::sync::{Arc, Mutex};

struct QueueState {
    head: Option<Arc<Context>>,
    tail: Option<Arc<Context>>,
}

/// An intrusive, O(1)-push/pop FIFO. Used as the per-thread run queue for
/// round-robin scheduling and as the single shared queue for work-sharing.
pub struct ReadyQueue {
    state: Mutex<QueueState>,
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyQueue {
    pub fn new() -> Self {
        ReadyQueue {
            state: Mutex::new(QueueState { head: None, tail: None }),
        }
    }

    /// Appends `ctx` to the tail. `ctx` must not already be linked into any
    /// queue.
    pub fn push(&self, ctx: Arc<Context>) {
        let mut state = self.state.lock().unwrap();
        unsafe { ctx.link.set(None) };
        match state.tail.take() {
            Some(old_tail) => unsafe { old_tail.link.set(Some(ctx.clone())) },
            None => state.head = Some(ctx.clone()),
        }
        state.tail = Some(ctx);
    }

    /// Removes and returns the head, if any.
    pub fn pop(&self) -> Option<Arc<Context>> {
        let mut state = self.state.lock().unwrap();
        let head = state.head.take()?;
        let next = unsafe { head.link.take() };
        if next.is_none() {
            state.tail = None;
        }
        state.head = next;
        Some(head)
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().head.is_none()
    }
}
