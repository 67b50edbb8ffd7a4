//! Work sharing: every thread pulls from, and pushes onto, one global ready
//! queue. Simple and fair, at the cost of that queue's mutex being a point
//! of contention as thread count grows — `work_stealing` exists for the
//! workloads where that matters.
//!
//! Only worker fibers ever reach this structure: a thread's own `main` and
//! `dispatcher` contexts are driven directly by its own dispatcher loop and
//! never pass through `SchedulingAlgorithm` at all, so there's no need to
//! special-case them here.

use super::SchedulingAlgorithm;
use crate::context::Context;
use crate::queue::ReadyQueue;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

pub struct SharedQueue {
    queue: ReadyQueue,
    park: (Mutex<()>, Condvar),
}

impl Default for SharedQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedQueue {
    pub fn new() -> Self {
        SharedQueue {
            queue: ReadyQueue::new(),
            park: (Mutex::new(()), Condvar::new()),
        }
    }
}

impl SchedulingAlgorithm for SharedQueue {
    fn awakened(&self, ctx: Arc<Context>) {
        self.queue.push(ctx);
        self.notify();
    }

    fn pick_next(&self) -> Option<Arc<Context>> {
        self.queue.pop()
    }

    fn has_ready(&self) -> bool {
        !self.queue.is_empty()
    }

    fn notify(&self) {
        self.park.1.notify_all();
    }

    fn park(&self, timeout: Option<Duration>) {
        let guard = self.park.0.lock().unwrap();
        match timeout {
            Some(d) => {
                let _ = self.park.1.wait_timeout(guard, d).unwrap();
            }
            None => {
                let _ = self.park.1.wait(guard).unwrap();
            }
        }
    }
}
