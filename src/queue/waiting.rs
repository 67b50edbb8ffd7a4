//! Deadline-ordered queue of contexts parked in a timed wait.

use crate::algo::SchedulingAlgorithm;
use crate::context::Context;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A singly-linked list ordered ascending by `deadline`, walked front to
/// back on every sweep. Contexts with no deadline (parked until explicitly
/// woken) are never pushed here — they live only in a `ReadyQueue`'s wait
/// list one layer up, or are woken directly by `notify`.
pub struct WaitingQueue {
    head: Mutex<Option<Arc<Context>>>,
}

impl Default for WaitingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitingQueue {
    pub fn new() -> Self {
        WaitingQueue { head: Mutex::new(None) }
    }

    /// Inserts `ctx` at the position that keeps the list sorted ascending by
    /// `ctx.deadline()`. `ctx` must carry a deadline and must not already be
    /// linked into any queue.
    pub fn push(&self, ctx: Arc<Context>) {
        let deadline = ctx.deadline().expect("pushed a context with no deadline onto the waiting queue");
        let mut head_slot = self.head.lock().unwrap();

        unsafe { ctx.link.set(None) };

        let mut cursor = head_slot.clone();
        let mut prev: Option<Arc<Context>> = None;

        while let Some(cur) = cursor {
            let cur_deadline = cur.deadline().unwrap_or(deadline);
            if cur_deadline > deadline {
                break;
            }
            let next = unsafe { cur.link.get() };
            prev = Some(cur);
            cursor = next;
        }

        match prev {
            Some(p) => {
                let rest = unsafe { p.link.take() };
                unsafe { ctx.link.set(rest) };
                unsafe { p.link.set(Some(ctx)) };
            }
            None => {
                let rest = head_slot.take();
                unsafe { ctx.link.set(rest) };
                *head_slot = Some(ctx);
            }
        }
    }

    /// Unlinks and hands every context whose deadline has passed, or whose
    /// interrupt flag is set, to `algo.awakened`. Walks the entire list
    /// rather than stopping at the first not-yet-due entry, because an
    /// interrupted context can sit anywhere regardless of deadline order.
    pub fn move_ready_to(&self, now: Instant, algo: &dyn SchedulingAlgorithm) {
        let mut head_slot = self.head.lock().unwrap();

        let mut kept_head: Option<Arc<Context>> = None;
        let mut kept_tail: Option<Arc<Context>> = None;
        let mut woken: Vec<Arc<Context>> = Vec::new();

        let mut cursor = head_slot.take();
        while let Some(cur) = cursor {
            let next = unsafe { cur.link.take() };
            cursor = next;

            let due = cur.deadline().map(|d| d <= now).unwrap_or(false);
            if due || cur.is_interrupted() {
                cur.set_deadline(None);
                cur.set_state(crate::context::State::Ready);
                woken.push(cur);
                continue;
            }

            match &kept_tail {
                Some(tail) => unsafe { tail.link.set(Some(cur.clone())) },
                None => kept_head = Some(cur.clone()),
            }
            kept_tail = Some(cur);
        }

        *head_slot = kept_head;
        drop(head_slot);

        for ctx in woken {
            algo.awakened(ctx);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.lock().unwrap().is_none()
    }
}
