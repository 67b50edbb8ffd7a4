//! Work stealing: each thread owns a deque it pushes to and pops from
//! LIFO (cheap, cache-friendly for the common case of a fiber waking the
//! fiber it just handed work to), and idle threads steal FIFO from the
//! *back* of a random victim's deque so the stolen fiber is the one least
//! likely to be touched again soon.
//!
//! Only worker fibers ever reach this structure — a thread's own `main`
//! and `dispatcher` contexts are driven directly by its own dispatcher
//! loop and never pass through `SchedulingAlgorithm`, so there's nothing
//! here that needs to keep them out of the stealable deque.
//!
//! Requires the `work-stealing` feature, which pulls in `crossbeam-deque`.

use super::SchedulingAlgorithm;
use crate::context::Context;
use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use rand::seq::SliceRandom;
use std::cell::RefCell;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;

pub struct WorkStealing {
    injector: Injector<Arc<Context>>,
    stealers: RwLock<Vec<Stealer<Arc<Context>>>>,
    park: (Mutex<()>, Condvar),
}

thread_local! {
    static LOCAL_WORKER: RefCell<Option<Worker<Arc<Context>>>> = RefCell::new(None);
}

impl Default for WorkStealing {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkStealing {
    pub fn new() -> Self {
        WorkStealing {
            injector: Injector::new(),
            stealers: RwLock::new(Vec::new()),
            park: (Mutex::new(()), Condvar::new()),
        }
    }

    fn steal_from_others(&self, local: &Worker<Arc<Context>>) -> Option<Arc<Context>> {
        let stealers = self.stealers.read().unwrap();
        if stealers.is_empty() {
            return None;
        }

        let mut order: Vec<usize> = (0..stealers.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        for idx in order {
            loop {
                match stealers[idx].steal_batch_and_pop(local) {
                    Steal::Success(ctx) => return Some(ctx),
                    Steal::Retry => continue,
                    Steal::Empty => break,
                }
            }
        }
        None
    }
}

impl SchedulingAlgorithm for WorkStealing {
    fn register_thread(&self) {
        LOCAL_WORKER.with(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_none() {
                let worker = Worker::new_lifo();
                self.stealers.write().unwrap().push(worker.stealer());
                *slot = Some(worker);
            }
        });
    }

    fn awakened(&self, ctx: Arc<Context>) {
        let pushed_locally = LOCAL_WORKER.with(|cell| {
            if let Some(worker) = cell.borrow().as_ref() {
                worker.push(ctx.clone());
                true
            } else {
                false
            }
        });
        if !pushed_locally {
            self.injector.push(ctx);
        }
        self.notify();
    }

    fn pick_next(&self) -> Option<Arc<Context>> {
        LOCAL_WORKER.with(|cell| {
            let slot = cell.borrow();
            let local = slot.as_ref()?;

            if let Some(ctx) = local.pop() {
                return Some(ctx);
            }

            loop {
                match self.injector.steal_batch_and_pop(local) {
                    Steal::Success(ctx) => return Some(ctx),
                    Steal::Retry => continue,
                    Steal::Empty => break,
                }
            }

            self.steal_from_others(local)
        })
    }

    fn has_ready(&self) -> bool {
        let local_has_some = LOCAL_WORKER.with(|cell| {
            cell.borrow()
                .as_ref()
                .map(|w| !w.is_empty())
                .unwrap_or(false)
        });
        local_has_some || !self.injector.is_empty()
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
