//! Strict per-thread round robin: a fiber runs on whichever thread spawned
//! or last woke it and never migrates. Simplest policy, and the right choice
//! when fibers hold thread-affine state (e.g. graphics contexts) that the
//! shared-queue and work-stealing policies would otherwise scatter across
//! threads.

use super::SchedulingAlgorithm;
use crate::context::Context;
use crate::queue::ReadyQueue;
use std::cell::RefCell;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

struct LocalState {
    queue: Arc<ReadyQueue>,
    park: Arc<(Mutex<()>, Condvar)>,
}

thread_local! {
    static LOCAL: RefCell<Option<LocalState>> = RefCell::new(None);
}

#[derive(Default)]
pub struct RoundRobin {
    _private: (),
}

impl RoundRobin {
    pub fn new() -> Self {
        RoundRobin { _private: () }
    }

    fn with_local<T>(&self, f: impl FnOnce(&LocalState) -> T) -> T {
        LOCAL.with(|cell| {
            let mut slot = cell.borrow_mut();
            let state = slot.get_or_insert_with(|| LocalState {
                queue: Arc::new(ReadyQueue::new()),
                park: Arc::new((Mutex::new(()), Condvar::new())),
            });
            f(state)
        })
    }
}

impl SchedulingAlgorithm for RoundRobin {
    fn register_thread(&self) {
        self.with_local(|_| {});
    }

    fn awakened(&self, ctx: Arc<Context>) {
        self.with_local(|state| state.queue.push(ctx));
        self.notify();
    }

    fn pick_next(&self) -> Option<Arc<Context>> {
        self.with_local(|state| state.queue.pop())
    }

    fn has_ready(&self) -> bool {
        self.with_local(|state| !state.queue.is_empty())
    }

    fn notify(&self) {
        self.with_local(|state| {
            let (_, condvar) = &*state.park;
            condvar.notify_one();
        });
    }

    fn park(&self, timeout: Option<Duration>) {
        self.with_local(|state| {
            let (mutex, condvar) = &*state.park;
            let guard = mutex.lock().unwrap();
            match timeout {
                Some(d) => {
                    let _ = condvar.wait_timeout(guard, d).unwrap();
                }
                None => {
                    let _ = condvar.wait(guard).unwrap();
                }
            }
        });
    }
}
