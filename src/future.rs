//! A one-shot value handed from one fiber to another, built on the same
//! `Mutex` + `CondVar` pair as `channel` but sized for exactly one value.

use crate::sync::{CondVar, Mutex};
use std::sync::Arc;
use std::time::Instant;

struct Shared<T> {
    value: Mutex<Option<T>>,
    ready: CondVar,
}

/// The write side of a future. Dropping it without calling `fulfill`
/// leaves any waiter parked forever on `Future::wait`, unless it used
/// `wait_until` and the deadline eventually passes.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

/// The read side. `Future` here names a value that will exist, not an
/// `async`-style poll target — this runtime has no executor to poll it.
#[derive(Clone)]
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

/// Builds a connected `Promise`/`Future` pair over a value of type `T`.
pub fn promise<T>() -> (Promise<T>, Future<T>) {
    let shared = Arc::new(Shared {
        value: Mutex::new(None),
        ready: CondVar::new(),
    });
    (
        Promise { shared: shared.clone() },
        Future { shared },
    )
}

impl<T> Promise<T> {
    /// Hands the value to the future side, waking anything parked on it.
    /// Fulfilling an already-fulfilled promise overwrites the value
    /// silently; callers that need single-write semantics should enforce
    /// it themselves.
    pub fn fulfill(self, value: T) {
        let mut guard = self.shared.value.lock();
        *guard = Some(value);
        drop(guard);
        self.shared.ready.notify_all();
    }
}

impl<T: Clone> Future<T> {
    /// Blocks the calling fiber until the promise is fulfilled, then
    /// returns a clone of the value.
    pub fn wait(&self) -> T {
        let mut guard = self.shared.value.lock();
        loop {
            if let Some(value) = guard.as_ref() {
                return value.clone();
            }
            guard = self.shared.ready.wait(guard);
        }
    }

    /// Like `wait`, but gives up at `deadline`.
    pub fn wait_until(&self, deadline: Instant) -> Option<T> {
        let mut guard = self.shared.value.lock();
        loop {
            if let Some(value) = guard.as_ref() {
                return Some(value.clone());
            }
            if Instant::now() >= deadline {
                return None;
            }
            let (next_guard, timed_out) = self.shared.ready.wait_until(guard, deadline);
            guard = next_guard;
            if timed_out && guard.is_none() {
                return None;
            }
        }
    }

    /// Returns the value without blocking, if it's already there.
    pub fn try_get(&self) -> Option<T> {
        self.shared.value.lock().clone()
    }
}
