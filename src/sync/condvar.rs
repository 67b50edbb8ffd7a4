//! A fiber-aware condition variable paired with `sync::Mutex`.
//!
//! `wait` parks the calling fiber directly and is woken precisely by
//! `notify_one`/`notify_all` popping it off a FIFO queue — no spurious
//! wakeups, no polling. `wait_until` can't use the same queue (a context
//! has exactly one intrusive link, already spoken for by whichever queue
//! a plain `wait` would use) so it polls a generation counter in short
//! slices instead; it still wakes promptly on notify, just not from a
//! single suspend.

use super::mutex::MutexGuard;
use crate::context::State;
use crate::queue::ReadyQueue;
use crate::scheduler;
use std::sync::Mutex as StdMutex;
use std::thread;
use std::time::{Duration, Instant};

const POLL_SLICE: Duration = Duration::from_millis(5);

pub struct CondVar {
    waiters: ReadyQueue,
    generation: StdMutex<u64>,
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

impl CondVar {
    pub fn new() -> Self {
        CondVar {
            waiters: ReadyQueue::new(),
            generation: StdMutex::new(0),
        }
    }

    /// Releases `guard`'s mutex and parks the calling fiber until a
    /// `notify_one`/`notify_all` call wakes it, then reacquires the mutex
    /// and returns it.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex();

        if scheduler::is_fiberized() {
            let ctx = scheduler::current_context().expect("is_fiberized() true but no current context");
            // Mark Waiting and enqueue before releasing the mutex: any
            // `notify` that runs after this point, even without holding
            // the mutex itself, is guaranteed to find us.
            ctx.set_state(State::Waiting);
            self.waiters.push(ctx);
            drop(guard);
            scheduler::park_current();
        } else {
            drop(guard);
            thread::yield_now();
        }

        mutex.lock()
    }

    /// Like `wait`, but gives up and returns after `deadline`. The second
    /// element of the returned pair is `true` if it timed out.
    pub fn wait_until<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Instant,
    ) -> (MutexGuard<'a, T>, bool) {
        let mutex = guard.mutex();
        let seen = *self.generation.lock().unwrap();
        drop(guard);

        let timed_out = loop {
            let now = Instant::now();
            if now >= deadline {
                break true;
            }
            if *self.generation.lock().unwrap() != seen {
                break false;
            }

            let slice = now + POLL_SLICE.min(deadline.saturating_duration_since(now));
            if scheduler::is_fiberized() {
                scheduler::sleep_until(slice);
            } else {
                thread::sleep(slice.saturating_duration_since(Instant::now()));
            }

            if *self.generation.lock().unwrap() != seen {
                break false;
            }
        };

        (mutex.lock(), timed_out)
    }

    /// Wakes one waiting fiber, if any, and bumps the generation counter
    /// timed waiters poll against.
    pub fn notify_one(&self) {
        *self.generation.lock().unwrap() += 1;
        if let Some(ctx) = self.waiters.pop() {
            scheduler::wakeup(ctx);
        }
    }

    /// Wakes every waiting fiber and bumps the generation counter.
    pub fn notify_all(&self) {
        *self.generation.lock().unwrap() += 1;
        while let Some(ctx) = self.waiters.pop() {
            scheduler::wakeup(ctx);
        }
    }
}
