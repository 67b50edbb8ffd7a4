//! A mutex that parks the *fiber*, not the OS thread, while contended.
//!
//! Unlocking hands ownership directly to the next queued waiter rather than
//! merely unlocking and letting everyone race for it again: the waiter is
//! marked owner before it's woken, so by the time it resumes the lock is
//! already its to take. This rules out barging — a fiber that arrives at
//! `lock()` while others are already queued always goes to the back of the
//! queue, never ahead of a longer-waiting fiber.

use crate::context::FiberId;
use crate::queue::ReadyQueue;
use crate::scheduler;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex as StdMutex;
use std::thread;
use std::time::Duration;

struct State {
    locked: bool,
    owner: Option<FiberId>,
}

/// A mutual-exclusion lock safe to hold across a fiber's suspension points.
/// Contended `lock()` calls from within a fiber park it instead of spinning
/// the OS thread; calls from outside any fiber (the bootstrap main context,
/// or plain OS-thread code sharing the data with fibers) fall back to a
/// short spin, since there's no fiber to park.
pub struct Mutex<T> {
    checked: bool,
    state: StdMutex<State>,
    waiters: ReadyQueue,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Builds a mutex using the installing thread's default checked-mode
    /// setting (see `RuntimeConfigBuilder::checked_mutexes`).
    pub fn new(value: T) -> Self {
        Self::with_checked(value, scheduler::checked_mutexes_default())
    }

    /// Builds a mutex with an explicit checked-mode setting, overriding the
    /// thread default. In checked mode, unlocking from a fiber that isn't
    /// the current owner panics instead of silently corrupting state.
    pub fn with_checked(value: T, checked: bool) -> Self {
        Mutex {
            checked,
            state: StdMutex::new(State { locked: false, owner: None }),
            waiters: ReadyQueue::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, parking the calling fiber while it's held
    /// elsewhere.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            let mut guard = self.state.lock().unwrap();
            if !guard.locked {
                guard.locked = true;
                guard.owner = scheduler::current_fiber_id();
                return MutexGuard { mutex: self };
            }

            if scheduler::is_fiberized() {
                let ctx = scheduler::current_context()
                    .expect("is_fiberized() true but no current context");
                // Mark Waiting before enqueuing, and enqueue while still
                // holding `state`'s lock: `unlock` also takes it before
                // popping a waiter, so the two can't interleave and a
                // wakeup can never be missed here.
                ctx.set_state(crate::context::State::Waiting);
                self.waiters.push(ctx);
                drop(guard);
                scheduler::park_current();
                // `unlock` made us the owner before waking us; the lock is
                // already ours, no need to recheck `locked`.
                return MutexGuard { mutex: self };
            }

            drop(guard);
            thread::yield_now();
            thread::sleep(Duration::from_micros(50));
        }
    }

    /// Acquires the lock without blocking, returning `None` if it's held.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let mut guard = self.state.lock().unwrap();
        if guard.locked {
            return None;
        }
        guard.locked = true;
        guard.owner = scheduler::current_fiber_id();
        Some(MutexGuard { mutex: self })
    }

    fn unlock(&self) {
        let mut guard = self.state.lock().unwrap();
        if self.checked {
            let me = scheduler::current_fiber_id();
            assert_eq!(
                guard.owner, me,
                "Mutex unlocked by a fiber that isn't its owner"
            );
        }
        loop {
            match self.waiters.pop() {
                // A queued waiter that somehow terminated without ever
                // being handed the lock is skipped silently rather than
                // handed a lock it'll never release.
                Some(next) if next.state() == crate::context::State::Terminated => continue,
                Some(next) => {
                    // Direct handoff: lock stays held, ownership moves to
                    // `next` before it's woken, so nothing else can
                    // acquire it in between.
                    guard.owner = Some(next.id);
                    drop(guard);
                    scheduler::wakeup(next);
                    return;
                }
                None => {
                    guard.locked = false;
                    guard.owner = None;
                    return;
                }
            }
        }
    }
}

/// RAII guard returned by `Mutex::lock`/`try_lock`. Unlocks on drop.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<'a, T> MutexGuard<'a, T> {
    /// Exposes the mutex this guard borrows from, for primitives built on
    /// top of it (see `CondVar::wait`) that need to release and reacquire
    /// it explicitly.
    pub(crate) fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<'a, T> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
