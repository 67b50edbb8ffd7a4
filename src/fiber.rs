//! The public fiber API: spawning, joining, interrupting, and the handful
//! of free functions a fiber calls on itself.
//!
//! Everything here is a thin wrapper around [`crate::scheduler`]. The one
//! thing it adds is a typed return value: the scheduler's own `spawn` only
//! knows how to run a `FnOnce()`, so [`spawn`] stashes the closure's result
//! in a slot the [`JoinHandle`] shares with it, the way a channel-backed
//! future would.

use crate::context::{Context, FiberId, Outcome};
use crate::error::{JoinError, SpawnError};
use crate::scheduler;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A spawned fiber's handle. Dropping it without calling `join` or `detach`
/// leaves the fiber running; it simply stops being joinable from here (its
/// result slot is dropped, but the fiber itself is unaffected).
pub struct JoinHandle<T> {
    ctx: Arc<Context>,
    result: Arc<Mutex<Option<T>>>,
}

/// Spawns `f` as a new fiber on the calling thread's scheduler.
///
/// # Panics
/// Panics if no scheduler has been installed on this thread (see
/// [`crate::use_scheduling_algorithm`]).
pub fn spawn<F, T>(f: F) -> Result<JoinHandle<T>, SpawnError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let result = Arc::new(Mutex::new(None));
    let slot = result.clone();
    let ctx = scheduler::spawn(move || {
        let value = f();
        *slot.lock().unwrap() = Some(value);
    })?;
    Ok(JoinHandle { ctx, result })
}

impl<T> JoinHandle<T> {
    /// This fiber's stable identifier.
    pub fn id(&self) -> FiberId {
        self.ctx.id
    }

    /// Requests cancellation. Takes effect the next time the fiber reaches
    /// an interruption point (`yield_now`, `sleep_until`, a blocking
    /// `Mutex`/`CondVar` wait, or an explicit `interruption_point` call).
    pub fn interrupt(&self) {
        scheduler::interrupt(&self.ctx);
    }

    /// Blocks the calling fiber until this one terminates, returning its
    /// result or the reason it didn't produce one.
    ///
    /// # Panics
    /// Panics if called with no scheduler installed, or outside any fiber
    /// (the bootstrap main context can't block like this — see
    /// `crate::use_scheduling_algorithm`'s docs for why it has no stack of
    /// its own to suspend from).
    pub fn join(self) -> Result<T, JoinError> {
        match scheduler::join(&self.ctx) {
            Outcome::Normal => Ok(self
                .result
                .lock()
                .unwrap()
                .take()
                .expect("fiber reported normal completion but left no result")),
            Outcome::Cancelled => Err(JoinError::Cancelled),
            Outcome::Panicked => Err(JoinError::Panicked),
        }
    }

    /// Lets the fiber run to completion unobserved. Equivalent to dropping
    /// the handle, spelled out for readers who want the intent explicit.
    pub fn detach(self) {}
}

/// Suspends the current fiber, making it ready again immediately so the
/// scheduler can run whatever else is pending before it resumes.
pub fn yield_now() {
    scheduler::yield_now();
}

/// Suspends the current fiber until `deadline`, or until another fiber
/// wakes it explicitly.
pub fn sleep_until(deadline: Instant) {
    scheduler::sleep_until(deadline);
}

/// Suspends the current fiber for `duration`.
pub fn sleep(duration: Duration) {
    scheduler::sleep_until(Instant::now() + duration);
}

/// Whether the calling thread is currently running inside a spawned fiber.
pub fn is_fiberized() -> bool {
    scheduler::is_fiberized()
}

/// Checks this fiber's pending interrupt without otherwise suspending.
pub fn interruption_point() {
    scheduler::interruption_point();
}

/// The running fiber's id, or `None` outside any fiber.
pub fn current_fiber_id() -> Option<FiberId> {
    scheduler::current_fiber_id()
}
