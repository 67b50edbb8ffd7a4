//! Pluggable scheduling policies.
//!
//! The scheduler's dispatcher loop doesn't know how ready fibers are queued
//! or handed out to threads; it only knows it can ask a
//! [`SchedulingAlgorithm`] for the next one to run, tell it when a fiber
//! becomes runnable again, and ask whether it has anything at all. Three
//! policies ship here: [`round_robin`] (one queue per thread, no sharing),
//! [`shared_queue`] (one queue shared by every thread, i.e. work sharing),
//! and [`work_stealing`] (one deque per thread, with idle threads stealing
//! from busy ones).

mod round_robin;
mod shared_queue;
#[cfg(feature = "work-stealing")]
mod work_stealing;

pub use round_robin::RoundRobin;
pub use shared_queue::SharedQueue;
#[cfg(feature = "work-stealing")]
pub use work_stealing::WorkStealing;

use crate::context::Context;
use std::sync::Arc;

/// A fiber's home while it waits to run. Implementations decide whether
/// that's a single global structure, one structure per OS thread, or
/// something else entirely; the scheduler only ever sees this trait.
///
/// Every method here must be safe to call with no fiber running on the
/// calling thread: the dispatcher and idle worker loops call these between
/// fiber resumes, never from inside one.
pub trait SchedulingAlgorithm: Send + Sync + 'static {
    /// Registers `ctx` as runnable again. Called after a fiber is spawned,
    /// after it's woken from a timed or explicit wait, and when a worker
    /// thread joins the scheduler. Takes ownership of placing `ctx`
    /// somewhere it will eventually be returned by `pick_next`.
    fn awakened(&self, ctx: Arc<Context>);

    /// Removes and returns one runnable fiber, if any is available to this
    /// thread. `pick_next` may look beyond purely-local state (e.g.
    /// stealing from another thread's queue); it must not block.
    fn pick_next(&self) -> Option<Arc<Context>>;

    /// Reports whether this thread could make progress right now without
    /// blocking — i.e. whether a subsequent `pick_next` might succeed. Used
    /// by the dispatcher to decide whether to park the thread.
    fn has_ready(&self) -> bool;

    /// Called once per OS thread that will run fibers under this algorithm,
    /// before its dispatcher loop starts, so implementations that keep
    /// per-thread state (round-robin, work-stealing) can register it.
    fn register_thread(&self) {}

    /// Wakes any thread that might be parked in `park`, after `awakened` has
    /// placed something new somewhere that thread could see.
    fn notify(&self) {}

    /// Blocks the calling thread until `notify` is called or `timeout`
    /// elapses, whichever comes first. Called by the dispatcher only after
    /// `has_ready()` returned `false` and the waiting queue has nothing due
    /// before `timeout`. The default spins briefly rather than sleeping,
    /// which is correct but wasteful — every policy shipped here overrides
    /// it with a real parking primitive.
    fn park(&self, timeout: Option<std::time::Duration>) {
        std::thread::sleep(timeout.unwrap_or(std::time::Duration::from_micros(50)).min(std::time::Duration::from_micros(50)));
    }
}
