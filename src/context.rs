//! The per-fiber control block: a stack, scheduling metadata, and the
//! intrusive link queues use to thread it onto a ready or waiting list.
//!
//! `Context` owns a [`raw_fiber::RawContext`] but adds everything the
//! scheduler needs that the raw layer doesn't know about: a role (is this the
//! thread's `main`, its `dispatcher`, or an ordinary `worker`?), a state
//! machine, a wait deadline, an interrupt flag, the back-reference to the
//! scheduler currently allowed to resume it, and the list of fibers joined on
//! its termination.

use crate::queue::Link;
use crate::scheduler::SchedulerHandle;
use raw_fiber::RawContext;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable, opaque identifier for a fiber, unique for the process's lifetime.
pub type FiberId = u64;

/// Which of the three roles a context plays on its thread. Exactly one
/// `Main` and one `Dispatcher` context exist per scheduler; everything else
/// spawned by the user is a `Worker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Main,
    Dispatcher,
    Worker,
}

/// Where a context sits in its lifecycle. See the module-level invariants in
/// `scheduler` for the legal transitions between these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Ready,
    Running,
    Waiting,
    Terminated,
}

/// How a terminated fiber's entry function stopped running, reported to its
/// joiners. `Cancelled` and `Panicked` are both failures to the caller of
/// `join`, but only `Panicked` indicates a bug rather than a requested
/// cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Normal,
    Cancelled,
    Panicked,
}

pub(crate) struct Mutable {
    pub state: State,
    pub deadline: Option<Instant>,
    pub scheduler: Option<SchedulerHandle>,
    pub joiners: Vec<Arc<Context>>,
    pub outcome: Option<Outcome>,
    pub entry: Option<Box<dyn FnOnce() + Send + 'static>>,
}

/// The control block for one fiber. Always held behind an `Arc`: the
/// scheduler, the queues it's linked into, and any `JoinHandle`s all share
/// ownership, and the context is reclaimed (its stack freed) only once the
/// last of them drops it after it has terminated.
pub struct Context {
    pub id: FiberId,
    pub role: Role,
    pub(crate) link: Link,
    pub(crate) interrupt_requested: AtomicBool,
    started: AtomicBool,
    // Deliberately *not* behind `mutable`'s lock: `resume` calls into this
    // context's own stack and doesn't return until that fiber suspends,
    // which is exactly when the fiber runs code that needs `mutable` (e.g.
    // `set_state` on itself right after entry). Holding `mutable`'s lock
    // across `resume` would make that a self-deadlock. Soundness instead
    // rests on the scheduler's own "strictly sequential per thread, resumed
    // only by its current owner" discipline: at most one thread ever calls
    // `resume` on a given context at a time, and `reclaim_stack` only runs
    // after that context has terminated and control has switched away from
    // it for good.
    raw: UnsafeCell<Option<RawContext>>,
    pub(crate) mutable: Mutex<Mutable>,
}

// See the comment on `raw`: every access goes through `resume` or
// `reclaim_stack`, both of which the scheduler only ever calls under the
// single-owner-at-a-time discipline that also guards `RawContext::resume`
// itself.
unsafe impl Sync for Context {}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Context {}

impl std::hash::Hash for Context {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Context {
    pub(crate) fn new(
        role: Role,
        raw: RawContext,
        scheduler: Option<SchedulerHandle>,
        entry: Option<Box<dyn FnOnce() + Send + 'static>>,
    ) -> Arc<Context> {
        Arc::new(Context {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            role,
            link: Link::new(),
            interrupt_requested: AtomicBool::new(false),
            started: AtomicBool::new(false),
            raw: UnsafeCell::new(Some(raw)),
            mutable: Mutex::new(Mutable {
                state: State::Ready,
                deadline: None,
                scheduler,
                joiners: Vec::new(),
                outcome: None,
                entry,
            }),
        })
    }

    /// Builds the bookkeeping-only context representing the thread's own
    /// call stack (`Role::Main`). It owns no `RawContext`: handing control
    /// back to it is done by suspending straight back into the call that
    /// blocked on the dispatcher, not through the generic resume path, so
    /// it never needs one.
    pub(crate) fn new_bootstrap(role: Role) -> Arc<Context> {
        Arc::new(Context {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            role,
            link: Link::new(),
            interrupt_requested: AtomicBool::new(false),
            started: AtomicBool::new(false),
            raw: UnsafeCell::new(None),
            mutable: Mutex::new(Mutable {
                state: State::Ready,
                deadline: None,
                scheduler: None,
                joiners: Vec::new(),
                outcome: None,
                entry: None,
            }),
        })
    }

    pub(crate) fn take_entry(&self) -> Option<Box<dyn FnOnce() + Send + 'static>> {
        self.mutable.lock().unwrap().entry.take()
    }

    pub fn state(&self) -> State {
        self.mutable.lock().unwrap().state
    }

    pub(crate) fn set_state(&self, state: State) {
        self.mutable.lock().unwrap().state = state;
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.mutable.lock().unwrap().deadline
    }

    pub(crate) fn set_deadline(&self, deadline: Option<Instant>) {
        self.mutable.lock().unwrap().deadline = deadline;
    }

    pub(crate) fn scheduler(&self) -> Option<SchedulerHandle> {
        self.mutable.lock().unwrap().scheduler.clone()
    }

    /// Clears the owning scheduler. Must be called before the context is
    /// re-offered to a different scheduler via `awakened` — see the
    /// migration discipline in `scheduler::wakeup` and the work-stealing
    /// algorithm.
    pub(crate) fn clear_scheduler(&self) {
        self.mutable.lock().unwrap().scheduler = None;
    }

    pub(crate) fn set_scheduler(&self, scheduler: SchedulerHandle) {
        self.mutable.lock().unwrap().scheduler = Some(scheduler);
    }

    pub(crate) fn push_joiner(&self, joiner: Arc<Context>) {
        self.mutable.lock().unwrap().joiners.push(joiner);
    }

    pub(crate) fn take_joiners(&self) -> Vec<Arc<Context>> {
        std::mem::take(&mut self.mutable.lock().unwrap().joiners)
    }

    pub(crate) fn set_outcome(&self, outcome: Outcome) {
        self.mutable.lock().unwrap().outcome = Some(outcome);
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.mutable.lock().unwrap().outcome
    }

    pub fn request_interrupt(&self) {
        self.interrupt_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt_requested.load(Ordering::SeqCst)
    }

    /// Consumes the pending interrupt, if any. Called only at an
    /// interruption point, which is what makes cancellation observable only
    /// at well-defined program points rather than asynchronously.
    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupt_requested.swap(false, Ordering::SeqCst)
    }

    /// Marks this context as having been resumed at least once, returning
    /// whether it had already been started before this call. Lets the
    /// dispatcher know whether the upcoming `resume()` must smuggle in a
    /// bootstrap `Arc` pointer (first entry, consumed by the trampoline's
    /// `enter()`) or nothing at all (a plain resumption of suspended code,
    /// which already holds its own `Arc<Context>`).
    pub(crate) fn mark_started(&self) -> bool {
        self.started.swap(true, Ordering::SeqCst)
    }

    /// Resumes this context from the scheduler's thread, passing `data`
    /// through to whatever it's suspended at. Returns the data it hands
    /// back the next time it suspends.
    ///
    /// # Safety
    /// Only the scheduler currently named in `self.scheduler()` may call
    /// this, and only while `self` is not already linked into any queue.
    /// The caller must not hold any lock the resumed fiber might itself try
    /// to acquire on `self` — `raw` is reached through `UnsafeCell` rather
    /// than `mutable` precisely so this call doesn't have to hold one.
    pub(crate) unsafe fn resume(&self, data: usize) -> usize {
        let raw = &mut *self.raw.get();
        let raw = raw
            .as_mut()
            .expect("resumed a context whose stack has already been reclaimed");
        raw.resume(data)
    }

    /// Drops the raw context (and with it, the stack) once this context has
    /// terminated, been unlinked from every queue, and has no remaining
    /// joiner references — see `scheduler`'s reclamation pass.
    pub(crate) fn reclaim_stack(&self) {
        unsafe {
            *self.raw.get() = None;
        }
    }
}
