//! The per-thread runtime: installs a scheduling algorithm, owns the
//! waiting queue, and drives the dispatcher loop that switches between
//! fibers.
//!
//! Mirrors the teacher's `Scheduler::with`/singleton shape, generalized from
//! one process-wide instance to one instance per participating OS thread,
//! and from a single hardcoded policy to whatever
//! [`SchedulingAlgorithm`](crate::algo::SchedulingAlgorithm) the caller
//! installs.

use crate::algo::SchedulingAlgorithm;
use crate::config::RuntimeConfig;
use crate::context::{Context, FiberId, Outcome, Role, State};
use crate::error::SpawnError;
use crate::queue::WaitingQueue;
use raw_fiber::{RawContext, Transfer};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

struct SchedulerCore {
    algorithm: Arc<dyn SchedulingAlgorithm>,
    waiting: WaitingQueue,
    stack_allocator: Arc<dyn raw_fiber::StackAllocator>,
    worker_stack_size: usize,
    checked_mutexes: bool,
    main: Arc<Context>,
    dispatcher: Arc<Context>,
}

/// A weak, cheaply-cloneable reference to the scheduler that currently owns
/// a context. Weak so that a context's back-reference never keeps a thread's
/// scheduler alive by itself — only the thread-local install slot does.
#[derive(Clone)]
pub(crate) struct SchedulerHandle(Weak<SchedulerCore>);

impl SchedulerHandle {
    fn upgrade(&self) -> Option<Arc<SchedulerCore>> {
        self.0.upgrade()
    }
}

thread_local! {
    static SCHEDULER: RefCell<Option<Arc<SchedulerCore>>> = RefCell::new(None);
    static CURRENT: RefCell<Option<Arc<Context>>> = RefCell::new(None);
}

fn current_core() -> Arc<SchedulerCore> {
    SCHEDULER.with(|cell| {
        cell.borrow()
            .clone()
            .expect("no scheduler installed on this thread; call use_scheduling_algorithm first")
    })
}

fn handle_of(core: &Arc<SchedulerCore>) -> SchedulerHandle {
    SchedulerHandle(Arc::downgrade(core))
}

/// The context currently running on this thread, if any fiber (worker,
/// dispatcher, or the bootstrap main context) has been entered here.
pub(crate) fn current_context() -> Option<Arc<Context>> {
    CURRENT.with(|cell| cell.borrow().clone())
}

/// Installs a scheduling algorithm on the calling thread, establishing it
/// as a participant in the runtime. Must be called before any other fiber
/// operation on this thread, including `spawn`; calling it twice on one
/// thread is a programmer error.
///
/// This only installs the scheduler — it does not run anything. Spawn the
/// thread's initial fibers afterward, then call [`run`] to actually drive
/// them.
pub fn use_scheduling_algorithm(config: RuntimeConfig) {
    SCHEDULER.with(|cell| {
        if cell.borrow().is_some() {
            panic!("use_scheduling_algorithm called twice on the same thread");
        }
    });

    config.algorithm.register_thread();

    let main_ctx = Context::new_bootstrap(Role::Main);
    main_ctx.set_state(State::Running);
    CURRENT.with(|cell| *cell.borrow_mut() = Some(main_ctx.clone()));

    let stack = config
        .stack_allocator
        .allocate(config.dispatcher_stack_size)
        .expect("failed to allocate the dispatcher's stack");
    let dispatcher_raw = RawContext::new(stack, dispatcher_trampoline);
    let dispatcher_ctx = Context::new(Role::Dispatcher, dispatcher_raw, None, None);

    let core = Arc::new(SchedulerCore {
        algorithm: config.algorithm,
        waiting: WaitingQueue::new(),
        stack_allocator: config.stack_allocator,
        worker_stack_size: config.worker_stack_size,
        checked_mutexes: config.checked_mutexes,
        main: main_ctx.clone(),
        dispatcher: dispatcher_ctx.clone(),
    });

    dispatcher_ctx.set_scheduler(handle_of(&core));
    main_ctx.set_scheduler(handle_of(&core));
    SCHEDULER.with(|cell| *cell.borrow_mut() = Some(core));
}

/// Drives this thread's dispatcher: runs every ready and newly-readied
/// fiber until none remain and nothing is pending in the waiting queue,
/// then returns. Safe to call again later (e.g. after spawning more work,
/// or to keep servicing a shared-queue/work-stealing policy that other
/// threads might still feed) — it resumes the same dispatcher loop exactly
/// where it last left off.
///
/// # Panics
/// Panics if called from within a fiber, or with no scheduler installed.
pub fn run() {
    let core = current_core();
    let current_role = current_context().map(|ctx| ctx.role);
    if current_role != Some(Role::Main) {
        panic!("run() must be called from the thread's own main context, not from within a fiber");
    }

    // Only the dispatcher's very first resume needs to smuggle its own
    // `Arc` through for its trampoline's `enter()` to reclaim; later calls
    // are just resuming it from its own last `suspend()`.
    let already_started = core.dispatcher.mark_started();
    let arg = if already_started {
        0
    } else {
        Arc::into_raw(core.dispatcher.clone()) as usize
    };

    CURRENT.with(|cell| *cell.borrow_mut() = Some(core.main.clone()));
    let _ = unsafe { resume_dispatcher(&core, arg) };
}

unsafe fn resume_dispatcher(core: &Arc<SchedulerCore>, data: usize) -> usize {
    core.dispatcher.resume(data)
}

/// Checked mutex default for the scheduler installed on this thread.
pub(crate) fn checked_mutexes_default() -> bool {
    SCHEDULER.with(|cell| cell.borrow().as_ref().map(|c| c.checked_mutexes).unwrap_or(true))
}

/// Whether the calling thread is currently running inside a fiber (as
/// opposed to the bootstrap main context or no scheduler at all).
pub fn is_fiberized() -> bool {
    current_context()
        .map(|ctx| ctx.role == Role::Worker)
        .unwrap_or(false)
}

extern "C" fn dispatcher_trampoline(t: Transfer) -> ! {
    let data = raw_fiber::enter(t);
    let self_ctx = unsafe { Arc::from_raw(data as *const Context) };
    CURRENT.with(|cell| *cell.borrow_mut() = Some(self_ctx.clone()));
    self_ctx.set_state(State::Running);

    loop {
        let core = current_core();
        core.waiting.move_ready_to(Instant::now(), core.algorithm.as_ref());

        let next = if core.algorithm.has_ready() {
            core.algorithm.pick_next()
        } else {
            None
        };

        match next {
            Some(ctx) => {
                ctx.set_state(State::Running);
                // Only the very first resume needs to smuggle an owned
                // `Arc` through for the trampoline's `enter()` to reclaim;
                // every later resume is just returning from that fiber's
                // own `suspend()` call, which already holds its `Arc`.
                let already_started = ctx.mark_started();
                let arg = if already_started {
                    0
                } else {
                    Arc::into_raw(ctx.clone()) as usize
                };
                let result = unsafe { ctx.resume(arg) };
                CURRENT.with(|cell| *cell.borrow_mut() = Some(self_ctx.clone()));
                handle_suspended(&core, result);
            }
            None if core.waiting.is_empty() => {
                // Nothing ready and nothing pending a deadline: this
                // thread has no more work right now. Hand control back to
                // whoever is blocked in `run()`.
                CURRENT.with(|cell| *cell.borrow_mut() = Some(core.main.clone()));
                unsafe {
                    raw_fiber::suspend(0);
                }
                // Resumes here the next time `run()` is called.
                CURRENT.with(|cell| *cell.borrow_mut() = Some(self_ctx.clone()));
                self_ctx.set_state(State::Running);
            }
            None => {
                let deadline = next_wakeup(&core);
                core.algorithm.park(deadline);
            }
        }
    }
}

/// Bookkeeping after a worker's `resume()` call returns: the `usize` it
/// suspended with encodes why, via [`SuspendReason`].
fn handle_suspended(core: &Arc<SchedulerCore>, raw_reason: usize) {
    match SuspendReason::decode(raw_reason) {
        SuspendReason::Yielded(ctx) => {
            ctx.set_state(State::Ready);
            core.algorithm.awakened(ctx);
        }
        SuspendReason::Waiting(ctx) => {
            // Already linked into the waiting queue by `wait_until` before
            // the switch; nothing further to do here.
            let _ = ctx;
        }
        SuspendReason::Terminated(ctx) => {
            reclaim(&ctx);
        }
    }
}

fn next_wakeup(core: &Arc<SchedulerCore>) -> Option<Duration> {
    let _ = core;
    // Conservative fixed poll interval: precise "time of next deadline"
    // bookkeeping would need a peek into the waiting queue's head, which
    // would require taking its lock twice per iteration for little benefit
    // at the scales this runtime targets.
    Some(Duration::from_millis(1))
}

/// What a worker handed the dispatcher when it suspended, smuggled through
/// the raw `usize` that crosses the context switch. The payload is the
/// worker's own context, leaked back in through `Arc::into_raw` on the
/// worker's side of the switch and reclaimed here with `Arc::from_raw`.
enum SuspendReason {
    Yielded(Arc<Context>),
    Waiting(Arc<Context>),
    Terminated(Arc<Context>),
}

const TAG_MASK: usize = 0b11;
const TAG_YIELD: usize = 0b00;
const TAG_WAIT: usize = 0b01;
const TAG_TERMINATE: usize = 0b10;

impl SuspendReason {
    fn encode(self) -> usize {
        let (tag, ctx) = match self {
            SuspendReason::Yielded(ctx) => (TAG_YIELD, ctx),
            SuspendReason::Waiting(ctx) => (TAG_WAIT, ctx),
            SuspendReason::Terminated(ctx) => (TAG_TERMINATE, ctx),
        };
        let ptr = Arc::into_raw(ctx) as usize;
        debug_assert_eq!(ptr & TAG_MASK, 0, "Context is not sufficiently aligned to tag");
        ptr | tag
    }

    fn decode(raw: usize) -> SuspendReason {
        let tag = raw & TAG_MASK;
        let ptr = (raw & !TAG_MASK) as *const Context;
        let ctx = unsafe { Arc::from_raw(ptr) };
        match tag {
            TAG_YIELD => SuspendReason::Yielded(ctx),
            TAG_WAIT => SuspendReason::Waiting(ctx),
            TAG_TERMINATE => SuspendReason::Terminated(ctx),
            _ => unreachable!("unknown suspend reason tag"),
        }
    }
}

/// Frees a terminated context's stack once it is safe to: it must already
/// be unlinked from every queue (true here, since only the dispatcher
/// reaches this path, after the switch away from the fiber's own stack).
fn reclaim(ctx: &Arc<Context>) {
    ctx.reclaim_stack();
}

extern "C" fn worker_trampoline(t: Transfer) -> ! {
    let data = raw_fiber::enter(t);
    let ctx = unsafe { Arc::from_raw(data as *const Context) };
    CURRENT.with(|cell| *cell.borrow_mut() = Some(ctx.clone()));

    let entry = ctx
        .take_entry()
        .expect("worker fiber entered with no boxed entry function");

    let result = panic::catch_unwind(AssertUnwindSafe(entry));

    let outcome = match result {
        Ok(()) => Outcome::Normal,
        Err(payload) => {
            if payload.downcast_ref::<Cancelled>().is_some() {
                Outcome::Cancelled
            } else {
                Outcome::Panicked
            }
        }
    };

    ctx.set_state(State::Terminated);
    ctx.set_outcome(outcome);
    for joiner in ctx.take_joiners() {
        wakeup(joiner);
    }

    let reason = SuspendReason::Terminated(ctx).encode();
    unsafe {
        raw_fiber::suspend(reason);
    }
    unreachable!("terminated fiber was resumed");
}

/// Spawns a new fiber on the calling thread's scheduler, running `f` to
/// completion. Fails only if the stack allocator cannot satisfy the
/// request.
pub fn spawn<F>(f: F) -> Result<Arc<Context>, SpawnError>
where
    F: FnOnce() + Send + 'static,
{
    let core = current_core();
    let stack = core.stack_allocator.allocate(core.worker_stack_size)?;
    let raw = RawContext::new(stack, worker_trampoline);
    let ctx = Context::new(Role::Worker, raw, Some(handle_of(&core)), Some(Box::new(f)));
    core.algorithm.awakened(ctx.clone());
    Ok(ctx)
}

/// Suspends the current fiber, making it ready again immediately. The
/// dispatcher re-offers it to the algorithm and picks whatever runs next.
///
/// Must be called from within a fiber; calling it from the bootstrap main
/// context or outside any fiber is a programmer error.
pub fn yield_now() {
    let ctx = expect_running_fiber("yield_now");
    interruption_check(&ctx);
    let reason = SuspendReason::Yielded(ctx).encode();
    unsafe {
        raw_fiber::suspend(reason);
    }
    let refreshed = current_context().expect("current context missing after resume");
    interruption_check(&refreshed);
}

/// Suspends the current fiber until `deadline` or an explicit wakeup,
/// whichever comes first.
pub fn sleep_until(deadline: Instant) {
    let ctx = expect_running_fiber("sleep_until");
    interruption_check(&ctx);
    let core = current_core();
    ctx.set_state(State::Waiting);
    ctx.set_deadline(Some(deadline));
    core.waiting.push(ctx.clone());

    let reason = SuspendReason::Waiting(ctx).encode();
    unsafe {
        raw_fiber::suspend(reason);
    }
    let refreshed = current_context().expect("current context missing after resume");
    interruption_check(&refreshed);
}

/// Suspends the current fiber until it is explicitly woken (via `wakeup`,
/// or via a primitive like `Mutex`/`CondVar` built on the same mechanism),
/// with no deadline.
///
/// The caller must already have set the fiber's state to `Waiting` and
/// linked it into whatever structure will hand it back to `wakeup`,
/// *before* calling this — a wakeup racing with this call would otherwise
/// see the fiber still `Running` and skip it, losing it for good.
pub(crate) fn park_current() {
    let ctx = expect_running_fiber("park_current");
    debug_assert_eq!(
        ctx.state(),
        State::Waiting,
        "park_current called before marking the fiber Waiting"
    );
    let reason = SuspendReason::Waiting(ctx).encode();
    unsafe {
        raw_fiber::suspend(reason);
    }
    let refreshed = current_context().expect("current context missing after resume");
    interruption_check(&refreshed);
}

/// Marks `ctx` ready and offers it to its owning scheduler. A no-op if
/// `ctx` is already `ready` or `running`. `ctx`'s scheduler may be on a
/// different thread than the caller; the hand-off happens through the
/// algorithm's own cross-thread synchronization (the shared queue's mutex,
/// or the work-stealing deque/injector).
pub(crate) fn wakeup(ctx: Arc<Context>) {
    match ctx.state() {
        State::Ready | State::Running => return,
        State::Terminated => return,
        State::Waiting => {}
    }

    let Some(handle) = ctx.scheduler() else { return };
    let Some(core) = handle.upgrade() else { return };

    ctx.set_deadline(None);
    ctx.set_state(State::Ready);
    core.algorithm.awakened(ctx);
    core.algorithm.notify();
}

/// Sets `ctx`'s interrupt flag and wakes it if it is currently waiting.
pub fn interrupt(ctx: &Arc<Context>) {
    ctx.request_interrupt();
    wakeup(ctx.clone());
}

fn interruption_check(ctx: &Arc<Context>) {
    if ctx.take_interrupt() {
        panic::panic_any(Cancelled);
    }
}

/// Unwinding payload used to propagate a cancellation request through
/// scoped releases, caught at the fiber's trampoline and reported to
/// joiners as `Outcome::Cancelled` rather than `Outcome::Panicked`.
pub(crate) struct Cancelled;

/// Checks this fiber's pending interrupt without suspending. Call at a
/// designated interruption point in a long-running loop that doesn't
/// otherwise yield or wait often enough to notice a cancellation promptly.
pub fn interruption_point() {
    if let Some(ctx) = current_context() {
        interruption_check(&ctx);
    }
}

/// Blocks the current fiber until `ctx` terminates, returning its outcome.
pub fn join(ctx: &Arc<Context>) -> Outcome {
    loop {
        if let Some(outcome) = ctx.outcome() {
            return outcome;
        }
        let me = expect_running_fiber("join");
        me.set_state(State::Waiting);
        ctx.push_joiner(me.clone());
        // Re-check after registering: `ctx` may have terminated between the
        // check above and `push_joiner`, in which case nothing will ever
        // wake us, so wake ourselves immediately instead.
        if ctx.outcome().is_some() {
            wakeup(me);
        }
        let reason = SuspendReason::Waiting(me).encode();
        unsafe {
            raw_fiber::suspend(reason);
        }
        let refreshed = current_context().expect("current context missing after resume");
        interruption_check(&refreshed);
    }
}

pub fn current_fiber_id() -> Option<FiberId> {
    current_context().map(|ctx| ctx.id)
}

fn expect_running_fiber(op: &str) -> Arc<Context> {
    current_context().unwrap_or_else(|| panic!("{op}() called with no scheduler installed on this thread"))
}
