//! The lowest-level piece of the runtime: a stack plus the machine registers
//! needed to resume it.
//!
//! This crate knows how to allocate a stack, start a function running on it,
//! and swap execution between two stacks. It does not know what a "fiber" is
//! in the scheduling sense, what state a context is in, or which thread owns
//! it — all of that lives one layer up, in `fiber_rt::Context`. Keeping the
//! register-swap discipline this narrow is what lets `fiber_rt` treat it as
//! an injectable collaborator: a different `RawContext`/`StackAllocator` pair
//! could replace this crate entirely without the scheduler noticing.
//!
//! The actual assembly trampolines are provided by the `context` crate
//! (the same building block used by other stackful-coroutine libraries in
//! the Rust ecosystem, e.g. `may` and `coio-rs`); this crate only adapts that
//! primitive to the `StackAllocator` contract the scheduler expects.

use context::stack::{ProtectedFixedSizeStack, Stack, StackError};
use context::Context as RawSwitch;
use std::cell::Cell;
use std::fmt;

mod id;
pub use id::RawId;

pub use context::Transfer;

/// A caller-specified minimum stack size, in bytes. `allocate` may round up
/// to page granularity but must never round down.
pub type StackSize = usize;

/// Failure to obtain a stack. The only error kind this crate surfaces; it
/// corresponds to `spawn`'s resource-exhaustion case one layer up.
#[derive(Debug, thiserror::Error)]
#[error("failed to allocate a {requested}-byte fiber stack: {source}")]
pub struct StackAllocError {
    requested: StackSize,
    #[source]
    source: StackError,
}

/// Injectable stack allocation strategy. `fiber_rt` depends only on this
/// trait, never on a concrete allocator, so callers can swap in pooled or
/// guard-paged stacks without touching the scheduler.
pub trait StackAllocator: Send + Sync + 'static {
    fn allocate(&self, min_size: StackSize) -> Result<ProtectedFixedSizeStack, StackAllocError>;
}

/// The default allocator: one `mmap`'d, guard-paged stack per fiber, freed
/// on drop. Fine for moderate fiber counts; a pooling allocator is a drop-in
/// replacement for workloads that spawn fibers in the inner loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStackAllocator;

impl StackAllocator for DefaultStackAllocator {
    fn allocate(&self, min_size: StackSize) -> Result<ProtectedFixedSizeStack, StackAllocError> {
        ProtectedFixedSizeStack::new(min_size).map_err(|source| StackAllocError {
            requested: min_size,
            source,
        })
    }
}

/// A raw, unmanaged execution context: a stack plus the suspended registers
/// needed to resume it. `None` once the context has run to completion and
/// handed control back for the last time — `resume` on a finished context is
/// a programmer error one layer up, never reached here because `fiber_rt`
/// never calls it.
pub struct RawContext {
    inner: Option<RawSwitch>,
    id: RawId,
    // Kept alive only so the stack outlives every `RawSwitch` that points
    // into it; never read directly once the trampoline has started.
    _stack: ProtectedFixedSizeStack,
}

// A `RawContext` points into its own heap-allocated stack, never into data
// owned by a particular thread, so moving it (and later resuming it) on a
// different thread is sound as far as this crate is concerned. `fiber_rt`
// is responsible for never resuming the same `RawContext` from two threads
// concurrently (the `scheduler` ownership pointer enforces that).
unsafe impl Send for RawContext {}

impl fmt::Debug for RawContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawContext").field("id", &self.id).finish()
    }
}

/// What a fiber entry point receives the first time it runs, and what it
/// hands back every time it suspends or is resumed. `fiber_rt` encodes a
/// `*mut` to its own per-fiber bootstrap data as `data` on first entry; on
/// every subsequent resume `data` is whatever the resumer passed.
pub type RawEntry = extern "C" fn(Transfer) -> !;

impl RawContext {
    /// Creates a context that will begin executing `entry` the first time
    /// it is resumed, running on `stack`.
    pub fn new(stack: ProtectedFixedSizeStack, entry: RawEntry) -> Self {
        let switch = unsafe { RawSwitch::new(&stack, entry) };
        RawContext {
            inner: Some(switch),
            id: RawId::next(),
            _stack: stack,
        }
    }

    pub fn id(&self) -> RawId {
        self.id
    }

    /// Transfers execution from the caller to `self`, passing `data` to
    /// whatever `self` is suspended at (or, on first entry, to its `entry`
    /// function). Blocks the calling stack — in the ordinary Rust sense, this
    /// is just a function call — until `self` suspends back to this exact
    /// call site, at which point it returns the `data` `self` handed back.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `self` is not concurrently being
    /// resumed from another thread, and that `self` has not already
    /// finished (its entry function returned `!`, so this can only happen if
    /// `fiber_rt` mistakenly resumes a terminated context).
    pub unsafe fn resume(&mut self, data: usize) -> usize {
        let switch = self
            .inner
            .take()
            .expect("resumed a raw context with no suspended state");
        let Transfer { context, data } = switch.resume(data);
        self.inner = Some(context);
        data
    }
}

thread_local! {
    // The point execution will return to when the fiber currently running on
    // this thread next suspends. Populated by `enter` on first entry and
    // refreshed by `suspend` every time control comes back, mirroring the
    // `CURRENT`/`PREV` bookkeeping a thread-local-based fiber API needs to
    // know who to hand control back to.
    static RETURN_POINT: Cell<Option<RawSwitch>> = Cell::new(None);
}

/// Must be called exactly once, as the first action inside a fiber's entry
/// trampoline, with the `Transfer` the trampoline was invoked with. Records
/// who resumed this fiber and returns the data they passed, so the
/// trampoline can hand it to user code.
pub fn enter(transfer: Transfer) -> usize {
    RETURN_POINT.with(|cell| cell.set(Some(transfer.context)));
    transfer.data
}

/// Suspends the fiber currently running on this thread, switching back to
/// whoever most recently resumed it. Returns the data passed the next time
/// this fiber is resumed.
///
/// # Safety
///
/// Must only be called from within a fiber's entry trampoline, after it has
/// called [`enter`], and only on the thread currently running that fiber.
pub unsafe fn suspend(data: usize) -> usize {
    let caller = RETURN_POINT
        .with(|cell| cell.take())
        .expect("suspend() called outside a raw_fiber entry trampoline");
    let Transfer { context, data } = caller.resume(data);
    RETURN_POINT.with(|cell| cell.set(Some(context)));
    data
}
