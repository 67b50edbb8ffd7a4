use std::sync::atomic::{AtomicU64, Ordering};

static NEXT: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a [`RawContext`](crate::RawContext), unique for the
/// lifetime of the process. `fiber_rt` has its own, higher-level `FiberId` —
/// this one exists only so raw contexts are distinguishable in logs/debug
/// output at this layer, independent of any scheduling metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId(u64);

impl RawId {
    pub(crate) fn next() -> RawId {
        RawId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}
