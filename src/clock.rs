//! Small helpers around `std::time::Instant` for expressing timeouts the
//! way the rest of the crate wants them: an absolute deadline, not a
//! duration recomputed at every retry.

use std::time::{Duration, Instant};

/// An absolute point in time, computed once and reused across a retry
/// loop so a string of short operations can't add up to more than the
/// caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now() + timeout)
    }

    /// A deadline at an already-computed instant.
    pub fn at(instant: Instant) -> Self {
        Deadline(instant)
    }

    pub fn is_past(&self) -> bool {
        Instant::now() >= self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn instant(&self) -> Instant {
        self.0
    }
}
