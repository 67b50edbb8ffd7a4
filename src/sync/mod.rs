//! Fiber-aware synchronization primitives: a `Mutex` and `CondVar` that
//! park the waiting fiber instead of blocking the OS thread, so a thread
//! with other ready fibers keeps making progress while one of them waits.

mod condvar;
mod mutex;

pub use condvar::CondVar;
pub use mutex::{Mutex, MutexGuard};
