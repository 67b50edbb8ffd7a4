//! Installation-time configuration for a thread's scheduler.

use crate::algo::SchedulingAlgorithm;
use raw_fiber::{DefaultStackAllocator, StackAllocator};
use std::sync::Arc;

const DEFAULT_WORKER_STACK_SIZE: usize = 64 * 1024;
const DEFAULT_DISPATCHER_STACK_SIZE: usize = 16 * 1024;

/// Settings passed to [`crate::use_scheduling_algorithm`]. Build one with
/// [`RuntimeConfig::builder`]; the `algorithm` is typically constructed once
/// and shared (via `Arc`) across every thread that participates in the same
/// scheduling policy instance — each thread still calls
/// `use_scheduling_algorithm` itself, passing its own clone of that `Arc`.
pub struct RuntimeConfig {
    pub(crate) worker_stack_size: usize,
    pub(crate) dispatcher_stack_size: usize,
    pub(crate) checked_mutexes: bool,
    pub(crate) algorithm: Arc<dyn SchedulingAlgorithm>,
    pub(crate) stack_allocator: Arc<dyn StackAllocator>,
}

impl RuntimeConfig {
    pub fn builder(algorithm: Arc<dyn SchedulingAlgorithm>) -> RuntimeConfigBuilder {
        RuntimeConfigBuilder {
            worker_stack_size: DEFAULT_WORKER_STACK_SIZE,
            dispatcher_stack_size: DEFAULT_DISPATCHER_STACK_SIZE,
            checked_mutexes: true,
            algorithm,
            stack_allocator: Arc::new(DefaultStackAllocator),
        }
    }
}

pub struct RuntimeConfigBuilder {
    worker_stack_size: usize,
    dispatcher_stack_size: usize,
    checked_mutexes: bool,
    algorithm: Arc<dyn SchedulingAlgorithm>,
    stack_allocator: Arc<dyn StackAllocator>,
}

impl RuntimeConfigBuilder {
    pub fn worker_stack_size(mut self, size: usize) -> Self {
        self.worker_stack_size = size;
        self
    }

    pub fn dispatcher_stack_size(mut self, size: usize) -> Self {
        self.dispatcher_stack_size = size;
        self
    }

    /// Whether `Mutex`es created on this thread default to checked ownership
    /// (panicking if `unlock` is called by a non-owner). Defaults to `true`;
    /// a given `Mutex::new` call can still override it explicitly.
    pub fn checked_mutexes(mut self, checked: bool) -> Self {
        self.checked_mutexes = checked;
        self
    }

    /// Overrides the default, `mmap`-backed guard-paged stack allocator.
    pub fn stack_allocator(mut self, allocator: Arc<dyn StackAllocator>) -> Self {
        self.stack_allocator = allocator;
        self
    }

    pub fn build(self) -> RuntimeConfig {
        RuntimeConfig {
            worker_stack_size: self.worker_stack_size,
            dispatcher_stack_size: self.dispatcher_stack_size,
            checked_mutexes: self.checked_mutexes,
            algorithm: self.algorithm,
            stack_allocator: self.stack_allocator,
        }
    }
}
