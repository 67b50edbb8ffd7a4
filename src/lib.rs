//! A cooperative, user-space fiber runtime: lightweight execution contexts
//! multiplexed across OS threads by a pluggable scheduling policy, with
//! synchronization primitives that park the fiber rather than the thread.
//!
//! Call [`use_scheduling_algorithm`] once per participating OS thread to
//! install a policy ([`RoundRobin`], [`SharedQueue`], or, with the
//! `work-stealing` feature, [`WorkStealing`]), [`spawn`] the thread's
//! initial fibers, then [`run`] to drive them to completion (or until the
//! policy's shared structures dry up, for threads sharing work with
//! others). [`sync::Mutex`]/[`sync::CondVar`] coordinate fibers the way
//! their standard-library counterparts coordinate threads; [`bounded`]/
//! [`unbounded`] channels and [`promise`] build on top of those the same
//! way.
//!
//! This crate deliberately does not do preemption, real-time deadlines,
//! cross-process fibers, or stack overflow detection — a fiber that never
//! yields, sleeps, or blocks on a primitive starves its thread, by design.

mod algo;
mod channel;
mod clock;
mod config;
mod context;
mod error;
mod fiber;
mod future;
mod queue;
mod scheduler;
pub mod sync;

pub use algo::{RoundRobin, SchedulingAlgorithm, SharedQueue};
#[cfg(feature = "work-stealing")]
pub use algo::WorkStealing;

pub use channel::{bounded, unbounded, Receiver, Sender};
pub use clock::Deadline;
pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use context::{FiberId, Outcome};
pub use error::{ChannelError, JoinError, RecvTimeoutError, SpawnError, TryRecvError};
pub use fiber::{
    current_fiber_id, interruption_point, is_fiberized, sleep, sleep_until, spawn, yield_now,
    JoinHandle,
};
pub use future::{promise, Future, Promise};
pub use scheduler::{run, use_scheduling_algorithm};
pub use sync::{CondVar, Mutex, MutexGuard};
