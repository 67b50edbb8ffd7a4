//! Recoverable failure kinds the core surfaces. Programmer errors (double
//! install, unchecked-mutex misuse by a non-owner) panic instead — see the
//! module docs on `scheduler` and `sync::mutex` — because they indicate a
//! bug, not a condition a caller can sensibly recover from.

use thiserror::Error;

/// Failure to spawn a fiber. The only way `spawn` fails: everything else
/// about starting a fiber is infallible.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to allocate a fiber stack: {0}")]
    StackAlloc(#[from] raw_fiber::StackAllocError),
}

/// Failure to send or receive on a channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is disconnected: no senders or no receivers remain")]
    Disconnected,
}

/// Returned by a timed channel receive that ran out of time before a value
/// or a disconnect arrived.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeoutError {
    #[error("timed out waiting for a value")]
    Timeout,
    #[error("channel is disconnected: no senders remain")]
    Disconnected,
}

/// Returned by a non-blocking channel receive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    #[error("channel is empty")]
    Empty,
    #[error("channel is disconnected: no senders remain")]
    Disconnected,
}

/// Returned by `JoinHandle::join` when the fiber didn't complete normally.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("fiber was cancelled before it completed")]
    Cancelled,
    #[error("fiber panicked")]
    Panicked,
}
