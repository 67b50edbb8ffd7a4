//! A fiber-aware MPMC channel, built the same way `sync::Mutex`/`CondVar`
//! are: a small protected core plus two condition variables, one for
//! "became non-empty" and one for "became non-full".

use crate::error::{ChannelError, RecvTimeoutError, TryRecvError};
use crate::sync::{CondVar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    not_empty: CondVar,
    not_full: CondVar,
    capacity: Option<usize>,
    senders: Mutex<usize>,
    receivers: Mutex<usize>,
}

pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

/// Builds an unbounded channel: `send` never blocks on capacity.
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    new_channel(None)
}

/// Builds a channel that blocks senders once `capacity` items are queued.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    new_channel(Some(capacity))
}

fn new_channel<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        not_empty: CondVar::new(),
        not_full: CondVar::new(),
        capacity,
        senders: Mutex::new(1),
        receivers: Mutex::new(1),
    });
    (
        Sender { shared: shared.clone() },
        Receiver { shared },
    )
}

impl<T> Sender<T> {
    /// Blocks until there is room (bounded channels only) or the last
    /// receiver has dropped.
    pub fn send(&self, value: T) -> Result<(), ChannelError> {
        let mut guard = self.shared.queue.lock();
        loop {
            if *self.shared.receivers.lock() == 0 {
                return Err(ChannelError::Disconnected);
            }
            match self.shared.capacity {
                Some(cap) if guard.len() >= cap => {
                    guard = self.shared.not_full.wait(guard);
                }
                _ => break,
            }
        }
        guard.push_back(value);
        drop(guard);
        self.shared.not_empty.notify_one();
        Ok(())
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        *self.shared.senders.lock() += 1;
        Sender { shared: self.shared.clone() }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut count = self.shared.senders.lock();
        *count -= 1;
        if *count == 0 {
            drop(count);
            self.shared.not_empty.notify_all();
        }
    }
}

impl<T> Receiver<T> {
    /// Blocks until a value is available or every sender has dropped.
    pub fn recv(&self) -> Result<T, ChannelError> {
        let mut guard = self.shared.queue.lock();
        loop {
            if let Some(value) = guard.pop_front() {
                drop(guard);
                self.shared.not_full.notify_one();
                return Ok(value);
            }
            if *self.shared.senders.lock() == 0 {
                return Err(ChannelError::Disconnected);
            }
            guard = self.shared.not_empty.wait(guard);
        }
    }

    /// Like `recv`, but gives up at `deadline` instead of waiting forever.
    pub fn recv_deadline(&self, deadline: Instant) -> Result<T, RecvTimeoutError> {
        let mut guard = self.shared.queue.lock();
        loop {
            if let Some(value) = guard.pop_front() {
                drop(guard);
                self.shared.not_full.notify_one();
                return Ok(value);
            }
            if *self.shared.senders.lock() == 0 {
                return Err(RecvTimeoutError::Disconnected);
            }
            if Instant::now() >= deadline {
                return Err(RecvTimeoutError::Timeout);
            }
            let (next_guard, _timed_out) = self.shared.not_empty.wait_until(guard, deadline);
            guard = next_guard;
        }
    }

    /// Returns immediately with whatever is queued, without blocking.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut guard = self.shared.queue.lock();
        match guard.pop_front() {
            Some(value) => {
                drop(guard);
                self.shared.not_full.notify_one();
                Ok(value)
            }
            None if *self.shared.senders.lock() == 0 => Err(TryRecvError::Disconnected),
            None => Err(TryRecvError::Empty),
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        *self.shared.receivers.lock() += 1;
        Receiver { shared: self.shared.clone() }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut count = self.shared.receivers.lock();
        *count -= 1;
        if *count == 0 {
            drop(count);
            self.shared.not_full.notify_all();
        }
    }
}
