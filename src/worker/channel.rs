//! Bounded closeable channel, the sole transport between pipeline stages.
//!
//! A `Channel` is a fixed-capacity FIFO shared by any number of producers and
//! consumers. Unlike the drop-based disconnection of ordinary channel crates,
//! closing is an explicit, idempotent operation that any holder may perform:
//! a failing worker closes the channels around it to tear the whole pipeline
//! down, and the producer polls [`Channel::is_closed`] on the terminator to
//! stop feeding a pipeline that is already dead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Queue plus close flag, guarded by the channel mutex.
struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity MPMC FIFO with close semantics.
///
/// `push` blocks while the channel is full and open, `pop` blocks while it is
/// empty and open. After `close`, pushes are rejected immediately and pops
/// drain the remaining elements in FIFO order before returning `None`.
pub struct Channel<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    closed: AtomicBool,
    capacity: usize,
}

impl<T> Channel<T> {
    /// Creates a channel holding at most `capacity` elements.
    ///
    /// A capacity of zero constructs a pre-closed channel: every push is
    /// rejected and every pop returns `None`. Sizing fall-through paths use
    /// this to short-circuit into synchronous processing.
    pub fn new(capacity: usize) -> Self {
        let closed = capacity == 0;
        Self {
            state: Mutex::new(State { queue: VecDeque::new(), closed }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            closed: AtomicBool::new(closed),
            capacity,
        }
    }

    /// Enqueues `value`, blocking while the channel is full and open.
    ///
    /// Returns `Err(value)` if the channel was closed before or during the
    /// wait, handing ownership back to the caller.
    pub fn push(&self, value: T) -> Result<(), T> {
        let mut state = self.lock();
        while state.queue.len() == self.capacity && !state.closed {
            state = self.wait_not_full(state);
        }
        if state.closed {
            return Err(value);
        }
        state.queue.push_back(value);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeues the head element, blocking while the channel is empty and open.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state = self.wait_not_empty(state);
        }
    }

    /// Closes the channel and wakes every blocked producer and consumer.
    ///
    /// Idempotent: repeated calls are no-ops. Buffered elements stay poppable.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            self.closed.store(true, Ordering::Release);
            self.not_full.notify_all();
            self.not_empty.notify_all();
        }
    }

    /// Whether the channel has been closed. Cheap enough to poll per job.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // Channel operations are total: a panic on another thread must not turn
    // pushes and pops into panics here, so poisoning is stripped.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_not_full<'a>(&self, state: MutexGuard<'a, State<T>>) -> MutexGuard<'a, State<T>> {
        self.not_full.wait(state).unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_not_empty<'a>(&self, state: MutexGuard<'a, State<T>>) -> MutexGuard<'a, State<T>> {
        self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner)
    }
}
