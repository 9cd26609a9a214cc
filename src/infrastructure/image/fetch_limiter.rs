//! Concurrency cap for network fetches.
//!
//! Requests either take a free slot immediately or wait in a FIFO queue.
//! Releasing a slot hands it to the oldest queued request. The limiter only
//! does the bookkeeping; starting the work is the caller's job.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Default number of simultaneous fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 12;

/// What happened to a request handed to [`FetchLimiter::enqueue`].
#[derive(Debug)]
pub enum Admission<R> {
    /// A slot was free; the caller must start the request now.
    Started(R),
    /// No slot was free; the request waits at this 1-based queue position.
    Queued {
        /// Position in the queue after insertion.
        position: usize,
    },
}

/// Result of releasing a slot.
#[derive(Debug)]
pub struct Drain<R> {
    /// Queued requests that now hold a slot, oldest first.
    pub started: Vec<R>,
    /// Whether nothing is active or queued after the drain.
    pub idle: bool,
}

#[derive(Debug)]
struct LimiterState<R> {
    active: usize,
    queue: VecDeque<R>,
}

/// Bounds in-flight requests to a fixed capacity.
///
/// `active ≤ capacity` holds at every point, and the queue only ever holds
/// requests that found no free slot.
#[derive(Debug)]
pub struct FetchLimiter<R> {
    capacity: usize,
    state: Mutex<LimiterState<R>>,
}

impl<R> FetchLimiter<R> {
    /// Creates a limiter with `capacity` slots (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LimiterState {
                active: 0,
                queue: VecDeque::new(),
            }),
        }
    }

    /// Takes a slot for `request` if one is free, otherwise queues it.
    ///
    /// A request that finds a free slot bypasses anything already queued.
    pub fn enqueue(&self, request: R) -> Admission<R> {
        let mut state = self.state.lock();
        if state.active < self.capacity {
            state.active += 1;
            Admission::Started(request)
        } else {
            state.queue.push_back(request);
            Admission::Queued {
                position: state.queue.len(),
            }
        }
    }

    /// Gives back one slot and moves queued requests into free slots.
    pub fn release_slot_and_drain(&self) -> Drain<R> {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);

        let mut started = Vec::new();
        while state.active < self.capacity {
            let Some(request) = state.queue.pop_front() else {
                break;
            };
            state.active += 1;
            started.push(request);
        }

        Drain {
            started,
            idle: state.active == 0 && state.queue.is_empty(),
        }
    }

    /// Number of slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Requests currently holding a slot.
    #[must_use]
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// Requests waiting for a slot.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether nothing is active or queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.active == 0 && state.queue.is_empty()
    }
}
