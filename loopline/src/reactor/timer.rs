use super::Reactor;

use std::cmp::Ordering;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Outcome delivered to a timer wait when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// The deadline was reached.
    Elapsed,

    /// The wait was canceled before its deadline.
    Canceled,
}

/// Completion callback of a timer wait.
pub(crate) type OnFire = Box<dyn FnOnce(Expiry) + Send>;

/// An entry in the reactor timer queue.
///
/// `TimerEntry` represents a pending wait at a specific deadline. It is
/// stored inside a binary heap ordered by deadline, with the insertion
/// sequence breaking ties so that equal deadlines complete in FIFO order.
pub(crate) struct TimerEntry {
    /// The time at which the wait completes.
    pub(crate) deadline: Instant,

    /// Insertion order, used to keep equal deadlines FIFO.
    pub(crate) seq: u64,

    /// Handle slot that owns this wait.
    pub(crate) slot: u64,

    /// Callback invoked on the consumer thread.
    pub(crate) on_fire: OnFire,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Orders timer entries by deadline, then by insertion sequence.
    ///
    /// The comparison is **reversed** so that a `BinaryHeap<TimerEntry>`
    /// behaves as a min-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A countdown timer bound to a reactor.
///
/// Each handle owns a slot in the reactor's timer queue. Arming the handle
/// schedules a wait; canceling it completes every pending wait of the slot
/// with [`Expiry::Canceled`].
///
/// The handle only keeps a weak reference to its reactor, so timer
/// callbacks that capture their own handle never keep the reactor alive.
pub(crate) struct TimerHandle {
    reactor: Weak<Reactor>,
    slot: u64,
}

impl TimerHandle {
    pub(crate) fn new(reactor: &Arc<Reactor>) -> Self {
        Self {
            reactor: Arc::downgrade(reactor),
            slot: reactor.next_slot(),
        }
    }

    /// Schedules `on_fire` to run once `after` has elapsed.
    ///
    /// A deadline past the range of `Instant` never expires: no wait is
    /// scheduled and `on_fire` is dropped without being invoked.
    ///
    /// Returns `false` if the reactor has been dropped, in which case the
    /// callback is dropped without being invoked.
    pub(crate) fn arm<F>(&self, after: Duration, on_fire: F) -> bool
    where
        F: FnOnce(Expiry) + Send + 'static,
    {
        let Some(reactor) = self.reactor.upgrade() else {
            return false;
        };

        if let Some(deadline) = Instant::now().checked_add(after) {
            reactor.schedule(self.slot, deadline, Box::new(on_fire));
        }
        true
    }

    /// Cancels any pending wait and schedules a new one.
    ///
    /// Returns the number of waits that were canceled.
    pub(crate) fn rearm<F>(&self, after: Duration, on_fire: F) -> usize
    where
        F: FnOnce(Expiry) + Send + 'static,
    {
        let canceled = self.cancel();
        self.arm(after, on_fire);
        canceled
    }

    /// Cancels all pending waits of this handle.
    ///
    /// Canceled waits are not dropped: their callbacks are queued and run
    /// on the consumer thread with [`Expiry::Canceled`].
    pub(crate) fn cancel(&self) -> usize {
        match self.reactor.upgrade() {
            Some(reactor) => reactor.cancel_slot(self.slot),
            None => 0,
        }
    }
}
