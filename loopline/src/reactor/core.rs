use super::timer::{Expiry, OnFire, TimerEntry};

use parking_lot::{Condvar, Mutex, MutexGuard};

use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// A unit of work queued on the reactor.
pub(crate) type Work = Box<dyn FnOnce() + Send>;

/// FIFO work queue plus countdown timers, pumped by a single thread.
///
/// The reactor is the low-level substrate the event loop drives:
/// - producers [`post`](Self::post) work from any thread,
/// - the consumer thread pumps it with [`run`](Self::run) (blocking) or
///   [`poll`](Self::poll) (non-blocking),
/// - timer waits become ready work once their deadline passes.
///
/// Handlers always execute with the internal lock released, so they may
/// post more work or arm timers freely.
pub(crate) struct Reactor {
    shared: Mutex<Shared>,

    /// Wakes the consumer when work arrives, a timer is scheduled or the
    /// reactor is stopped.
    condvar: Condvar,
}

struct Shared {
    /// Work ready to execute, in submission order.
    queue: VecDeque<Work>,

    /// Pending timer waits, earliest deadline first.
    timers: BinaryHeap<TimerEntry>,

    /// Set by `stop`, or when `run` runs out of work; cleared by `reset`.
    stopped: bool,

    /// Bumped on every `stop` so that a `run` call never outlives the
    /// activation it was started in.
    epoch: u64,

    /// Number of live keep-alive guards.
    guards: usize,

    next_seq: u64,
    next_slot: u64,
}

/// Work and timers released by [`Reactor::shutdown`].
///
/// Dropping this value drops every callback it holds. Callers drop it
/// after releasing their own locks, since callbacks may own arbitrary
/// user values.
pub(crate) struct Leftovers {
    pub(crate) work: Vec<Work>,
    pub(crate) timers: Vec<TimerEntry>,
}

impl Leftovers {
    pub(crate) fn len(&self) -> usize {
        self.work.len() + self.timers.len()
    }
}

impl Shared {
    /// Moves every timer wait whose deadline has passed into the ready queue.
    fn collect_expired(&mut self, now: Instant) {
        while self.timers.peek().is_some_and(|t| t.deadline <= now) {
            if let Some(entry) = self.timers.pop() {
                let on_fire = entry.on_fire;
                self.queue.push_back(Box::new(move || on_fire(Expiry::Elapsed)));
            }
        }
    }

    fn out_of_work(&self) -> bool {
        self.guards == 0 && self.queue.is_empty() && self.timers.is_empty()
    }
}

impl Reactor {
    pub(crate) fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                queue: VecDeque::new(),
                timers: BinaryHeap::new(),
                stopped: false,
                epoch: 0,
                guards: 0,
                next_seq: 0,
                next_slot: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Queues `work` for execution on the consumer thread.
    ///
    /// Work posted while the reactor is stopped stays queued until the
    /// reactor is reset and pumped again.
    pub(crate) fn post(&self, work: Work) {
        self.shared.lock().queue.push_back(work);
        self.condvar.notify_one();
    }

    /// Runs queued work and expired timers until the reactor is stopped.
    ///
    /// Blocks the calling thread. Returns early if there is nothing left
    /// to do and no keep-alive guard is held; the reactor is then marked
    /// stopped, as if [`stop`](Self::stop) had been called.
    ///
    /// Returns the number of handlers executed.
    pub(crate) fn run(&self) -> usize {
        let mut shared = self.shared.lock();
        let epoch = shared.epoch;
        let mut executed = 0;

        loop {
            if shared.stopped || shared.epoch != epoch {
                break;
            }

            shared.collect_expired(Instant::now());

            if let Some(work) = shared.queue.pop_front() {
                MutexGuard::unlocked(&mut shared, work);
                executed += 1;
                continue;
            }

            if shared.out_of_work() {
                shared.stopped = true;
                break;
            }

            match shared.timers.peek().map(|t| t.deadline) {
                Some(deadline) => {
                    self.condvar.wait_until(&mut shared, deadline);
                }
                None => self.condvar.wait(&mut shared),
            }
        }

        executed
    }

    /// Runs the work that is ready right now, without blocking.
    ///
    /// Only the work queued when the call begins (including timers that
    /// have expired by then) is executed. Anything posted by those
    /// handlers waits for the next pump.
    ///
    /// Returns the number of handlers executed.
    pub(crate) fn poll(&self) -> usize {
        let mut shared = self.shared.lock();
        if shared.stopped {
            return 0;
        }

        let epoch = shared.epoch;
        shared.collect_expired(Instant::now());

        let mut budget = shared.queue.len();
        let mut executed = 0;

        while budget > 0 && !shared.stopped && shared.epoch == epoch {
            let Some(work) = shared.queue.pop_front() else {
                break;
            };

            budget -= 1;
            MutexGuard::unlocked(&mut shared, work);
            executed += 1;
        }

        executed
    }

    /// Stops the reactor.
    ///
    /// Any thread blocked in [`run`](Self::run) returns as soon as its
    /// current handler finishes. Pending queued work is discarded and
    /// returned to the caller so it can be dropped outside of any lock.
    /// Armed timers are kept.
    pub(crate) fn stop(&self) -> Vec<Work> {
        let dropped: Vec<Work> = {
            let mut shared = self.shared.lock();
            shared.stopped = true;
            shared.epoch += 1;
            shared.queue.drain(..).collect()
        };

        self.condvar.notify_all();
        dropped
    }

    /// Clears the stopped condition so the reactor can be pumped again.
    pub(crate) fn reset(&self) {
        self.shared.lock().stopped = false;
    }

    /// Stops the reactor and releases every queued work item and timer.
    pub(crate) fn shutdown(&self) -> Leftovers {
        let mut leftovers = Leftovers {
            work: self.stop(),
            timers: Vec::new(),
        };

        let mut shared = self.shared.lock();
        leftovers.work.extend(shared.queue.drain(..));
        leftovers.timers = std::mem::take(&mut shared.timers).into_vec();

        leftovers
    }

    /// Acquires a keep-alive guard.
    ///
    /// While at least one guard is alive, [`run`](Self::run) keeps waiting
    /// for work instead of returning when the queue is momentarily empty.
    pub(crate) fn work_guard(self: &Arc<Self>) -> WorkGuard {
        self.shared.lock().guards += 1;

        WorkGuard {
            reactor: self.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn guards(&self) -> usize {
        self.shared.lock().guards
    }

    #[cfg(test)]
    pub(crate) fn pending_timers(&self) -> usize {
        self.shared.lock().timers.len()
    }

    pub(crate) fn next_slot(&self) -> u64 {
        let mut shared = self.shared.lock();
        shared.next_slot += 1;
        shared.next_slot
    }

    pub(crate) fn schedule(&self, slot: u64, deadline: Instant, on_fire: OnFire) {
        {
            let mut shared = self.shared.lock();
            let seq = shared.next_seq;
            shared.next_seq += 1;

            shared.timers.push(TimerEntry {
                deadline,
                seq,
                slot,
                on_fire,
            });
        }

        // The new deadline may be earlier than the one `run` is sleeping on.
        self.condvar.notify_one();
    }

    /// Completes every pending wait of `slot` with [`Expiry::Canceled`].
    pub(crate) fn cancel_slot(&self, slot: u64) -> usize {
        let canceled = {
            let mut shared = self.shared.lock();

            if !shared.timers.iter().any(|t| t.slot == slot) {
                return 0;
            }

            let (canceled, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut shared.timers)
                .into_vec()
                .into_iter()
                .partition(|t| t.slot == slot);

            shared.timers = BinaryHeap::from(kept);

            let count = canceled.len();
            for entry in canceled {
                let on_fire = entry.on_fire;
                shared
                    .queue
                    .push_back(Box::new(move || on_fire(Expiry::Canceled)));
            }

            count
        };

        self.condvar.notify_one();
        canceled
    }
}

/// Keep-alive token for a [`Reactor`].
///
/// Dropping the guard releases it and wakes the consumer so that `run`
/// can notice it has run out of work.
pub(crate) struct WorkGuard {
    reactor: Arc<Reactor>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.reactor.shared.lock().guards -= 1;
        self.reactor.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::TimerHandle;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Work) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();

        let make = move |name: &'static str| -> Work {
            let sink = sink.clone();
            Box::new(move || sink.lock().push(name))
        };

        (log, make)
    }

    #[test]
    fn poll_runs_posted_work_in_order() {
        let reactor = Reactor::new();
        let (log, work) = recorder();

        reactor.post(work("a"));
        reactor.post(work("b"));
        reactor.post(work("c"));

        assert_eq!(reactor.poll(), 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn poll_leaves_work_posted_during_the_drain() {
        let reactor = Arc::new(Reactor::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner = reactor.clone();
        let counter = hits.clone();
        reactor.post(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let counter = counter.clone();
            inner.post(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(reactor.poll(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(reactor.poll(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn run_returns_when_out_of_work() {
        let reactor = Reactor::new();
        let (log, work) = recorder();

        reactor.post(work("only"));

        assert_eq!(reactor.run(), 1);
        assert_eq!(*log.lock(), vec!["only"]);

        // Out of work marks the reactor stopped until reset.
        reactor.post(work("later"));
        assert_eq!(reactor.poll(), 0);

        reactor.reset();
        assert_eq!(reactor.poll(), 1);
    }

    #[test]
    fn guard_keeps_run_alive_until_stop() {
        let reactor = Arc::new(Reactor::new());
        let guard = reactor.work_guard();
        assert_eq!(reactor.guards(), 1);

        let pump = reactor.clone();
        let handle = thread::spawn(move || pump.run());

        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());

        let (log, work) = recorder();
        reactor.post(work("x"));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(*log.lock(), vec!["x"]);

        drop(reactor.stop());
        assert_eq!(handle.join().unwrap(), 1);

        drop(guard);
        assert_eq!(reactor.guards(), 0);
    }

    #[test]
    fn stop_discards_queued_work() {
        let reactor = Reactor::new();
        let (log, work) = recorder();

        reactor.post(work("a"));
        reactor.post(work("b"));

        let dropped = reactor.stop();
        assert_eq!(dropped.len(), 2);

        reactor.reset();
        assert_eq!(reactor.poll(), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let reactor = Arc::new(Reactor::new());
        let (log, _) = recorder();

        let late = TimerHandle::new(&reactor);
        let early = TimerHandle::new(&reactor);

        let sink = log.clone();
        late.arm(Duration::from_millis(30), move |expiry| {
            assert_eq!(expiry, Expiry::Elapsed);
            sink.lock().push("late");
        });

        let sink = log.clone();
        early.arm(Duration::from_millis(10), move |expiry| {
            assert_eq!(expiry, Expiry::Elapsed);
            sink.lock().push("early");
        });

        assert_eq!(reactor.pending_timers(), 2);
        assert_eq!(reactor.run(), 2);
        assert_eq!(*log.lock(), vec!["early", "late"]);
    }

    #[test]
    fn cancel_completes_waits_as_canceled() {
        let reactor = Arc::new(Reactor::new());
        let handle = TimerHandle::new(&reactor);
        let outcome = Arc::new(Mutex::new(None));

        let slot = outcome.clone();
        handle.arm(Duration::from_secs(60), move |expiry| {
            *slot.lock() = Some(expiry);
        });

        assert_eq!(handle.cancel(), 1);
        assert_eq!(handle.cancel(), 0);
        assert_eq!(reactor.pending_timers(), 0);

        assert_eq!(reactor.poll(), 1);
        assert_eq!(*outcome.lock(), Some(Expiry::Canceled));
    }

    #[test]
    fn rearm_replaces_the_pending_wait() {
        let reactor = Arc::new(Reactor::new());
        let handle = TimerHandle::new(&reactor);
        let (log, _) = recorder();

        let sink = log.clone();
        handle.arm(Duration::from_secs(60), move |expiry| {
            if expiry == Expiry::Elapsed {
                sink.lock().push("stale");
            }
        });

        let sink = log.clone();
        assert_eq!(
            handle.rearm(Duration::from_millis(5), move |_| sink.lock().push("fresh")),
            1
        );

        assert_eq!(reactor.run(), 2);
        assert_eq!(*log.lock(), vec!["fresh"]);
    }

    #[test]
    fn shutdown_releases_everything() {
        let reactor = Arc::new(Reactor::new());
        let handle = TimerHandle::new(&reactor);
        let (_, work) = recorder();

        reactor.post(work("queued"));
        handle.arm(Duration::from_secs(60), |_| {});

        let leftovers = reactor.shutdown();
        assert_eq!(leftovers.work.len(), 1);
        assert_eq!(leftovers.timers.len(), 1);
        assert_eq!(reactor.pending_timers(), 0);
    }

    #[test]
    fn unrepresentable_deadline_never_expires() {
        let reactor = Arc::new(Reactor::new());
        let handle = TimerHandle::new(&reactor);

        assert!(handle.arm(Duration::MAX, |_| panic!("must not fire")));
        assert_eq!(reactor.pending_timers(), 0);
        assert_eq!(handle.cancel(), 0);
        assert_eq!(reactor.poll(), 0);
    }
}
