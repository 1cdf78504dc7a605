use super::core::Core;
use crate::event::StartTimer;
use crate::reactor::{Expiry, TimerHandle};
use crate::timer::TimerTarget;
use crate::utils::Id;

use parking_lot::ReentrantMutex;
use tracing::{debug, trace};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Registry entry for one armed timer.
///
/// The record is shared between the loop's registry and the pending
/// reactor wait. It never owns its target.
pub(crate) struct TimerRecord {
    timer_id: Id,
    target: Weak<dyn TimerTarget>,
    interval: Duration,
    repeat: bool,

    /// Set under the loop mutex by stop or replacement; authoritative over
    /// whatever the reactor reports.
    canceled: AtomicBool,

    /// Held across the final cancel check and the timeout notification.
    ///
    /// Re-entrant so that a timeout handler may stop its own timer.
    firing: ReentrantMutex<()>,

    handle: TimerHandle,
}

impl TimerRecord {
    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Marks the record canceled and cancels its pending wait.
    pub(crate) fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.handle.cancel();
    }

    /// Waits for an in-flight notification of this record to finish.
    ///
    /// Must be called without the loop mutex held.
    fn quiesce(&self) {
        drop(self.firing.lock());
    }
}

impl Core {
    /// Arms a timer, replacing any entry with the same id.
    pub(crate) fn start_timer(self: &Arc<Self>, request: StartTimer) {
        // Declared before the guard so that, if this is the last strong
        // reference, the target is dropped after the loop mutex is released.
        let Some(target) = request.target.upgrade() else {
            trace!(
                loop_id = self.id,
                timer_id = request.timer_id,
                "timer dropped before start"
            );
            return;
        };

        let replaced = {
            let mut state = self.state.lock();

            let record = Arc::new(TimerRecord {
                timer_id: request.timer_id,
                target: request.target,
                interval: request.interval,
                repeat: request.repeat,
                canceled: AtomicBool::new(false),
                firing: ReentrantMutex::new(()),
                handle: TimerHandle::new(&self.reactor),
            });

            let replaced = state.timers.insert(record.timer_id, record.clone());
            if let Some(old) = &replaced {
                old.cancel();
            }

            target.set_active(true);

            let core = Arc::downgrade(self);
            let fire = record.clone();
            record
                .handle
                .arm(record.interval, move |expiry| on_timeout(&core, fire, expiry));

            replaced
        };

        if let Some(old) = replaced {
            old.quiesce();
        }

        debug!(
            loop_id = self.id,
            timer_id = request.timer_id,
            interval_ms = u64::try_from(request.interval.as_millis()).unwrap_or(u64::MAX),
            repeat = request.repeat,
            "timer started"
        );
    }

    /// Disarms a timer. Does nothing if no timer with `timer_id` is armed.
    ///
    /// When this returns, no notification for the timer is running on
    /// another thread and none will start.
    pub(crate) fn stop_timer(&self, timer_id: Id) {
        // The upgraded target leaves the block so that, if it holds the last
        // strong reference, it is dropped after the loop mutex is released.
        let (record, _target) = {
            let mut state = self.state.lock();

            let Some(record) = state.timers.remove(&timer_id) else {
                return;
            };

            record.cancel();

            let target = record.target.upgrade();
            if let Some(target) = &target {
                target.set_active(false);
            }

            (record, target)
        };

        record.quiesce();

        debug!(loop_id = self.id, timer_id, "timer stopped");
    }

    /// Deactivates a one-shot timer that is about to notify and erases it
    /// from the registry.
    ///
    /// Does nothing if the record was canceled meanwhile: a replacement
    /// registered under the same id owns the target's active flag.
    fn retire(&self, record: &Arc<TimerRecord>, target: &dyn TimerTarget) {
        let mut state = self.state.lock();
        if record.is_canceled() {
            return;
        }

        target.set_active(false);
        state.timers.remove(&record.timer_id);
    }

    /// Erases `record` from the registry if it is still the registered
    /// entry for its id.
    fn forget(&self, record: &Arc<TimerRecord>) {
        let mut state = self.state.lock();

        if state
            .timers
            .get(&record.timer_id)
            .is_some_and(|current| Arc::ptr_eq(current, record))
        {
            state.timers.remove(&record.timer_id);
        }
    }
}

/// Fire callback of a registry entry. Runs on the consumer thread.
fn on_timeout(core: &Weak<Core>, record: Arc<TimerRecord>, expiry: Expiry) {
    if expiry == Expiry::Canceled || record.is_canceled() {
        trace!(timer_id = record.timer_id, "canceled timer fired");
        return;
    }

    let Some(target) = record.target.upgrade() else {
        trace!(timer_id = record.timer_id, "timer owner dropped");
        if let Some(core) = core.upgrade() {
            core.forget(&record);
        }
        return;
    };

    // Re-arm first so the cadence does not drift with handler latency.
    if record.repeat {
        let next = record.clone();
        let core = core.clone();
        record
            .handle
            .rearm(record.interval, move |expiry| on_timeout(&core, next, expiry));
    } else if let Some(core) = core.upgrade() {
        core.retire(&record, &*target);
    }

    let _firing = record.firing.lock();
    if record.is_canceled() {
        return;
    }

    target.timeout();
}
