//! Logical timers.
//!
//! The event loop only knows timers through the [`TimerTarget`] capability
//! and only ever holds them weakly. [`Timer`] is the ready-made target:
//! it posts start/stop requests to its loop and fans timeouts out to the
//! handlers registered with [`Timer::on_timeout`].

use crate::event::{Event, StartTimer};
use crate::runtime::EventLoop;
use crate::utils::Id;

use parking_lot::Mutex;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// The owner side of a timer, as seen by the event loop.
///
/// `set_active` is always called while the loop holds its internal lock,
/// so it must not call back into the loop. `timeout` runs on the consumer
/// thread with no loop lock held.
pub trait TimerTarget: Send + Sync {
    /// Marks the timer as armed (`true`) or idle (`false`).
    fn set_active(&self, active: bool);

    /// Called once per firing.
    fn timeout(&self);
}

type TimeoutHandler = Box<dyn FnMut() + Send>;

/// A timer bound to an event loop.
///
/// Timers are created behind an `Arc`; the loop keeps only a weak
/// reference, so dropping the last `Arc` silently disarms the timer.
///
/// # Examples
///
/// ```rust,ignore
/// let timer = Timer::new(&event_loop);
/// timer.on_timeout(|| println!("tick"));
/// timer.start(Duration::from_millis(50), true);
/// ```
pub struct Timer {
    id: Id,
    event_loop: EventLoop,
    this: Weak<Timer>,

    /// Interval and repeat flag of the most recent `start`.
    settings: Mutex<(Duration, bool)>,

    active: AtomicBool,
    handlers: Mutex<Vec<TimeoutHandler>>,
}

impl Timer {
    /// Creates an idle timer on `event_loop`.
    ///
    /// The timer id is drawn from the loop's id source.
    pub fn new(event_loop: &EventLoop) -> Arc<Timer> {
        let id = event_loop.next_id();

        Arc::new_cyclic(|this| Timer {
            id,
            event_loop: event_loop.clone(),
            this: this.clone(),
            settings: Mutex::new((Duration::ZERO, false)),
            active: AtomicBool::new(false),
            handlers: Mutex::new(Vec::new()),
        })
    }

    /// Returns the timer id, unique among ids drawn from its loop's source.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Interval of the most recent [`start`](Self::start).
    pub fn interval(&self) -> Duration {
        self.settings.lock().0
    }

    /// Whether the most recent [`start`](Self::start) asked for repeats.
    pub fn repeating(&self) -> bool {
        self.settings.lock().1
    }

    /// Returns `true` while the timer is armed.
    pub fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Registers a handler invoked on every timeout.
    ///
    /// Handlers run on the loop's consumer thread, in registration order.
    pub fn on_timeout<F>(&self, handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.handlers.lock().push(Box::new(handler));
    }

    /// Arms the timer, replacing any previous arming.
    ///
    /// The interval is measured from this call.
    pub fn start(&self, interval: Duration, repeating: bool) {
        *self.settings.lock() = (interval, repeating);

        let target: Weak<dyn TimerTarget> = self.this.clone();
        self.event_loop.post_event(Event::StartTimer(StartTimer::new(
            self.id, target, interval, repeating,
        )));
    }

    /// Disarms the timer.
    ///
    /// Once this returns, no timeout notification for this timer is in
    /// flight and none will be delivered until it is started again.
    pub fn stop(&self) {
        self.event_loop
            .post_event(Event::StopTimer { timer_id: self.id });
    }
}

impl TimerTarget for Timer {
    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    fn timeout(&self) {
        // Handlers may register more handlers or stop the timer, so they
        // run without the list locked.
        let mut handlers = std::mem::take(&mut *self.handlers.lock());

        for handler in handlers.iter_mut() {
            handler();
        }

        let mut slot = self.handlers.lock();
        handlers.append(&mut slot);
        *slot = handlers;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (interval, repeating) = *self.settings.lock();

        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("loop_id", &self.event_loop.id())
            .field("interval", &interval)
            .field("repeating", &repeating)
            .field("active", &self.active())
            .finish()
    }
}
