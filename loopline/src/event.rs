//! Work items that can be posted to an event loop.

use crate::timer::TimerTarget;
use crate::utils::Id;

use parking_lot::{Condvar, Mutex};

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// A fire-and-forget callback executed once on the consumer thread.
pub type Callback = Box<dyn FnOnce() + Send>;

/// A unit of work posted with [`EventLoop::post_event`](crate::EventLoop::post_event).
///
/// Events are uniquely owned: once posted, an event belongs to the loop
/// until it is executed or discarded by a stop.
pub enum Event {
    /// Runs the callback once on the consumer thread.
    RunCallback(Callback),

    /// Runs the callback once on the consumer thread, then signals its
    /// [`Completion`].
    RunBlockingCallback(BlockingCallback),

    /// Arms (or re-arms) a timer. Applied immediately, never queued.
    StartTimer(StartTimer),

    /// Cancels a timer. Applied immediately, never queued.
    StopTimer {
        /// Id of the timer to stop.
        timer_id: Id,
    },
}

impl Event {
    /// Wraps `f` as a [`Event::RunCallback`].
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Event::RunCallback(Box::new(f))
    }

    /// Returns a short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RunCallback(_) => "run_callback",
            Event::RunBlockingCallback(_) => "run_blocking_callback",
            Event::StartTimer(_) => "start_timer",
            Event::StopTimer { .. } => "stop_timer",
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StartTimer(start) => f.debug_tuple("StartTimer").field(start).finish(),
            Event::StopTimer { timer_id } => f
                .debug_struct("StopTimer")
                .field("timer_id", timer_id)
                .finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Request to arm a timer.
///
/// The target is held weakly: the loop never keeps a timer owner alive.
#[derive(Clone)]
pub struct StartTimer {
    pub(crate) timer_id: Id,
    pub(crate) target: Weak<dyn TimerTarget>,
    pub(crate) interval: Duration,
    pub(crate) repeat: bool,
}

impl StartTimer {
    /// Creates a request to arm timer `timer_id` on behalf of `target`.
    pub fn new(timer_id: Id, target: Weak<dyn TimerTarget>, interval: Duration, repeat: bool) -> Self {
        Self {
            timer_id,
            target,
            interval,
            repeat,
        }
    }

    /// Id of the timer to arm.
    pub fn timer_id(&self) -> Id {
        self.timer_id
    }

    /// Delay before the first firing, and between firings if repeating.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the timer re-arms after each firing.
    pub fn repeat(&self) -> bool {
        self.repeat
    }
}

impl fmt::Debug for StartTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartTimer")
            .field("timer_id", &self.timer_id)
            .field("interval", &self.interval)
            .field("repeat", &self.repeat)
            .field("target_alive", &(self.target.strong_count() > 0))
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pending,
    Invoked,
    Dropped,
}

struct CompletionState {
    signal: Mutex<Signal>,
    condvar: Condvar,
}

impl CompletionState {
    fn set(&self, signal: Signal) {
        *self.signal.lock() = signal;
        self.condvar.notify_all();
    }
}

/// A callback whose poster wants to block until it has run.
///
/// The blocking contract lives entirely in the callback: the loop simply
/// invokes it once, in order, and the callback signals its paired
/// [`Completion`] afterwards. If the callback is discarded without running
/// (for example because the loop was stopped first), the completion is
/// released as well so that waiters do not hang.
///
/// Never wait on the completion from the loop's own consumer thread.
pub struct BlockingCallback {
    callback: Option<Callback>,
    state: Arc<CompletionState>,
    signaled: bool,
}

impl BlockingCallback {
    /// Creates a blocking callback and the completion its poster waits on.
    pub fn new<F>(f: F) -> (Self, Completion)
    where
        F: FnOnce() + Send + 'static,
    {
        let state = Arc::new(CompletionState {
            signal: Mutex::new(Signal::Pending),
            condvar: Condvar::new(),
        });

        let callback = Self {
            callback: Some(Box::new(f)),
            state: state.clone(),
            signaled: false,
        };

        (callback, Completion { state })
    }

    pub(crate) fn invoke(mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
            self.state.set(Signal::Invoked);
            self.signaled = true;
        }
    }
}

impl Drop for BlockingCallback {
    /// Releases waiters if the callback never ran or panicked.
    fn drop(&mut self) {
        if !self.signaled {
            self.state.set(Signal::Dropped);
        }
    }
}

/// Waitable completion of a [`BlockingCallback`].
#[derive(Clone)]
pub struct Completion {
    state: Arc<CompletionState>,
}

impl Completion {
    /// Blocks until the callback has run or has been discarded.
    ///
    /// Returns `true` if the callback ran.
    pub fn wait(&self) -> bool {
        let mut signal = self.state.signal.lock();
        while *signal == Signal::Pending {
            self.state.condvar.wait(&mut signal);
        }

        *signal == Signal::Invoked
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// Returns `true` only if the callback ran within the timeout.
    ///
    /// A timeout too large to represent waits without a deadline.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };

        let mut signal = self.state.signal.lock();

        while *signal == Signal::Pending {
            if self
                .state
                .condvar
                .wait_until(&mut signal, deadline)
                .timed_out()
            {
                break;
            }
        }

        *signal == Signal::Invoked
    }

    /// Returns `true` once the callback has run.
    pub fn is_complete(&self) -> bool {
        *self.state.signal.lock() == Signal::Invoked
    }
}
