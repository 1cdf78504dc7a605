use super::context::enter_context;
use super::timers::TimerRecord;
use crate::error::LoopError;
use crate::reactor::{Reactor, WorkGuard};
use crate::utils::{Id, IdSource};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// A single-threaded event loop.
///
/// `EventLoop` is a cheap, cloneable handle. Any clone may post work from
/// any thread; the work runs on the one thread that called
/// [`start`](Self::start) and then pumps the loop with [`run`](Self::run)
/// or [`process_events`](Self::process_events).
///
/// When the last handle is dropped, the loop is stopped and every queued
/// callback and armed timer is released.
///
/// # Examples
///
/// ```rust,ignore
/// let event_loop = EventLoop::new();
/// let thread = EventLoop::launch_in_thread(&event_loop)?;
///
/// event_loop.post_callback(|| println!("on the loop thread"));
///
/// EventLoop::remove_from_thread(&event_loop, thread, true);
/// ```
#[derive(Clone)]
pub struct EventLoop {
    pub(crate) core: Arc<Core>,
}

/// Atomic snapshot of a loop's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    /// Thread that started the loop, if it is started.
    pub thread_id: Option<ThreadId>,

    /// Whether the loop is started.
    pub started: bool,

    /// Whether a thread is currently inside [`EventLoop::run`].
    pub running: bool,
}

pub(crate) struct Core {
    pub(crate) id: Id,
    pub(crate) ids: Arc<dyn IdSource>,
    pub(crate) reactor: Arc<Reactor>,

    pub(crate) state: Mutex<State>,
    pub(crate) started_cv: Condvar,
    pub(crate) running_cv: Condvar,
    pub(crate) stopped_cv: Condvar,

    /// Name given to threads spawned by `launch_in_thread`.
    pub(crate) thread_name: Option<String>,

    /// Stack size of threads spawned by `launch_in_thread`.
    pub(crate) stack_size: Option<usize>,
}

/// Everything guarded by the loop mutex.
pub(crate) struct State {
    pub(crate) started: bool,
    pub(crate) running: bool,

    /// Number of times the loop has entered `run`.
    pub(crate) runs: u64,

    /// Number of launched threads that exited without running the loop.
    pub(crate) failed_launches: u64,

    pub(crate) thread_id: Option<ThreadId>,

    /// Keeps `run` blocked while the queue is momentarily empty.
    pub(crate) keep_alive: Option<WorkGuard>,

    pub(crate) timers: HashMap<Id, Arc<TimerRecord>>,
}

impl EventLoop {
    /// Creates a loop with the default configuration.
    ///
    /// Equivalent to `EventLoopBuilder::new().build()`.
    pub fn new() -> Self {
        super::EventLoopBuilder::new().build()
    }

    /// Returns a builder for configuring a new loop.
    pub fn builder() -> super::EventLoopBuilder {
        super::EventLoopBuilder::new()
    }

    pub(crate) fn from_parts(
        ids: Arc<dyn IdSource>,
        thread_name: Option<String>,
        stack_size: Option<usize>,
    ) -> Self {
        let core = Core {
            id: ids.next_id(),
            ids,
            reactor: Arc::new(Reactor::new()),
            state: Mutex::new(State {
                started: false,
                running: false,
                runs: 0,
                failed_launches: 0,
                thread_id: None,
                keep_alive: None,
                timers: HashMap::new(),
            }),
            started_cv: Condvar::new(),
            running_cv: Condvar::new(),
            stopped_cv: Condvar::new(),
            thread_name,
            stack_size,
        };

        Self {
            core: Arc::new(core),
        }
    }

    /// Returns the loop id.
    pub fn id(&self) -> Id {
        self.core.id
    }

    /// Draws a fresh id from this loop's id source.
    pub(crate) fn next_id(&self) -> Id {
        self.core.ids.next_id()
    }

    /// Returns the thread that started the loop, or `None` if stopped.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.core.state.lock().thread_id
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    pub fn started(&self) -> bool {
        self.core.state.lock().started
    }

    /// Returns `true` while a thread is inside [`run`](Self::run).
    pub fn running(&self) -> bool {
        self.core.state.lock().running
    }

    /// Returns thread id, started and running flags read under one lock.
    pub fn state(&self) -> LoopState {
        let state = self.core.state.lock();

        LoopState {
            thread_id: state.thread_id,
            started: state.started,
            running: state.running,
        }
    }

    /// Number of timers currently armed on this loop.
    pub fn active_timers(&self) -> usize {
        self.core.state.lock().timers.len()
    }

    /// Starts the loop on the calling thread.
    ///
    /// Resets the reactor, installs a keep-alive guard and records the
    /// calling thread as the only one allowed to pump the loop. Does
    /// nothing if the loop is already started.
    pub fn start(&self) {
        let mut state = self.core.state.lock();

        if state.started || state.keep_alive.is_some() {
            return;
        }

        self.core.reactor.reset();
        state.keep_alive = Some(self.core.reactor.work_guard());
        state.thread_id = Some(thread::current().id());
        state.started = true;

        self.core.started_cv.notify_all();

        debug!(loop_id = self.core.id, "event loop started");
    }

    /// Pumps the loop until it is stopped.
    ///
    /// Must be called on the thread that called [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// - [`LoopError::Inactive`] if the loop is not started.
    /// - [`LoopError::WrongThread`] if called from another thread. No
    ///   queued work is executed in that case.
    pub fn run(&self) -> Result<(), LoopError> {
        {
            let mut state = self.core.state.lock();
            self.core.ensure_active(&state)?;
            self.core.ensure_thread(&state)?;

            state.running = true;
            state.runs += 1;
            self.core.running_cv.notify_all();
        }

        debug!(loop_id = self.core.id, "event loop running");

        let executed = enter_context(self.clone(), || self.core.reactor.run());

        self.core.state.lock().running = false;

        debug!(loop_id = self.core.id, executed, "event loop returned from run");
        Ok(())
    }

    /// Runs the work that is ready right now and returns.
    ///
    /// Same preconditions as [`run`](Self::run). Useful for pumping the
    /// loop manually from a thread that has other duties.
    pub fn process_events(&self) -> Result<(), LoopError> {
        {
            let state = self.core.state.lock();
            self.core.ensure_active(&state)?;
            self.core.ensure_thread(&state)?;
        }

        let executed = enter_context(self.clone(), || self.core.reactor.poll());

        trace!(loop_id = self.core.id, executed, "processed events");
        Ok(())
    }

    /// Stops the loop.
    ///
    /// Idempotent and callable from any thread, including the loop's own.
    /// Work still queued is discarded; armed timers are kept and resume
    /// if the loop is started again.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Blocks until the loop is stopped.
    ///
    /// Never call this from the loop's own consumer thread while it is
    /// running: the stop would never be processed.
    pub fn wait(&self) {
        let mut state = self.core.state.lock();

        while state.started {
            self.core.stopped_cv.wait(&mut state);
        }
    }

    /// Blocks until the loop is started.
    pub fn wait_until_started(&self) {
        let mut state = self.core.state.lock();

        while !state.started {
            self.core.started_cv.wait(&mut state);
        }
    }

    /// Blocks until a thread is inside [`run`](Self::run).
    pub fn wait_until_running(&self) {
        let mut state = self.core.state.lock();

        while !state.running {
            self.core.running_cv.wait(&mut state);
        }
    }

    /// Returns `true` if the calling thread is the one that started the loop.
    pub(crate) fn on_loop_thread(&self) -> bool {
        self.thread_id() == Some(thread::current().id())
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();

        f.debug_struct("EventLoop")
            .field("id", &self.core.id)
            .field("thread_id", &state.thread_id)
            .field("started", &state.started)
            .field("running", &state.running)
            .finish()
    }
}

impl Core {
    pub(crate) fn stop(&self) {
        let (keep_alive, dropped, was_started) = {
            let mut state = self.state.lock();

            let keep_alive = state.keep_alive.take();
            let dropped = self.reactor.stop();
            state.thread_id = None;
            let was_started = std::mem::replace(&mut state.started, false);

            self.stopped_cv.notify_all();
            (keep_alive, dropped, was_started)
        };

        if was_started {
            debug!(
                loop_id = self.id,
                discarded = dropped.len(),
                "event loop stopped"
            );
        }

        // Queued work may own values whose destructors post back to this loop.
        drop(keep_alive);
        drop(dropped);
    }

    fn ensure_active(&self, state: &State) -> Result<(), LoopError> {
        if state.started && state.keep_alive.is_some() {
            return Ok(());
        }

        let err = LoopError::Inactive { loop_id: self.id };
        warn!(loop_id = self.id, label = err.as_label(), "{err}");
        Err(err)
    }

    fn ensure_thread(&self, state: &State) -> Result<(), LoopError> {
        let caller = thread::current().id();
        if state.thread_id == Some(caller) {
            return Ok(());
        }

        let err = LoopError::WrongThread {
            loop_id: self.id,
            caller,
            owner: state.thread_id,
        };
        error!(loop_id = self.id, label = err.as_label(), ?caller, "{err}");
        Err(err)
    }
}

impl Drop for Core {
    /// Stops the loop and releases everything still held by the reactor.
    fn drop(&mut self) {
        self.stop();

        let timers = std::mem::take(&mut self.state.get_mut().timers);
        for record in timers.values() {
            record.cancel();
        }

        let leftovers = self.reactor.shutdown();
        trace!(
            loop_id = self.id,
            timers = timers.len(),
            released = leftovers.len(),
            "event loop torn down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_twice_holds_a_single_keep_alive() {
        let event_loop = EventLoop::new();
        assert_eq!(event_loop.core.reactor.guards(), 0);

        event_loop.start();
        event_loop.start();
        assert_eq!(event_loop.core.reactor.guards(), 1);

        event_loop.stop();
        assert_eq!(event_loop.core.reactor.guards(), 0);
    }
}
