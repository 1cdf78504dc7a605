use super::EventLoop;
use crate::error::LoopError;
use crate::task::Task;

use parking_lot::Mutex;
use tracing::{debug, error};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

impl EventLoop {
    /// Runs `event_loop` on a new thread.
    ///
    /// The thread calls [`start`](Self::start) and then [`run`](Self::run).
    /// This call blocks until the loop is observed running, so work posted
    /// afterwards is guaranteed to be picked up by the new thread.
    ///
    /// The thread is named and sized according to the loop's builder.
    ///
    /// # Errors
    ///
    /// - [`LoopError::Spawn`] if the thread could not be created.
    /// - [`LoopError::Launch`] if the loop could not be run on the new
    ///   thread, typically because it was already started elsewhere.
    pub fn launch_in_thread(event_loop: &EventLoop) -> Result<JoinHandle<()>, LoopError> {
        let core = &event_loop.core;
        let (runs, failed) = {
            let state = core.state.lock();
            (state.runs, state.failed_launches)
        };

        let mut builder = thread::Builder::new();
        if let Some(name) = &core.thread_name {
            builder = builder.name(name.clone());
        }
        if let Some(size) = core.stack_size {
            builder = builder.stack_size(size);
        }

        let launched = event_loop.clone();
        let handle = builder
            .spawn(move || {
                launched.start();

                if let Err(err) = launched.run() {
                    error!(loop_id = launched.id(), label = err.as_label(), "launched loop failed: {err}");

                    let mut state = launched.core.state.lock();
                    state.failed_launches += 1;
                    launched.core.running_cv.notify_all();
                }
            })
            .map_err(LoopError::Spawn)?;

        let launched = {
            let mut state = core.state.lock();

            while state.runs == runs && state.failed_launches == failed {
                core.running_cv.wait(&mut state);
            }

            state.runs != runs
        };

        if !launched {
            if handle.join().is_err() {
                error!(loop_id = event_loop.id(), "failed event loop thread panicked");
            }
            return Err(LoopError::Launch {
                loop_id: event_loop.id(),
            });
        }

        debug!(loop_id = event_loop.id(), "event loop launched in thread");
        Ok(handle)
    }

    /// Stops a loop started with [`launch_in_thread`](Self::launch_in_thread)
    /// and joins its thread.
    ///
    /// With `post_stop`, the stop is queued behind the work already posted,
    /// which therefore still runs; otherwise the loop stops right away and
    /// pending work is discarded.
    ///
    /// Returns the thread's join result.
    pub fn remove_from_thread(
        event_loop: &EventLoop,
        thread: JoinHandle<()>,
        post_stop: bool,
    ) -> thread::Result<()> {
        if post_stop {
            event_loop.post_stop_event();
        } else {
            event_loop.stop();
        }

        let joined = thread.join();
        debug!(loop_id = event_loop.id(), "event loop removed from thread");
        joined
    }
}

/// Runs `f` on the consumer thread of a fresh loop and returns its result.
///
/// Backs the `#[loopline::test]` attribute. A panic inside `f` is
/// re-raised on the calling thread once the loop has been shut down.
///
/// # Panics
///
/// Panics if the loop thread cannot be launched, and re-raises any panic
/// from `f`.
pub fn block_on_loop<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let event_loop = EventLoop::new();
    let thread = match EventLoop::launch_in_thread(&event_loop) {
        Ok(thread) => thread,
        Err(err) => panic!("failed to launch event loop: {err}"),
    };

    let outcome = Arc::new(Mutex::new(None));
    let slot = outcome.clone();

    let task = Arc::new(Task::new(move || {
        *slot.lock() = Some(panic::catch_unwind(AssertUnwindSafe(f)));
    }));

    event_loop.post_task(task.clone());
    task.wait();

    if EventLoop::remove_from_thread(&event_loop, thread, true).is_err() {
        error!(loop_id = event_loop.id(), "event loop thread panicked");
    }

    let result = outcome.lock().take();
    match result {
        Some(Ok(value)) => value,
        Some(Err(payload)) => panic::resume_unwind(payload),
        None => panic!("event loop task finished without a result"),
    }
}

/// Runs `f` as the first callback of a loop pumped by the calling thread.
///
/// Backs the `#[loopline::main]` attribute. Returns once the loop is
/// stopped, for example through [`EventLoop::post_stop_event`] on
/// [`current`](crate::current).
///
/// # Panics
///
/// Panics if the loop cannot be run on the calling thread.
pub fn run_main<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    let event_loop = EventLoop::new();
    event_loop.start();
    event_loop.post_callback(f);

    if let Err(err) = event_loop.run() {
        panic!("{err}");
    }
}
