use super::EventLoop;

use std::cell::RefCell;

thread_local! {
    /// Thread-local handle to the loop currently being pumped.
    ///
    /// This is set while `run` or `process_events` executes on this thread
    /// and lets callbacks reach their loop without capturing a handle.
    pub(crate) static CURRENT_LOOP: RefCell<Option<EventLoop>> =
        const { RefCell::new(None) };
}

/// Enters the execution context of `event_loop` for the current thread.
///
/// The loop is installed as the current loop for the duration of `f`;
/// the previous context is restored afterwards, so nested pumping of a
/// second loop from a callback behaves as expected.
pub(crate) fn enter_context<R>(event_loop: EventLoop, f: impl FnOnce() -> R) -> R {
    CURRENT_LOOP.with(|current| {
        let prev = current.replace(Some(event_loop));

        let out = f();

        current.replace(prev);
        out
    })
}

/// Returns the event loop being pumped on the calling thread.
///
/// Returns `None` outside of [`EventLoop::run`] and
/// [`EventLoop::process_events`].
///
/// # Examples
///
/// ```rust,ignore
/// event_loop.post_callback(|| {
///     let event_loop = loopline::current().expect("inside the loop");
///     event_loop.post_stop_event();
/// });
/// ```
pub fn current() -> Option<EventLoop> {
    CURRENT_LOOP.with(|current| current.borrow().clone())
}
