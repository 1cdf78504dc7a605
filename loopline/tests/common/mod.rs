//! Shared helpers for the integration tests.

#![allow(dead_code)]

use loopline::EventLoop;

use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

static INIT_LOGGING: Once = Once::new();

/// Installs a test-writer `tracing` subscriber. The first call wins.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Creates a loop and runs it on its own thread.
pub fn launched() -> (EventLoop, JoinHandle<()>) {
    init_test_logging();

    let event_loop = EventLoop::new();
    let thread = EventLoop::launch_in_thread(&event_loop).expect("launch event loop");
    (event_loop, thread)
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }

    cond()
}

/// Blocks until every piece of work posted to `event_loop` so far has run.
pub fn flush(event_loop: &EventLoop) {
    let (callback, done) = loopline::BlockingCallback::new(|| {});
    event_loop.post_event(loopline::Event::RunBlockingCallback(callback));
    assert!(done.wait_for(Duration::from_secs(5)), "loop did not drain");
}
