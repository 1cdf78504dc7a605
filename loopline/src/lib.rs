//! # Loopline
//!
//! **Loopline** is a single-threaded cooperative event loop for Rust.
//!
//! A loop is driven by exactly one consumer thread, the thread that started
//! it, while any number of producer threads post work to it. Posted work runs
//! one item at a time, in posting order, on the consumer thread.
//!
//! Loopline provides:
//!
//! - A **lifecycle** with explicit `start`, `run`, `process_events`, `stop`
//!   and `wait`, guarded against being pumped from the wrong thread
//! - **Events, callbacks and tasks** posted from any thread
//! - A **timer registry** with one-shot and repeating timers that never keeps
//!   its owners alive and guarantees a stopped timer no longer fires
//! - **Thread launching** helpers that run a loop on a dedicated thread
//! - **Ergonomic macros**: `#[loopline::main]` and `#[loopline::test]`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use loopline::{EventLoop, Timer};
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::new();
//! let thread = EventLoop::launch_in_thread(&event_loop)?;
//!
//! let timer = Timer::new(&event_loop);
//! timer.on_timeout(|| println!("tick"));
//! timer.start(Duration::from_millis(50), true);
//!
//! event_loop.post_callback(|| println!("hello from the loop thread"));
//!
//! EventLoop::remove_from_thread(&event_loop, thread, true);
//! ```
//!
//! ## Logging
//!
//! Loopline emits `tracing` events with a `loop_id` field and, for timers,
//! a `timer_id` field. It never installs a subscriber.

mod error;
mod event;
mod reactor;
mod runtime;
mod task;
mod timer;
mod utils;

pub use error::LoopError;
pub use event::{BlockingCallback, Callback, Completion, Event, StartTimer};
pub use runtime::{EventLoop, EventLoopBuilder, LoopState, current};
pub use task::{Task, WaitStatus};
pub use timer::{Timer, TimerTarget};
pub use utils::{Id, IdAllocator, IdSource};

pub use loopline_macros::{main, test};

#[doc(hidden)]
pub mod __private {
    pub use crate::runtime::launch::{block_on_loop, run_main};
}
