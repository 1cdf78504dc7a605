//! The event loop.
//!
//! This module contains the loop built on top of the reactor primitive.
//!
//! It is responsible for:
//! - the lifecycle state machine (start, run, stop, wait),
//! - enforcing that only the starting thread pumps the loop,
//! - dispatching posted callbacks, blocking callbacks, tasks and stop requests,
//! - the timer registry and timeout handling,
//! - launching a loop on a dedicated thread and tearing it down.

mod builder;
mod context;
mod core;
mod dispatch;
mod timers;

pub(crate) mod launch;

pub use builder::EventLoopBuilder;
pub use context::current;
pub use core::{EventLoop, LoopState};
