//! Reactor primitive.
//!
//! This module implements the low-level substrate the event loop is built
//! on. The reactor is responsible for:
//! - queueing work posted from any thread,
//! - managing countdown timers,
//! - executing ready work on the thread that pumps it.
//!
//! It knows nothing about lifecycle, thread affinity or timer owners;
//! those belong to the event loop in [`crate::runtime`].

mod core;
mod timer;

pub(crate) use core::{Reactor, WorkGuard};
pub(crate) use timer::{Expiry, TimerHandle};
